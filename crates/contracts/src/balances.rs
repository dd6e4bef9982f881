use std::collections::HashMap;

use shared::domain::{Address, Primitive, PrimitiveKind, UINT256};

use crate::{
    address_arg, uint_arg, unknown_function, CallContext, CallEffects, Contract, ContractSchema,
    FunctionSpec, Revert, Variant,
};

const REGISTRY_FUNCTIONS: &[FunctionSpec] = &[
    FunctionSpec {
        name: "setBalance",
        params: &[PrimitiveKind::Address, UINT256],
        returns: &[],
        mutates: true,
    },
    FunctionSpec {
        name: "balances",
        params: &[PrimitiveKind::Address],
        returns: &[UINT256],
        mutates: false,
    },
];

/// Per-user balance registry. The vulnerable variant lets any sender set any
/// user's balance; the fixed variant restricts writes to the owner.
pub struct BalanceRegistry {
    variant: Variant,
    schema: ContractSchema,
    owner: Address,
    balances: HashMap<Address, u128>,
}

impl BalanceRegistry {
    pub fn new(variant: Variant, owner: Address) -> Self {
        Self {
            variant,
            schema: ContractSchema::new(REGISTRY_FUNCTIONS),
            owner,
            balances: HashMap::new(),
        }
    }
}

impl Contract for BalanceRegistry {
    fn schema(&self) -> &ContractSchema {
        &self.schema
    }

    fn execute(
        &mut self,
        ctx: &CallContext,
        function: &str,
        args: &[Primitive],
    ) -> Result<CallEffects, Revert> {
        match function {
            "setBalance" => {
                if self.variant == Variant::Fixed && ctx.sender != self.owner {
                    return Err(Revert::new("caller is not the owner"));
                }
                let user = address_arg(args, 0)?;
                let amount = uint_arg(args, 1)?;
                self.balances.insert(user, amount);
                Ok(CallEffects::none())
            }
            _ => Err(unknown_function(function)),
        }
    }

    fn view(&self, function: &str, args: &[Primitive]) -> Result<Vec<Primitive>, Revert> {
        match function {
            "balances" => {
                let user = address_arg(args, 0)?;
                let balance = self.balances.get(&user).copied().unwrap_or(0);
                Ok(vec![Primitive::uint256(balance)])
            }
            _ => Err(unknown_function(function)),
        }
    }
}

const REPUTATION_FUNCTIONS: &[FunctionSpec] = &[
    FunctionSpec {
        name: "setReputation",
        params: &[PrimitiveKind::Address, UINT256],
        returns: &[],
        mutates: true,
    },
    FunctionSpec {
        name: "userReputation",
        params: &[PrimitiveKind::Address],
        returns: &[UINT256],
        mutates: false,
    },
];

pub const MAX_REPUTATION: u128 = 100;

/// Reputation scores. The vulnerable variant accepts any score; the fixed
/// variant bounds scores to [`MAX_REPUTATION`].
pub struct Reputation {
    variant: Variant,
    schema: ContractSchema,
    scores: HashMap<Address, u128>,
}

impl Reputation {
    pub fn new(variant: Variant) -> Self {
        Self {
            variant,
            schema: ContractSchema::new(REPUTATION_FUNCTIONS),
            scores: HashMap::new(),
        }
    }
}

impl Contract for Reputation {
    fn schema(&self) -> &ContractSchema {
        &self.schema
    }

    fn execute(
        &mut self,
        _ctx: &CallContext,
        function: &str,
        args: &[Primitive],
    ) -> Result<CallEffects, Revert> {
        match function {
            "setReputation" => {
                let user = address_arg(args, 0)?;
                let score = uint_arg(args, 1)?;
                if self.variant == Variant::Fixed && score > MAX_REPUTATION {
                    return Err(Revert::new("score exceeds maximum"));
                }
                self.scores.insert(user, score);
                Ok(CallEffects::none())
            }
            _ => Err(unknown_function(function)),
        }
    }

    fn view(&self, function: &str, args: &[Primitive]) -> Result<Vec<Primitive>, Revert> {
        match function {
            "userReputation" => {
                let user = address_arg(args, 0)?;
                let score = self.scores.get(&user).copied().unwrap_or(0);
                Ok(vec![Primitive::uint256(score)])
            }
            _ => Err(unknown_function(function)),
        }
    }
}
