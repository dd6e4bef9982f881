use shared::domain::{Address, Primitive, PrimitiveKind};

use crate::{
    unknown_function, CallContext, CallEffects, Contract, ContractSchema, FunctionSpec, Revert,
    Variant,
};

const FUNCTIONS: &[FunctionSpec] = &[
    FunctionSpec {
        name: "withdraw",
        params: &[],
        returns: &[],
        mutates: true,
    },
    FunctionSpec {
        name: "owner",
        params: &[],
        returns: &[PrimitiveKind::Address],
        mutates: false,
    },
];

/// Funded vault whose `withdraw` pays the entire contract balance to the
/// caller. The vulnerable variant leaves `withdraw` open to anyone; the fixed
/// variant restricts it to the deploying owner.
pub struct Vault {
    variant: Variant,
    schema: ContractSchema,
    owner: Address,
}

impl Vault {
    pub fn new(variant: Variant, owner: Address) -> Self {
        Self {
            variant,
            schema: ContractSchema::new(FUNCTIONS),
            owner,
        }
    }
}

impl Contract for Vault {
    fn schema(&self) -> &ContractSchema {
        &self.schema
    }

    fn execute(
        &mut self,
        ctx: &CallContext,
        function: &str,
        _args: &[Primitive],
    ) -> Result<CallEffects, Revert> {
        match function {
            "withdraw" => {
                if self.variant == Variant::Fixed && ctx.sender != self.owner {
                    return Err(Revert::new("caller is not the owner"));
                }
                if ctx.contract_balance == 0 {
                    return Err(Revert::new("vault is empty"));
                }
                Ok(CallEffects::transfer(
                    ctx.sender.clone(),
                    ctx.contract_balance,
                ))
            }
            _ => Err(unknown_function(function)),
        }
    }

    fn view(&self, function: &str, _args: &[Primitive]) -> Result<Vec<Primitive>, Revert> {
        match function {
            "owner" => Ok(vec![Primitive::address(self.owner.clone())]),
            _ => Err(unknown_function(function)),
        }
    }
}
