use shared::domain::{Primitive, UINT8};

use crate::{
    uint_arg, unknown_function, CallContext, CallEffects, Contract, ContractSchema, FunctionSpec,
    Revert, Variant,
};

const INITIAL_BALANCE: u8 = 10;

const FUNCTIONS: &[FunctionSpec] = &[
    FunctionSpec {
        name: "increment",
        params: &[UINT8],
        returns: &[],
        mutates: true,
    },
    FunctionSpec {
        name: "decrement",
        params: &[UINT8],
        returns: &[],
        mutates: true,
    },
    FunctionSpec {
        name: "balance",
        params: &[],
        returns: &[UINT8],
        mutates: false,
    },
];

/// 8-bit counter. The vulnerable variant wraps on overflow/underflow the way
/// pre-0.8 Solidity arithmetic did; the fixed variant reverts instead.
pub struct Counter {
    variant: Variant,
    schema: ContractSchema,
    balance: u8,
}

impl Counter {
    pub fn new(variant: Variant) -> Self {
        Self {
            variant,
            schema: ContractSchema::new(FUNCTIONS),
            balance: INITIAL_BALANCE,
        }
    }
}

impl Contract for Counter {
    fn schema(&self) -> &ContractSchema {
        &self.schema
    }

    fn execute(
        &mut self,
        _ctx: &CallContext,
        function: &str,
        args: &[Primitive],
    ) -> Result<CallEffects, Revert> {
        let value = uint_arg(args, 0)? as u8;
        self.balance = match (function, self.variant) {
            ("increment", Variant::Vulnerable) => self.balance.wrapping_add(value),
            ("increment", Variant::Fixed) => self
                .balance
                .checked_add(value)
                .ok_or_else(|| Revert::new("overflow"))?,
            ("decrement", Variant::Vulnerable) => self.balance.wrapping_sub(value),
            ("decrement", Variant::Fixed) => self
                .balance
                .checked_sub(value)
                .ok_or_else(|| Revert::new("underflow"))?,
            _ => return Err(unknown_function(function)),
        };
        Ok(CallEffects::none())
    }

    fn view(&self, function: &str, _args: &[Primitive]) -> Result<Vec<Primitive>, Revert> {
        match function {
            "balance" => Ok(vec![Primitive::uint8(self.balance)]),
            _ => Err(unknown_function(function)),
        }
    }
}
