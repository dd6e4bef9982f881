use shared::domain::{Address, Primitive, PrimitiveKind};
use thiserror::Error;

pub mod balances;
pub mod counter;
pub mod crud;
pub mod vault;

pub use balances::{BalanceRegistry, Reputation};
pub use counter::Counter;
pub use crud::Crud;
pub use vault::Vault;

/// One callable entry in a contract's declared schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FunctionSpec {
    pub name: &'static str,
    pub params: &'static [PrimitiveKind],
    pub returns: &'static [PrimitiveKind],
    pub mutates: bool,
}

/// The declared call surface of a deployed contract. Calls are matched
/// exactly on name, argument order and argument kinds; anything else is
/// refused before it reaches the contract.
#[derive(Debug, Clone)]
pub struct ContractSchema {
    functions: &'static [FunctionSpec],
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SchemaError {
    #[error("unknown function `{0}`")]
    UnknownFunction(String),
    #[error("`{function}` expects {expected} arguments, got {actual}")]
    ArityMismatch {
        function: String,
        expected: usize,
        actual: usize,
    },
    #[error("`{function}` argument {index} expects {expected}, got {actual}")]
    KindMismatch {
        function: String,
        index: usize,
        expected: PrimitiveKind,
        actual: PrimitiveKind,
    },
    #[error("`{function}` is read-only and cannot be submitted as a transaction")]
    NotMutating { function: String },
    #[error("`{function}` mutates state and cannot be issued as a query")]
    NotView { function: String },
}

impl ContractSchema {
    pub fn new(functions: &'static [FunctionSpec]) -> Self {
        Self { functions }
    }

    pub fn function(&self, name: &str) -> Option<&FunctionSpec> {
        self.functions.iter().find(|spec| spec.name == name)
    }

    pub fn function_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.functions.iter().map(|spec| spec.name)
    }

    pub fn check_call(
        &self,
        function: &str,
        args: &[Primitive],
        mutating: bool,
    ) -> Result<&FunctionSpec, SchemaError> {
        let spec = self
            .function(function)
            .ok_or_else(|| SchemaError::UnknownFunction(function.to_string()))?;
        if mutating && !spec.mutates {
            return Err(SchemaError::NotMutating {
                function: function.to_string(),
            });
        }
        if !mutating && spec.mutates {
            return Err(SchemaError::NotView {
                function: function.to_string(),
            });
        }
        if args.len() != spec.params.len() {
            return Err(SchemaError::ArityMismatch {
                function: function.to_string(),
                expected: spec.params.len(),
                actual: args.len(),
            });
        }
        for (index, (arg, expected)) in args.iter().zip(spec.params).enumerate() {
            if arg.kind() != *expected {
                return Err(SchemaError::KindMismatch {
                    function: function.to_string(),
                    index,
                    expected: *expected,
                    actual: arg.kind(),
                });
            }
        }
        Ok(spec)
    }
}

/// Execution failed the contract's own checks after entering the pending set.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{0}")]
pub struct Revert(pub String);

impl Revert {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Ledger-side facts available to a mutating call.
#[derive(Debug, Clone)]
pub struct CallContext {
    pub sender: Address,
    pub contract_balance: u128,
}

/// Native balance movements requested by a call, paid out of the contract's
/// balance by the ledger after the call returns.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallEffects {
    pub transfers: Vec<(Address, u128)>,
}

impl CallEffects {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn transfer(recipient: Address, amount: u128) -> Self {
        Self {
            transfers: vec![(recipient, amount)],
        }
    }
}

/// A deployed contract instance. The ledger checks every call against
/// [`ContractSchema::check_call`] first, so implementations may assume arity
/// and argument kinds already match the declared schema.
pub trait Contract: Send + Sync {
    fn schema(&self) -> &ContractSchema;

    fn execute(
        &mut self,
        ctx: &CallContext,
        function: &str,
        args: &[Primitive],
    ) -> Result<CallEffects, Revert>;

    fn view(&self, function: &str, args: &[Primitive]) -> Result<Vec<Primitive>, Revert>;
}

/// Whether a contract ships with the original flaw or the corrected checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Variant {
    Vulnerable,
    Fixed,
}

impl Variant {
    /// Deployment-name suffix, e.g. `CounterVulnerable` / `CounterFixed`.
    pub fn suffix(&self) -> &'static str {
        match self {
            Variant::Vulnerable => "Vulnerable",
            Variant::Fixed => "Fixed",
        }
    }
}

pub(crate) fn uint_arg(args: &[Primitive], index: usize) -> Result<u128, Revert> {
    args.get(index)
        .and_then(Primitive::as_uint)
        .ok_or_else(|| Revert::new(format!("argument {index} is not an unsigned integer")))
}

pub(crate) fn address_arg(args: &[Primitive], index: usize) -> Result<Address, Revert> {
    args.get(index)
        .and_then(Primitive::as_address)
        .cloned()
        .ok_or_else(|| Revert::new(format!("argument {index} is not an address")))
}

pub(crate) fn text_arg(args: &[Primitive], index: usize) -> Result<String, Revert> {
    args.get(index)
        .and_then(Primitive::as_text)
        .map(str::to_string)
        .ok_or_else(|| Revert::new(format!("argument {index} is not a string")))
}

pub(crate) fn unknown_function(function: &str) -> Revert {
    Revert::new(format!("unknown function `{function}`"))
}
