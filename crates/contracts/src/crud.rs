use std::collections::BTreeMap;

use shared::domain::{Primitive, PrimitiveKind, UINT256};

use crate::{
    text_arg, uint_arg, unknown_function, CallContext, CallEffects, Contract, ContractSchema,
    FunctionSpec, Revert,
};

const FUNCTIONS: &[FunctionSpec] = &[
    FunctionSpec {
        name: "createRecord",
        params: &[PrimitiveKind::Text, PrimitiveKind::Text],
        returns: &[],
        mutates: true,
    },
    FunctionSpec {
        name: "updateRecord",
        params: &[UINT256, PrimitiveKind::Text, PrimitiveKind::Text],
        returns: &[],
        mutates: true,
    },
    FunctionSpec {
        name: "deleteRecord",
        params: &[UINT256],
        returns: &[],
        mutates: true,
    },
    FunctionSpec {
        name: "readRecord",
        params: &[UINT256],
        returns: &[UINT256, PrimitiveKind::Text, PrimitiveKind::Text],
        mutates: false,
    },
    FunctionSpec {
        name: "nextId",
        params: &[],
        returns: &[UINT256],
        mutates: false,
    },
];

#[derive(Debug, Clone)]
struct Record {
    title: String,
    description: String,
}

/// Record store with sequential ids. Updates and deletes of a missing id
/// revert rather than silently writing.
pub struct Crud {
    schema: ContractSchema,
    records: BTreeMap<u128, Record>,
    next_id: u128,
}

impl Crud {
    pub fn new() -> Self {
        Self {
            schema: ContractSchema::new(FUNCTIONS),
            records: BTreeMap::new(),
            next_id: 0,
        }
    }
}

impl Default for Crud {
    fn default() -> Self {
        Self::new()
    }
}

impl Contract for Crud {
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
            "createRecord" => {
                let record = Record {
                    title: text_arg(args, 0)?,
                    description: text_arg(args, 1)?,
                };
                self.records.insert(self.next_id, record);
                self.next_id += 1;
                Ok(CallEffects::none())
            }
            "updateRecord" => {
                let id = uint_arg(args, 0)?;
                let title = text_arg(args, 1)?;
                let description = text_arg(args, 2)?;
                let record = self
                    .records
                    .get_mut(&id)
                    .ok_or_else(|| Revert::new("record does not exist"))?;
                record.title = title;
                record.description = description;
                Ok(CallEffects::none())
            }
            "deleteRecord" => {
                let id = uint_arg(args, 0)?;
                self.records
                    .remove(&id)
                    .ok_or_else(|| Revert::new("record does not exist"))?;
                Ok(CallEffects::none())
            }
            _ => Err(unknown_function(function)),
        }
    }

    fn view(&self, function: &str, args: &[Primitive]) -> Result<Vec<Primitive>, Revert> {
        match function {
            "readRecord" => {
                let id = uint_arg(args, 0)?;
                let record = self
                    .records
                    .get(&id)
                    .ok_or_else(|| Revert::new("record does not exist"))?;
                Ok(vec![
                    Primitive::uint256(id),
                    Primitive::text(record.title.clone()),
                    Primitive::text(record.description.clone()),
                ])
            }
            "nextId" => Ok(vec![Primitive::uint256(self.next_id)]),
            _ => Err(unknown_function(function)),
        }
    }
}
