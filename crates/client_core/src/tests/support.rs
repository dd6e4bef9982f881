// Included by several test modules; each instantiation uses a subset.
#![allow(dead_code)]

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use shared::domain::{Address, Operation, Primitive, Query, QueryKey, TxHash};
use tokio::sync::{Mutex, Notify};

use crate::{CallOutcome, ContractNode, NodeError, SubmissionHandle};

pub enum MockOutcome {
    Confirm,
    Revert(&'static str),
    NeverResolves,
}

/// In-memory stand-in for the remote node with per-behavior knobs and call
/// recording, used by the coordinator and cache tests.
pub struct MockNode {
    pub handle: SubmissionHandle,
    pub submit_rejection: Option<String>,
    pub submit_gate: Option<Arc<Notify>>,
    pub outcome: MockOutcome,
    pub call_results: Mutex<HashMap<QueryKey, Result<Vec<Primitive>, String>>>,
    pub submissions: Mutex<Vec<Operation>>,
    pub calls_issued: Mutex<Vec<QueryKey>>,
}

impl MockNode {
    fn base(outcome: MockOutcome) -> Self {
        Self {
            handle: TxHash::from_digest(&[0x42; 32]),
            submit_rejection: None,
            submit_gate: None,
            outcome,
            call_results: Mutex::new(HashMap::new()),
            submissions: Mutex::new(Vec::new()),
            calls_issued: Mutex::new(Vec::new()),
        }
    }

    pub fn confirming() -> Self {
        Self::base(MockOutcome::Confirm)
    }

    pub fn reverting(reason: &'static str) -> Self {
        Self::base(MockOutcome::Revert(reason))
    }

    pub fn rejecting(message: impl Into<String>) -> Self {
        let mut node = Self::base(MockOutcome::Confirm);
        node.submit_rejection = Some(message.into());
        node
    }

    pub fn pending_forever() -> Self {
        Self::base(MockOutcome::NeverResolves)
    }

    /// Submissions block until `gate` is notified, holding the coordinator
    /// in `Submitting`.
    pub fn gated(gate: Arc<Notify>) -> Self {
        let mut node = Self::base(MockOutcome::Confirm);
        node.submit_gate = Some(gate);
        node
    }

    pub async fn set_call(&self, query: &Query, result: Result<Vec<Primitive>, String>) {
        self.call_results.lock().await.insert(query.key(), result);
    }
}

#[async_trait]
impl ContractNode for MockNode {
    async fn submit(&self, operation: &Operation) -> Result<SubmissionHandle, NodeError> {
        self.submissions.lock().await.push(operation.clone());
        if let Some(gate) = &self.submit_gate {
            gate.notified().await;
        }
        if let Some(message) = &self.submit_rejection {
            return Err(NodeError::Rejected(message.clone()));
        }
        Ok(self.handle.clone())
    }

    async fn outcome(&self, _handle: &SubmissionHandle) -> Result<CallOutcome, NodeError> {
        match &self.outcome {
            MockOutcome::Confirm => Ok(CallOutcome::Confirmed),
            MockOutcome::Revert(reason) => Ok(CallOutcome::Reverted(reason.to_string())),
            MockOutcome::NeverResolves => std::future::pending().await,
        }
    }

    async fn call(&self, query: &Query) -> Result<Vec<Primitive>, NodeError> {
        let key = query.key();
        self.calls_issued.lock().await.push(key.clone());
        match self.call_results.lock().await.get(&key) {
            Some(Ok(values)) => Ok(values.clone()),
            Some(Err(message)) => Err(NodeError::Query(message.clone())),
            None => Err(NodeError::Query(format!("no canned result for {key}"))),
        }
    }
}

pub fn address(tag: u8) -> Address {
    Address::from_digest(&[tag; 32])
}
