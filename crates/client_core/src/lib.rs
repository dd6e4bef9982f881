//! Client-side contract interaction stack: one write coordinator per
//! in-flight state-changing operation, a read cache for query results, and
//! the binding that refreshes dependent reads exactly once on confirmation.

use async_trait::async_trait;
use shared::domain::{Operation, Primitive, Query, TxHash};
use thiserror::Error;

pub mod binding;
pub mod cache;
pub mod coordinator;
pub mod transport;

pub use binding::{CacheRefreshBinding, ConfirmationSink, NoopConfirmationSink};
pub use cache::{CacheError, QuerySnapshot, ReadCache};
pub use coordinator::{CoordinatorError, FailureReason, LifecycleStatus, WriteCoordinator};
pub use transport::HttpContractNode;

/// Opaque identifier correlating a submitted operation with its eventual
/// outcome. Owned by the coordinator for exactly one lifecycle.
pub type SubmissionHandle = TxHash;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum NodeError {
    /// The node refused the call before it entered the pending set.
    #[error("submission rejected: {0}")]
    Rejected(String),
    /// A read-only query failed; the previous cached value stays valid.
    #[error("query failed: {0}")]
    Query(String),
    #[error("transport failure: {0}")]
    Transport(String),
}

/// Terminal outcome the node reports for a submitted operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallOutcome {
    Confirmed,
    Reverted(String),
}

/// The remote ledger node, reduced to the three calls the client needs. The
/// wallet/signing layer is assumed to have produced the sender identity
/// carried inside [`Operation`].
#[async_trait]
pub trait ContractNode: Send + Sync {
    /// Dispatches a state-changing call. A rejection means the call never
    /// entered the pending set and no handle exists.
    async fn submit(&self, operation: &Operation) -> Result<SubmissionHandle, NodeError>;

    /// Resolves once the node reports a terminal outcome for `handle`. This
    /// can suspend indefinitely; the coordinator bounds the wait.
    async fn outcome(&self, handle: &SubmissionHandle) -> Result<CallOutcome, NodeError>;

    /// Issues a read-only call and returns the decoded tuple.
    async fn call(&self, query: &Query) -> Result<Vec<Primitive>, NodeError>;
}

pub struct UnreachableContractNode;

#[async_trait]
impl ContractNode for UnreachableContractNode {
    async fn submit(&self, _operation: &Operation) -> Result<SubmissionHandle, NodeError> {
        Err(NodeError::Transport("contract node is unavailable".into()))
    }

    async fn outcome(&self, _handle: &SubmissionHandle) -> Result<CallOutcome, NodeError> {
        Err(NodeError::Transport("contract node is unavailable".into()))
    }

    async fn call(&self, _query: &Query) -> Result<Vec<Primitive>, NodeError> {
        Err(NodeError::Transport("contract node is unavailable".into()))
    }
}
