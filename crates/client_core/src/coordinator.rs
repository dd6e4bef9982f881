use std::{fmt, sync::Arc, time::Duration};

use shared::domain::Operation;
use thiserror::Error;
use tokio::sync::{broadcast, Mutex};
use tracing::{info, warn};

use crate::{
    binding::ConfirmationSink, CallOutcome, ContractNode, NodeError, SubmissionHandle,
};

pub const DEFAULT_CONFIRMATION_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
    /// Refused before entering the pending set; no handle was ever produced.
    Rejected(String),
    /// Entered the pending set, executed, and failed its own checks.
    Reverted(String),
    /// No terminal outcome observed within the configured wait window. The
    /// operation may still complete on the ledger afterwards.
    TimedOut,
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::Rejected(message) => write!(f, "rejected: {message}"),
            FailureReason::Reverted(reason) => write!(f, "reverted: {reason}"),
            FailureReason::TimedOut => f.write_str("timed out"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleStatus {
    Idle,
    Submitting,
    AwaitingConfirmation { handle: SubmissionHandle },
    Confirmed { handle: SubmissionHandle },
    Failed { reason: FailureReason },
}

impl LifecycleStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            LifecycleStatus::Confirmed { .. } | LifecycleStatus::Failed { .. }
        )
    }

    pub fn label(&self) -> &'static str {
        match self {
            LifecycleStatus::Idle => "idle",
            LifecycleStatus::Submitting => "submitting",
            LifecycleStatus::AwaitingConfirmation { .. } => "awaiting_confirmation",
            LifecycleStatus::Confirmed { .. } => "confirmed",
            LifecycleStatus::Failed { .. } => "failed",
        }
    }
}

impl fmt::Display for LifecycleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LifecycleStatus::Failed { reason } => write!(f, "failed ({reason})"),
            other => f.write_str(other.label()),
        }
    }
}

/// Coordinator misuse. Remote-outcome failures are never raised through
/// this type; they land in [`LifecycleStatus::Failed`] as data.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CoordinatorError {
    #[error("an operation is already in flight")]
    AlreadyInFlight,
    #[error("invalid transition from `{from}`")]
    InvalidTransition { from: &'static str },
}

struct CoordinatorState {
    status: LifecycleStatus,
    /// Kept from submit until the terminal transition so the confirmation
    /// sink can see which operation landed. Consumed exactly once.
    in_flight: Option<Operation>,
}

/// Owns the lifecycle of one state-changing operation at a time:
/// `Idle -> Submitting -> AwaitingConfirmation -> Confirmed | Failed`,
/// forward-only, at most one operation in flight.
///
/// Dropping the coordinator while a confirmation is pending abandons the
/// observation: the remote operation may still complete on the ledger, but
/// no further local transition happens. Session-scoped, in-memory only.
pub struct WriteCoordinator {
    node: Arc<dyn ContractNode>,
    sink: Arc<dyn ConfirmationSink>,
    confirmation_timeout: Duration,
    inner: Mutex<CoordinatorState>,
    events: broadcast::Sender<LifecycleStatus>,
}

impl WriteCoordinator {
    pub fn new(
        node: Arc<dyn ContractNode>,
        sink: Arc<dyn ConfirmationSink>,
        confirmation_timeout: Duration,
    ) -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            node,
            sink,
            confirmation_timeout,
            inner: Mutex::new(CoordinatorState {
                status: LifecycleStatus::Idle,
                in_flight: None,
            }),
            events,
        }
    }

    pub async fn status(&self) -> LifecycleStatus {
        self.inner.lock().await.status.clone()
    }

    pub fn subscribe_status(&self) -> broadcast::Receiver<LifecycleStatus> {
        self.events.subscribe()
    }

    /// Dispatches `operation` to the node. Legal only from `Idle` or a
    /// terminal status; otherwise fails with `AlreadyInFlight` and performs
    /// no side effect. Returns the status the submission settled on:
    /// `AwaitingConfirmation` with the node's handle, or `Failed(Rejected)`
    /// when the dispatch itself was refused.
    pub async fn submit(&self, operation: Operation) -> Result<LifecycleStatus, CoordinatorError> {
        {
            let mut inner = self.inner.lock().await;
            let accepting = matches!(inner.status, LifecycleStatus::Idle)
                || inner.status.is_terminal();
            if !accepting {
                return Err(CoordinatorError::AlreadyInFlight);
            }
            inner.status = LifecycleStatus::Submitting;
            inner.in_flight = Some(operation.clone());
            let _ = self.events.send(LifecycleStatus::Submitting);
        }

        let status = match self.node.submit(&operation).await {
            Ok(handle) => {
                info!(
                    handle = %handle,
                    contract = %operation.contract,
                    function = %operation.function,
                    "operation accepted by node"
                );
                LifecycleStatus::AwaitingConfirmation { handle }
            }
            Err(err) => {
                // Any dispatch failure leaves the pending set untouched and
                // produces no handle, so it surfaces as a rejection.
                let message = match err {
                    NodeError::Rejected(message) => message,
                    other => other.to_string(),
                };
                warn!(
                    contract = %operation.contract,
                    function = %operation.function,
                    reason = %message,
                    "operation rejected at dispatch"
                );
                LifecycleStatus::Failed {
                    reason: FailureReason::Rejected(message),
                }
            }
        };

        let mut inner = self.inner.lock().await;
        inner.status = status.clone();
        if status.is_terminal() {
            inner.in_flight = None;
        }
        drop(inner);
        let _ = self.events.send(status.clone());
        Ok(status)
    }

    /// Waits for the terminal outcome of the in-flight operation, bounded by
    /// the configured confirmation timeout. On confirmation the registered
    /// sink runs to completion before this returns. Legal only from
    /// `AwaitingConfirmation`.
    pub async fn observe(&self) -> Result<LifecycleStatus, CoordinatorError> {
        let handle = {
            let inner = self.inner.lock().await;
            match &inner.status {
                LifecycleStatus::AwaitingConfirmation { handle } => handle.clone(),
                other => {
                    return Err(CoordinatorError::InvalidTransition {
                        from: other.label(),
                    })
                }
            }
        };

        let status = match tokio::time::timeout(
            self.confirmation_timeout,
            self.node.outcome(&handle),
        )
        .await
        {
            Ok(Ok(CallOutcome::Confirmed)) => {
                info!(handle = %handle, "operation confirmed");
                LifecycleStatus::Confirmed {
                    handle: handle.clone(),
                }
            }
            Ok(Ok(CallOutcome::Reverted(reason))) => {
                warn!(handle = %handle, reason = %reason, "operation reverted");
                LifecycleStatus::Failed {
                    reason: FailureReason::Reverted(reason),
                }
            }
            Ok(Err(err)) => {
                // The wait ended without a terminal outcome being observed;
                // the operation may still land on the ledger.
                warn!(handle = %handle, error = %err, "outcome observation failed");
                LifecycleStatus::Failed {
                    reason: FailureReason::TimedOut,
                }
            }
            Err(_elapsed) => {
                warn!(
                    handle = %handle,
                    timeout_ms = self.confirmation_timeout.as_millis() as u64,
                    "no terminal outcome within wait window"
                );
                LifecycleStatus::Failed {
                    reason: FailureReason::TimedOut,
                }
            }
        };

        let operation = {
            let mut inner = self.inner.lock().await;
            // A concurrent observe may have already settled this lifecycle;
            // the loser reports the settled status without re-transitioning.
            if !matches!(inner.status, LifecycleStatus::AwaitingConfirmation { .. }) {
                return Ok(inner.status.clone());
            }
            inner.status = status.clone();
            inner.in_flight.take()
        };
        let _ = self.events.send(status.clone());

        if let (LifecycleStatus::Confirmed { handle }, Some(operation)) = (&status, operation) {
            self.sink.on_confirmed(&operation, handle).await;
        }

        Ok(status)
    }

    /// Returns to `Idle`, discarding the handle. Legal only from a terminal
    /// status.
    pub async fn reset(&self) -> Result<(), CoordinatorError> {
        let mut inner = self.inner.lock().await;
        if !inner.status.is_terminal() {
            return Err(CoordinatorError::InvalidTransition {
                from: inner.status.label(),
            });
        }
        inner.status = LifecycleStatus::Idle;
        inner.in_flight = None;
        drop(inner);
        let _ = self.events.send(LifecycleStatus::Idle);
        Ok(())
    }
}

#[cfg(test)]
#[path = "tests/coordinator_tests.rs"]
mod tests;
