use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use shared::domain::{Address, Operation, QueryKey};
use tracing::warn;

use crate::{cache::ReadCache, SubmissionHandle};

/// Invoked by the coordinator after a `Confirmed` transition, before
/// `observe` returns control to the caller.
#[async_trait]
pub trait ConfirmationSink: Send + Sync {
    async fn on_confirmed(&self, operation: &Operation, handle: &SubmissionHandle);
}

pub struct NoopConfirmationSink;

#[async_trait]
impl ConfirmationSink for NoopConfirmationSink {
    async fn on_confirmed(&self, _operation: &Operation, _handle: &SubmissionHandle) {}
}

/// Maps confirmed operations (by contract + function) to the cached queries
/// whose values depend on them. Configured per use site so the coordinator
/// itself stays domain-agnostic.
pub struct CacheRefreshBinding {
    cache: Arc<ReadCache>,
    dependents: HashMap<(Address, String), Vec<QueryKey>>,
}

impl CacheRefreshBinding {
    pub fn new(cache: Arc<ReadCache>) -> Self {
        Self {
            cache,
            dependents: HashMap::new(),
        }
    }

    pub fn depends_on(
        mut self,
        contract: Address,
        function: impl Into<String>,
        keys: Vec<QueryKey>,
    ) -> Self {
        self.dependents
            .entry((contract, function.into()))
            .or_default()
            .extend(keys);
        self
    }
}

#[async_trait]
impl ConfirmationSink for CacheRefreshBinding {
    async fn on_confirmed(&self, operation: &Operation, _handle: &SubmissionHandle) {
        let key = (operation.contract.clone(), operation.function.clone());
        let Some(dependent_keys) = self.dependents.get(&key) else {
            return;
        };
        for query_key in dependent_keys {
            if let Err(err) = self.cache.refresh(query_key).await {
                warn!(query = %query_key, error = %err, "dependent refresh skipped");
            }
        }
    }
}
