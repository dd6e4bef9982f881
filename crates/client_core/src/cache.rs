use std::{collections::HashMap, sync::Arc};

use chrono::{DateTime, Utc};
use futures::future::join_all;
use shared::domain::{Primitive, Query, QueryKey};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::warn;

use crate::{ContractNode, NodeError};

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CacheError {
    #[error("query `{0}` is already registered")]
    DuplicateQuery(QueryKey),
    #[error("query `{0}` is not registered")]
    UnknownQuery(QueryKey),
}

/// Point-in-time view of one query slot. `value` is only ever replaced by a
/// successful re-fetch; a failed fetch shows up in `last_error` instead.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QuerySnapshot {
    pub value: Option<Vec<Primitive>>,
    pub fetched_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

struct QuerySlot {
    query: Query,
    snapshot: QuerySnapshot,
}

/// Holds the last known result of each registered read-only query and an
/// explicit refresh trigger. Reads never touch the network; refreshes for
/// distinct keys may run concurrently, and racing refreshes of the same key
/// settle last-writer-wins by completion order.
pub struct ReadCache {
    node: Arc<dyn ContractNode>,
    slots: RwLock<HashMap<QueryKey, QuerySlot>>,
}

impl ReadCache {
    pub fn new(node: Arc<dyn ContractNode>) -> Self {
        Self {
            node,
            slots: RwLock::new(HashMap::new()),
        }
    }

    /// Adds `query` to the tracked set. Callers should reuse an existing
    /// registration instead of re-registering the same key.
    pub async fn register(&self, query: Query) -> Result<QueryKey, CacheError> {
        let key = query.key();
        let mut slots = self.slots.write().await;
        if slots.contains_key(&key) {
            return Err(CacheError::DuplicateQuery(key));
        }
        slots.insert(
            key.clone(),
            QuerySlot {
                query,
                snapshot: QuerySnapshot::default(),
            },
        );
        Ok(key)
    }

    /// Current snapshot for `key`; never blocks on the network.
    pub async fn get(&self, key: &QueryKey) -> Result<QuerySnapshot, CacheError> {
        let slots = self.slots.read().await;
        slots
            .get(key)
            .map(|slot| slot.snapshot.clone())
            .ok_or_else(|| CacheError::UnknownQuery(key.clone()))
    }

    pub async fn keys(&self) -> Vec<QueryKey> {
        self.slots.read().await.keys().cloned().collect()
    }

    /// Re-issues one registered query. A fetch failure is recorded in the
    /// slot, not raised; the stored value stays untouched.
    pub async fn refresh(&self, key: &QueryKey) -> Result<(), CacheError> {
        let query = {
            let slots = self.slots.read().await;
            slots
                .get(key)
                .map(|slot| slot.query.clone())
                .ok_or_else(|| CacheError::UnknownQuery(key.clone()))?
        };
        self.refresh_slot(key, &query).await;
        Ok(())
    }

    /// Re-issues every registered query concurrently. One query's failure
    /// never aborts the others.
    pub async fn refresh_all(&self) {
        let entries: Vec<(QueryKey, Query)> = {
            let slots = self.slots.read().await;
            slots
                .iter()
                .map(|(key, slot)| (key.clone(), slot.query.clone()))
                .collect()
        };
        join_all(
            entries
                .into_iter()
                .map(|(key, query)| async move { self.refresh_slot(&key, &query).await }),
        )
        .await;
    }

    async fn refresh_slot(&self, key: &QueryKey, query: &Query) {
        // The lock is not held across the network call, so refreshes for
        // other keys (and racing refreshes of this key) proceed freely.
        let fetched = self.node.call(query).await;
        let mut slots = self.slots.write().await;
        let Some(slot) = slots.get_mut(key) else {
            return;
        };
        match fetched {
            Ok(values) => {
                slot.snapshot.value = Some(values);
                slot.snapshot.fetched_at = Some(Utc::now());
                slot.snapshot.last_error = None;
            }
            Err(err) => {
                warn!(query = %key, error = %err, "query refresh failed");
                slot.snapshot.last_error = Some(fetch_error_message(err));
            }
        }
    }
}

fn fetch_error_message(err: NodeError) -> String {
    match err {
        NodeError::Query(message) | NodeError::Rejected(message) => message,
        NodeError::Transport(message) => message,
    }
}

#[cfg(test)]
#[path = "tests/cache_tests.rs"]
mod tests;
