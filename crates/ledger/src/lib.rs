use std::{
    collections::{HashMap, VecDeque},
    sync::Arc,
    time::Duration,
};

use chrono::Utc;
use contracts::{CallContext, Contract, Revert, SchemaError};
use sha2::{Digest, Sha256};
use shared::{
    domain::{Address, Primitive, TxHash},
    protocol::{ContractSummary, ReceiptStatus, TransactionReceipt},
};
use thiserror::Error;
use tokio::{
    sync::{broadcast, Mutex},
    task::JoinHandle,
};
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum SubmitError {
    #[error("unknown contract {0}")]
    UnknownContract(Address),
    #[error(transparent)]
    Schema(#[from] SchemaError),
}

#[derive(Debug, Error)]
pub enum CallError {
    #[error("unknown contract {0}")]
    UnknownContract(Address),
    #[error(transparent)]
    Schema(#[from] SchemaError),
    #[error("call reverted: {0}")]
    Reverted(#[from] Revert),
}

struct PendingTransaction {
    tx_hash: TxHash,
    sender: Address,
    contract: Address,
    function: String,
    args: Vec<Primitive>,
}

struct DeployedContract {
    name: String,
    instance: Box<dyn Contract>,
}

struct LedgerState {
    /// Native balances for accounts and contracts alike.
    balances: HashMap<Address, u128>,
    contracts: HashMap<Address, DeployedContract>,
    deploy_order: Vec<Address>,
    mempool: VecDeque<PendingTransaction>,
    receipts: HashMap<TxHash, TransactionReceipt>,
    nonce: u64,
}

/// In-memory single-node ledger. Submissions are validated against the
/// target contract's schema up front (a mismatch never enters the pending
/// set), then sealed asynchronously by [`Ledger::spawn_sealer`] or by an
/// explicit [`Ledger::seal_pending`] in tests.
#[derive(Clone)]
pub struct Ledger {
    inner: Arc<Mutex<LedgerState>>,
    sealed: broadcast::Sender<TxHash>,
}

impl Default for Ledger {
    fn default() -> Self {
        Self::new()
    }
}

impl Ledger {
    pub fn new() -> Self {
        let (sealed, _) = broadcast::channel(256);
        Self {
            inner: Arc::new(Mutex::new(LedgerState {
                balances: HashMap::new(),
                contracts: HashMap::new(),
                deploy_order: Vec::new(),
                mempool: VecDeque::new(),
                receipts: HashMap::new(),
                nonce: 0,
            })),
            sealed,
        }
    }

    pub async fn fund_account(&self, address: &Address, amount: u128) {
        let mut state = self.inner.lock().await;
        *state.balances.entry(address.clone()).or_insert(0) += amount;
    }

    pub async fn balance(&self, address: &Address) -> u128 {
        let state = self.inner.lock().await;
        state.balances.get(address).copied().unwrap_or(0)
    }

    pub async fn deploy(
        &self,
        name: impl Into<String>,
        instance: Box<dyn Contract>,
        funding: u128,
    ) -> Address {
        let name = name.into();
        let mut state = self.inner.lock().await;
        state.nonce += 1;
        let address = derive_contract_address(&name, state.nonce);
        state.balances.insert(address.clone(), funding);
        state.deploy_order.push(address.clone());
        state.contracts.insert(
            address.clone(),
            DeployedContract {
                name: name.clone(),
                instance,
            },
        );
        info!(name = %name, address = %address, funding = %funding, "contract deployed");
        address
    }

    pub async fn contracts(&self) -> Vec<ContractSummary> {
        let state = self.inner.lock().await;
        state
            .deploy_order
            .iter()
            .filter_map(|address| {
                state.contracts.get(address).map(|deployed| ContractSummary {
                    address: address.clone(),
                    name: deployed.name.clone(),
                })
            })
            .collect()
    }

    /// Validates and queues a state-changing call. Returns the handle that
    /// correlates the submission with its eventual receipt.
    pub async fn submit(
        &self,
        sender: Address,
        contract: Address,
        function: impl Into<String>,
        args: Vec<Primitive>,
    ) -> Result<TxHash, SubmitError> {
        let function = function.into();
        let mut state = self.inner.lock().await;
        let deployed = state
            .contracts
            .get(&contract)
            .ok_or_else(|| SubmitError::UnknownContract(contract.clone()))?;
        deployed.instance.schema().check_call(&function, &args, true)?;

        state.nonce += 1;
        let tx_hash = derive_tx_hash(state.nonce, &sender, &contract, &function);
        info!(tx_hash = %tx_hash, contract = %contract, function = %function, "transaction accepted");
        state.mempool.push_back(PendingTransaction {
            tx_hash: tx_hash.clone(),
            sender,
            contract,
            function,
            args,
        });
        Ok(tx_hash)
    }

    /// Executes a read-only call against current state.
    pub async fn call(
        &self,
        contract: &Address,
        function: &str,
        args: &[Primitive],
    ) -> Result<Vec<Primitive>, CallError> {
        let state = self.inner.lock().await;
        let deployed = state
            .contracts
            .get(contract)
            .ok_or_else(|| CallError::UnknownContract(contract.clone()))?;
        deployed.instance.schema().check_call(function, args, false)?;
        Ok(deployed.instance.view(function, args)?)
    }

    pub async fn receipt(&self, tx_hash: &TxHash) -> Option<TransactionReceipt> {
        let state = self.inner.lock().await;
        state.receipts.get(tx_hash).cloned()
    }

    /// Waits until a receipt for `tx_hash` exists or `wait` elapses.
    pub async fn wait_for_receipt(
        &self,
        tx_hash: &TxHash,
        wait: Duration,
    ) -> Option<TransactionReceipt> {
        let mut sealed = self.sealed.subscribe();
        if let Some(receipt) = self.receipt(tx_hash).await {
            return Some(receipt);
        }
        let deadline = tokio::time::Instant::now() + wait;
        loop {
            match tokio::time::timeout_at(deadline, sealed.recv()).await {
                Ok(Ok(hash)) if hash == *tx_hash => return self.receipt(tx_hash).await,
                Ok(Ok(_)) => continue,
                Ok(Err(broadcast::error::RecvError::Lagged(_))) => {
                    if let Some(receipt) = self.receipt(tx_hash).await {
                        return Some(receipt);
                    }
                }
                Ok(Err(broadcast::error::RecvError::Closed)) | Err(_) => {
                    return self.receipt(tx_hash).await
                }
            }
        }
    }

    /// Seals every transaction currently in the mempool, oldest first.
    pub async fn seal_pending(&self) -> usize {
        let mut sealed_count = 0;
        while self.seal_next().await.is_some() {
            sealed_count += 1;
        }
        sealed_count
    }

    /// Seals the oldest pending transaction, executing it against its target
    /// contract and recording the receipt. Demo contracts validate before
    /// mutating, so a revert leaves contract state untouched without a
    /// snapshot mechanism.
    pub async fn seal_next(&self) -> Option<TransactionReceipt> {
        let mut state = self.inner.lock().await;
        let pending = state.mempool.pop_front()?;

        let contract_balance = state
            .balances
            .get(&pending.contract)
            .copied()
            .unwrap_or(0);
        let ctx = CallContext {
            sender: pending.sender.clone(),
            contract_balance,
        };

        let outcome = match state.contracts.get_mut(&pending.contract) {
            Some(deployed) => deployed
                .instance
                .execute(&ctx, &pending.function, &pending.args),
            None => Err(Revert::new("contract disappeared before sealing")),
        };

        let status = match outcome {
            Ok(effects) => {
                let total: u128 = effects.transfers.iter().map(|(_, amount)| amount).sum();
                if total > contract_balance {
                    ReceiptStatus::Reverted {
                        reason: "transfer exceeds contract balance".to_string(),
                    }
                } else {
                    for (recipient, amount) in effects.transfers {
                        *state.balances.entry(pending.contract.clone()).or_insert(0) -= amount;
                        *state.balances.entry(recipient).or_insert(0) += amount;
                    }
                    ReceiptStatus::Confirmed
                }
            }
            Err(revert) => ReceiptStatus::Reverted {
                reason: revert.0,
            },
        };

        match &status {
            ReceiptStatus::Confirmed => {
                info!(tx_hash = %pending.tx_hash, function = %pending.function, "transaction sealed")
            }
            ReceiptStatus::Reverted { reason } => {
                warn!(tx_hash = %pending.tx_hash, function = %pending.function, reason = %reason, "transaction reverted")
            }
        }

        let receipt = TransactionReceipt {
            tx_hash: pending.tx_hash.clone(),
            status,
            sealed_at: Utc::now(),
        };
        state.receipts.insert(pending.tx_hash.clone(), receipt.clone());
        drop(state);

        let _ = self.sealed.send(pending.tx_hash);
        Some(receipt)
    }

    /// Spawns the background sealer: every `latency`, seals whatever is
    /// pending. Dropping the handle's task leaves queued submissions
    /// unsealed forever, which is how tests exercise the timeout path.
    pub fn spawn_sealer(&self, latency: Duration) -> JoinHandle<()> {
        let ledger = self.clone();
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(latency).await;
                ledger.seal_pending().await;
            }
        })
    }
}

fn derive_contract_address(name: &str, nonce: u64) -> Address {
    let mut hasher = Sha256::new();
    hasher.update(b"contract");
    hasher.update(name.as_bytes());
    hasher.update(nonce.to_be_bytes());
    hasher.update(Uuid::new_v4().as_bytes());
    Address::from_digest(hasher.finalize().as_slice())
}

fn derive_tx_hash(nonce: u64, sender: &Address, contract: &Address, function: &str) -> TxHash {
    let mut hasher = Sha256::new();
    hasher.update(nonce.to_be_bytes());
    hasher.update(sender.as_str().as_bytes());
    hasher.update(contract.as_str().as_bytes());
    hasher.update(function.as_bytes());
    hasher.update(Uuid::new_v4().as_bytes());
    TxHash::from_digest(hasher.finalize().as_slice())
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
