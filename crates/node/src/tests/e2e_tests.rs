use std::{sync::Arc, time::Duration};

use client_core::{
    CacheRefreshBinding, FailureReason, HttpContractNode, LifecycleStatus, NoopConfirmationSink,
    ReadCache, WriteCoordinator,
};
use shared::domain::{Operation, Primitive, Query};

use crate::api_tests::{attacker, contract_address, deployer, spawn_node};

fn transport(base_url: &str) -> Arc<HttpContractNode> {
    Arc::new(
        HttpContractNode::new(base_url)
            .expect("valid url")
            .with_receipt_wait(Duration::from_millis(50)),
    )
}

#[tokio::test]
async fn confirmed_write_refreshes_the_dependent_balance_read() {
    let (base_url, _ledger) = spawn_node(Some(Duration::from_millis(20))).await;
    let registry = contract_address(&base_url, "BalanceRegistryVulnerable").await;
    let node = transport(&base_url);

    let balances_query = Query::new(
        registry.clone(),
        "balances",
        vec![Primitive::address(attacker())],
    );
    let cache = Arc::new(ReadCache::new(node.clone()));
    let key = cache.register(balances_query).await.expect("register");
    let binding = CacheRefreshBinding::new(cache.clone()).depends_on(
        registry.clone(),
        "setBalance",
        vec![key.clone()],
    );
    let coordinator = WriteCoordinator::new(node, Arc::new(binding), Duration::from_secs(5));

    let status = coordinator
        .submit(Operation::new(
            attacker(),
            registry,
            "setBalance",
            vec![Primitive::address(attacker()), Primitive::uint256(500)],
        ))
        .await
        .expect("submit");
    assert!(matches!(status, LifecycleStatus::AwaitingConfirmation { .. }));

    let status = coordinator.observe().await.expect("observe");
    assert!(matches!(status, LifecycleStatus::Confirmed { .. }));

    let snapshot = cache.get(&key).await.expect("snapshot");
    assert_eq!(snapshot.value, Some(vec![Primitive::uint256(500)]));
    assert!(snapshot.fetched_at.is_some());
}

#[tokio::test]
async fn overflowing_increment_reverts_and_skips_the_refresh() {
    let (base_url, _ledger) = spawn_node(Some(Duration::from_millis(20))).await;
    let counter = contract_address(&base_url, "CounterFixed").await;
    let node = transport(&base_url);

    let balance_query = Query::new(counter.clone(), "balance", vec![]);
    let cache = Arc::new(ReadCache::new(node.clone()));
    let key = cache.register(balance_query).await.expect("register");
    let binding = CacheRefreshBinding::new(cache.clone()).depends_on(
        counter.clone(),
        "increment",
        vec![key.clone()],
    );
    let coordinator = WriteCoordinator::new(node, Arc::new(binding), Duration::from_secs(5));

    coordinator
        .submit(Operation::new(
            deployer(),
            counter,
            "increment",
            vec![Primitive::uint8(250)],
        ))
        .await
        .expect("submit");
    let status = coordinator.observe().await.expect("observe");
    assert_eq!(
        status,
        LifecycleStatus::Failed {
            reason: FailureReason::Reverted("overflow".to_string())
        }
    );

    let snapshot = cache.get(&key).await.expect("snapshot");
    assert_eq!(snapshot.value, None);
}

#[tokio::test]
async fn observation_times_out_while_the_ledger_seals_later() {
    // No sealer: the pending set never drains on its own.
    let (base_url, ledger) = spawn_node(None).await;
    let counter = contract_address(&base_url, "CounterFixed").await;
    let node = transport(&base_url);
    let coordinator = WriteCoordinator::new(
        node,
        Arc::new(NoopConfirmationSink),
        Duration::from_millis(200),
    );

    let status = coordinator
        .submit(Operation::new(
            deployer(),
            counter,
            "increment",
            vec![Primitive::uint8(1)],
        ))
        .await
        .expect("submit");
    let LifecycleStatus::AwaitingConfirmation { handle } = status else {
        panic!("expected awaiting confirmation, got {status}");
    };

    let status = coordinator.observe().await.expect("observe");
    assert_eq!(
        status,
        LifecycleStatus::Failed {
            reason: FailureReason::TimedOut
        }
    );

    // The abandoned operation still completes on the ledger; only the local
    // tracking is lost.
    ledger.seal_pending().await;
    assert!(ledger.receipt(&handle).await.is_some());
}

#[tokio::test]
async fn open_withdraw_drains_the_vault_for_an_attacker() {
    let (base_url, _ledger) = spawn_node(Some(Duration::from_millis(20))).await;
    let vault = contract_address(&base_url, "VaultVulnerable").await;
    let node = transport(&base_url);

    let vault_before = node.native_balance(&vault).await.expect("balance");
    let attacker_before = node.native_balance(&attacker()).await.expect("balance");
    assert!(vault_before > 0);

    let coordinator = WriteCoordinator::new(
        node.clone(),
        Arc::new(NoopConfirmationSink),
        Duration::from_secs(5),
    );
    coordinator
        .submit(Operation::new(attacker(), vault.clone(), "withdraw", vec![]))
        .await
        .expect("submit");
    let status = coordinator.observe().await.expect("observe");
    assert!(matches!(status, LifecycleStatus::Confirmed { .. }));

    assert_eq!(node.native_balance(&vault).await.expect("balance"), 0);
    assert_eq!(
        node.native_balance(&attacker()).await.expect("balance"),
        attacker_before + vault_before
    );
}

#[tokio::test]
async fn guarded_withdraw_reverts_for_an_attacker() {
    let (base_url, _ledger) = spawn_node(Some(Duration::from_millis(20))).await;
    let vault = contract_address(&base_url, "VaultFixed").await;
    let node = transport(&base_url);

    let coordinator = WriteCoordinator::new(
        node.clone(),
        Arc::new(NoopConfirmationSink),
        Duration::from_secs(5),
    );
    coordinator
        .submit(Operation::new(attacker(), vault.clone(), "withdraw", vec![]))
        .await
        .expect("submit");
    let status = coordinator.observe().await.expect("observe");
    assert_eq!(
        status,
        LifecycleStatus::Failed {
            reason: FailureReason::Reverted("caller is not the owner".to_string())
        }
    );
    assert!(node.native_balance(&vault).await.expect("balance") > 0);
}
