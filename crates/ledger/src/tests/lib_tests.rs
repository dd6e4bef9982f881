use contracts::{BalanceRegistry, Counter, Vault, Variant};
use shared::domain::Primitive;

use super::*;

fn alice() -> Address {
    Address::from_digest(&[0xa1; 32])
}

fn bob() -> Address {
    Address::from_digest(&[0xb0; 32])
}

async fn deploy_counter(ledger: &Ledger, variant: Variant) -> Address {
    ledger
        .deploy("Counter", Box::new(Counter::new(variant)), 0)
        .await
}

#[tokio::test]
async fn submit_rejects_unknown_contract() {
    let ledger = Ledger::new();
    let ghost = Address::from_digest(&[0xee; 32]);
    let err = ledger
        .submit(alice(), ghost.clone(), "increment", vec![Primitive::uint8(1)])
        .await
        .expect_err("must reject");
    assert!(matches!(err, SubmitError::UnknownContract(address) if address == ghost));
}

#[tokio::test]
async fn submit_rejects_schema_mismatch_before_pending() {
    let ledger = Ledger::new();
    let counter = deploy_counter(&ledger, Variant::Fixed).await;

    let err = ledger
        .submit(
            alice(),
            counter.clone(),
            "increment",
            vec![Primitive::uint256(1)],
        )
        .await
        .expect_err("wrong width must reject");
    assert!(matches!(err, SubmitError::Schema(SchemaError::KindMismatch { .. })));

    let err = ledger
        .submit(alice(), counter.clone(), "bump", vec![])
        .await
        .expect_err("unknown function must reject");
    assert!(matches!(err, SubmitError::Schema(SchemaError::UnknownFunction(_))));

    // Nothing entered the mempool, so sealing produces no receipts.
    assert_eq!(ledger.seal_pending().await, 0);
}

#[tokio::test]
async fn sealed_transaction_confirms_and_updates_view() {
    let ledger = Ledger::new();
    let counter = deploy_counter(&ledger, Variant::Fixed).await;

    let tx_hash = ledger
        .submit(alice(), counter.clone(), "increment", vec![Primitive::uint8(5)])
        .await
        .expect("submit");
    assert!(ledger.receipt(&tx_hash).await.is_none());

    let receipt = ledger.seal_next().await.expect("seal");
    assert_eq!(receipt.tx_hash, tx_hash);
    assert_eq!(receipt.status, ReceiptStatus::Confirmed);

    let values = ledger.call(&counter, "balance", &[]).await.expect("call");
    assert_eq!(values, vec![Primitive::uint8(15)]);
}

#[tokio::test]
async fn reverted_transaction_records_reason_and_leaves_state() {
    let ledger = Ledger::new();
    let counter = deploy_counter(&ledger, Variant::Fixed).await;

    let tx_hash = ledger
        .submit(
            alice(),
            counter.clone(),
            "increment",
            vec![Primitive::uint8(250)],
        )
        .await
        .expect("submit");
    let receipt = ledger.seal_next().await.expect("seal");
    assert_eq!(receipt.tx_hash, tx_hash);
    assert_eq!(
        receipt.status,
        ReceiptStatus::Reverted {
            reason: "overflow".to_string()
        }
    );

    let values = ledger.call(&counter, "balance", &[]).await.expect("call");
    assert_eq!(values, vec![Primitive::uint8(10)]);
}

#[tokio::test]
async fn withdraw_moves_native_balance_to_caller() {
    let ledger = Ledger::new();
    let vault = ledger
        .deploy(
            "Vault",
            Box::new(Vault::new(Variant::Vulnerable, alice())),
            1_000,
        )
        .await;

    ledger
        .submit(bob(), vault.clone(), "withdraw", vec![])
        .await
        .expect("submit");
    let receipt = ledger.seal_next().await.expect("seal");
    assert_eq!(receipt.status, ReceiptStatus::Confirmed);

    assert_eq!(ledger.balance(&vault).await, 0);
    assert_eq!(ledger.balance(&bob()).await, 1_000);
}

#[tokio::test]
async fn call_rejects_mutating_function_as_query() {
    let ledger = Ledger::new();
    let registry = ledger
        .deploy(
            "BalanceRegistry",
            Box::new(BalanceRegistry::new(Variant::Vulnerable, alice())),
            0,
        )
        .await;

    let err = ledger
        .call(
            &registry,
            "setBalance",
            &[Primitive::address(bob()), Primitive::uint256(1)],
        )
        .await
        .expect_err("mutating call must not run as a view");
    assert!(matches!(err, CallError::Schema(SchemaError::NotView { .. })));
}

#[tokio::test]
async fn wait_for_receipt_wakes_when_sealer_lands() {
    let ledger = Ledger::new();
    let counter = deploy_counter(&ledger, Variant::Fixed).await;
    let sealer = ledger.spawn_sealer(Duration::from_millis(20));

    let tx_hash = ledger
        .submit(alice(), counter, "increment", vec![Primitive::uint8(1)])
        .await
        .expect("submit");
    let receipt = ledger
        .wait_for_receipt(&tx_hash, Duration::from_secs(2))
        .await
        .expect("receipt within wait window");
    assert_eq!(receipt.status, ReceiptStatus::Confirmed);

    sealer.abort();
}

#[tokio::test]
async fn wait_for_receipt_times_out_without_a_sealer() {
    let ledger = Ledger::new();
    let counter = deploy_counter(&ledger, Variant::Fixed).await;

    let tx_hash = ledger
        .submit(alice(), counter, "increment", vec![Primitive::uint8(1)])
        .await
        .expect("submit");
    let receipt = ledger
        .wait_for_receipt(&tx_hash, Duration::from_millis(50))
        .await;
    assert!(receipt.is_none());
}

#[tokio::test]
async fn tx_hashes_are_unique_per_submission() {
    let ledger = Ledger::new();
    let counter = deploy_counter(&ledger, Variant::Fixed).await;

    let first = ledger
        .submit(alice(), counter.clone(), "increment", vec![Primitive::uint8(1)])
        .await
        .expect("submit");
    let second = ledger
        .submit(alice(), counter, "increment", vec![Primitive::uint8(1)])
        .await
        .expect("submit");
    assert_ne!(first, second);
}
