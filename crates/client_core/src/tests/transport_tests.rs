use std::{sync::Arc, time::Duration};

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use shared::{
    domain::{Operation, Primitive, Query, TxHash},
    error::{ApiError, ErrorCode},
    protocol::{
        CallRequest, CallResponse, ReceiptStatus, SubmitTransactionRequest,
        SubmitTransactionResponse, TransactionReceipt,
    },
};
use tokio::{net::TcpListener, sync::Mutex};

use super::*;
use crate::{CallOutcome, ContractNode, NodeError};

#[path = "support.rs"]
mod support;
use support::address;

fn fake_tx_hash() -> TxHash {
    TxHash::from_digest(&[0x77; 32])
}

#[derive(Clone)]
struct FakeNodeState {
    receipt_status: ReceiptStatus,
    receipt_ready_after: u32,
    receipt_fetches: Arc<Mutex<u32>>,
}

async fn fake_submit(
    Json(req): Json<SubmitTransactionRequest>,
) -> Result<Json<SubmitTransactionResponse>, (StatusCode, Json<ApiError>)> {
    if req.function == "bump" {
        return Err((
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(ApiError::new(ErrorCode::Rejected, "unknown function `bump`")),
        ));
    }
    Ok(Json(SubmitTransactionResponse {
        tx_hash: fake_tx_hash(),
    }))
}

async fn fake_receipt(
    State(state): State<FakeNodeState>,
    Path(_tx_hash): Path<String>,
) -> Result<Json<TransactionReceipt>, (StatusCode, Json<ApiError>)> {
    let mut fetches = state.receipt_fetches.lock().await;
    *fetches += 1;
    if *fetches <= state.receipt_ready_after {
        return Err((
            StatusCode::NOT_FOUND,
            Json(ApiError::new(ErrorCode::NotFound, "no receipt yet")),
        ));
    }
    Ok(Json(TransactionReceipt {
        tx_hash: fake_tx_hash(),
        status: state.receipt_status.clone(),
        sealed_at: chrono::Utc::now(),
    }))
}

async fn fake_call(
    Json(req): Json<CallRequest>,
) -> Result<Json<CallResponse>, (StatusCode, Json<ApiError>)> {
    match req.function.as_str() {
        "balance" => Ok(Json(CallResponse {
            values: vec![Primitive::uint8(10)],
        })),
        "readRecord" => Err((
            StatusCode::BAD_REQUEST,
            Json(ApiError::new(ErrorCode::Validation, "record does not exist")),
        )),
        _ => Err((
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(ApiError::new(ErrorCode::Rejected, "unknown function")),
        )),
    }
}

async fn spawn_fake_node(state: FakeNodeState) -> (String, FakeNodeState) {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    let app = Router::new()
        .route("/transactions", post(fake_submit))
        .route("/transactions/:tx_hash/receipt", get(fake_receipt))
        .route("/call", post(fake_call))
        .with_state(state.clone());
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    (format!("http://{addr}"), state)
}

fn confirming_state() -> FakeNodeState {
    FakeNodeState {
        receipt_status: ReceiptStatus::Confirmed,
        receipt_ready_after: 0,
        receipt_fetches: Arc::new(Mutex::new(0)),
    }
}

fn transport(base_url: &str) -> HttpContractNode {
    HttpContractNode::new(base_url)
        .expect("valid url")
        .with_receipt_wait(Duration::from_millis(10))
}

#[tokio::test]
async fn submit_returns_the_handle_issued_by_the_node() {
    let (base_url, _) = spawn_fake_node(confirming_state()).await;
    let node = transport(&base_url);

    let handle = node
        .submit(&Operation::new(
            address(1),
            address(2),
            "increment",
            vec![Primitive::uint8(1)],
        ))
        .await
        .expect("submit");
    assert_eq!(handle, fake_tx_hash());
}

#[tokio::test]
async fn submit_maps_a_rejection_body_onto_rejected() {
    let (base_url, _) = spawn_fake_node(confirming_state()).await;
    let node = transport(&base_url);

    let err = node
        .submit(&Operation::new(address(1), address(2), "bump", vec![]))
        .await
        .expect_err("must be rejected");
    assert_eq!(err, NodeError::Rejected("unknown function `bump`".into()));
}

#[tokio::test]
async fn outcome_long_polls_until_the_receipt_lands() {
    let mut state = confirming_state();
    state.receipt_ready_after = 2;
    let (base_url, state) = spawn_fake_node(state).await;
    let node = transport(&base_url);

    let outcome = node.outcome(&fake_tx_hash()).await.expect("outcome");
    assert_eq!(outcome, CallOutcome::Confirmed);
    assert!(*state.receipt_fetches.lock().await >= 3);
}

#[tokio::test]
async fn outcome_surfaces_the_revert_reason() {
    let mut state = confirming_state();
    state.receipt_status = ReceiptStatus::Reverted {
        reason: "overflow".into(),
    };
    let (base_url, _) = spawn_fake_node(state).await;
    let node = transport(&base_url);

    let outcome = node.outcome(&fake_tx_hash()).await.expect("outcome");
    assert_eq!(outcome, CallOutcome::Reverted("overflow".into()));
}

#[tokio::test]
async fn call_decodes_the_returned_tuple() {
    let (base_url, _) = spawn_fake_node(confirming_state()).await;
    let node = transport(&base_url);

    let values = node
        .call(&Query::new(address(2), "balance", vec![]))
        .await
        .expect("call");
    assert_eq!(values, vec![Primitive::uint8(10)]);
}

#[tokio::test]
async fn call_failure_carries_the_node_message_as_data() {
    let (base_url, _) = spawn_fake_node(confirming_state()).await;
    let node = transport(&base_url);

    let err = node
        .call(&Query::new(
            address(2),
            "readRecord",
            vec![Primitive::uint256(4)],
        ))
        .await
        .expect_err("must fail");
    assert_eq!(err, NodeError::Query("record does not exist".into()));
}

#[tokio::test]
async fn constructor_rejects_an_invalid_node_url() {
    let err = HttpContractNode::new("not a url").expect_err("must fail");
    assert!(matches!(err, NodeError::Transport(_)));
}
