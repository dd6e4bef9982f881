use std::{sync::Arc, time::Duration};

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use ledger::{CallError, SubmitError};
use serde::Deserialize;
use shared::{
    domain::{Address, TxHash},
    error::{ApiError, ErrorCode},
    protocol::{
        AccountBalanceResponse, CallRequest, CallResponse, ContractSummary,
        SubmitTransactionRequest, SubmitTransactionResponse, TransactionReceipt,
    },
};

use crate::app_state::AppState;

/// Longest single long-poll a client may request for a receipt.
const MAX_RECEIPT_WAIT_MS: u64 = 30_000;

type ApiResult<T> = Result<Json<T>, (StatusCode, Json<ApiError>)>;

pub(crate) fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/contracts", get(list_contracts))
        .route("/transactions", post(submit_transaction))
        .route("/transactions/:tx_hash/receipt", get(transaction_receipt))
        .route("/call", post(call_contract))
        .route("/accounts/:address/balance", get(account_balance))
        .with_state(state)
}

async fn healthz() -> &'static str {
    "ok"
}

async fn list_contracts(State(state): State<Arc<AppState>>) -> Json<Vec<ContractSummary>> {
    Json(state.ledger.contracts().await)
}

async fn submit_transaction(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SubmitTransactionRequest>,
) -> ApiResult<SubmitTransactionResponse> {
    let tx_hash = state
        .ledger
        .submit(req.sender, req.contract, req.function, req.args)
        .await
        .map_err(|err| {
            let message = match &err {
                SubmitError::UnknownContract(_) => err.to_string(),
                SubmitError::Schema(schema) => schema.to_string(),
            };
            (
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(ApiError::new(ErrorCode::Rejected, message)),
            )
        })?;
    Ok(Json(SubmitTransactionResponse { tx_hash }))
}

#[derive(Debug, Deserialize)]
struct ReceiptQuery {
    wait_ms: Option<u64>,
}

async fn transaction_receipt(
    State(state): State<Arc<AppState>>,
    Path(tx_hash): Path<String>,
    Query(query): Query<ReceiptQuery>,
) -> ApiResult<TransactionReceipt> {
    let tx_hash = TxHash::parse(tx_hash).map_err(|err| {
        (
            StatusCode::BAD_REQUEST,
            Json(ApiError::new(ErrorCode::Validation, err.to_string())),
        )
    })?;

    let wait_ms = query.wait_ms.unwrap_or(0).min(MAX_RECEIPT_WAIT_MS);
    let receipt = if wait_ms == 0 {
        state.ledger.receipt(&tx_hash).await
    } else {
        state
            .ledger
            .wait_for_receipt(&tx_hash, Duration::from_millis(wait_ms))
            .await
    };

    receipt.map(Json).ok_or_else(|| {
        (
            StatusCode::NOT_FOUND,
            Json(ApiError::new(
                ErrorCode::NotFound,
                format!("no receipt for {tx_hash} yet"),
            )),
        )
    })
}

async fn call_contract(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CallRequest>,
) -> ApiResult<CallResponse> {
    let values = state
        .ledger
        .call(&req.contract, &req.function, &req.args)
        .await
        .map_err(|err| match err {
            CallError::UnknownContract(_) => (
                StatusCode::NOT_FOUND,
                Json(ApiError::new(ErrorCode::NotFound, err.to_string())),
            ),
            CallError::Schema(schema) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(ApiError::new(ErrorCode::Rejected, schema.to_string())),
            ),
            CallError::Reverted(revert) => (
                StatusCode::BAD_REQUEST,
                Json(ApiError::new(ErrorCode::Validation, revert.to_string())),
            ),
        })?;
    Ok(Json(CallResponse { values }))
}

async fn account_balance(
    State(state): State<Arc<AppState>>,
    Path(address): Path<String>,
) -> ApiResult<AccountBalanceResponse> {
    let address = Address::parse(address).map_err(|err| {
        (
            StatusCode::BAD_REQUEST,
            Json(ApiError::new(ErrorCode::Validation, err.to_string())),
        )
    })?;
    let balance = state.ledger.balance(&address).await;
    Ok(Json(AccountBalanceResponse { address, balance }))
}
