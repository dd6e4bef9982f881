use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use shared::{
    domain::{Address, Operation, Primitive, Query},
    error::ApiError,
    protocol::{
        AccountBalanceResponse, CallRequest, CallResponse, ContractSummary, ReceiptStatus,
        SubmitTransactionRequest, SubmitTransactionResponse, TransactionReceipt,
    },
};
use url::Url;

use crate::{CallOutcome, ContractNode, NodeError, SubmissionHandle};

/// How long each receipt long-poll round asks the node to hold the request.
const RECEIPT_WAIT: Duration = Duration::from_secs(5);

/// [`ContractNode`] over the dev node's HTTP surface. Outcome observation
/// long-polls the receipt endpoint; the coordinator bounds the overall wait.
#[derive(Debug)]
pub struct HttpContractNode {
    http: Client,
    base_url: Url,
    receipt_wait: Duration,
}

impl HttpContractNode {
    pub fn new(base_url: &str) -> Result<Self, NodeError> {
        let base_url = Url::parse(base_url)
            .map_err(|err| NodeError::Transport(format!("invalid node url: {err}")))?;
        Ok(Self {
            http: Client::new(),
            base_url,
            receipt_wait: RECEIPT_WAIT,
        })
    }

    pub fn with_receipt_wait(mut self, receipt_wait: Duration) -> Self {
        self.receipt_wait = receipt_wait;
        self
    }

    fn endpoint(&self, path: &str) -> Result<Url, NodeError> {
        self.base_url
            .join(path)
            .map_err(|err| NodeError::Transport(format!("invalid endpoint path: {err}")))
    }

    /// The demo contracts the node deployed at startup.
    pub async fn contracts(&self) -> Result<Vec<ContractSummary>, NodeError> {
        let url = self.endpoint("/contracts")?;
        let response = self.http.get(url).send().await.map_err(transport)?;
        if !response.status().is_success() {
            return Err(NodeError::Query(api_error_message(response).await));
        }
        response.json().await.map_err(transport)
    }

    /// Native balance of an account or contract. Node-level state, not a
    /// contract call, so it lives outside the [`ContractNode`] seam.
    pub async fn native_balance(&self, address: &Address) -> Result<u128, NodeError> {
        let url = self.endpoint(&format!("/accounts/{address}/balance"))?;
        let response = self.http.get(url).send().await.map_err(transport)?;
        if !response.status().is_success() {
            return Err(NodeError::Query(api_error_message(response).await));
        }
        let body: AccountBalanceResponse = response.json().await.map_err(transport)?;
        Ok(body.balance)
    }
}

#[async_trait]
impl ContractNode for HttpContractNode {
    async fn submit(&self, operation: &Operation) -> Result<SubmissionHandle, NodeError> {
        let url = self.endpoint("/transactions")?;
        let response = self
            .http
            .post(url)
            .json(&SubmitTransactionRequest {
                sender: operation.sender.clone(),
                contract: operation.contract.clone(),
                function: operation.function.clone(),
                args: operation.args.clone(),
            })
            .send()
            .await
            .map_err(transport)?;

        let status = response.status();
        if status.is_success() {
            let body: SubmitTransactionResponse = response.json().await.map_err(transport)?;
            return Ok(body.tx_hash);
        }
        let message = api_error_message(response).await;
        if status.is_client_error() {
            Err(NodeError::Rejected(message))
        } else {
            Err(NodeError::Transport(message))
        }
    }

    async fn outcome(&self, handle: &SubmissionHandle) -> Result<CallOutcome, NodeError> {
        let url = self.endpoint(&format!("/transactions/{handle}/receipt"))?;
        loop {
            let response = self
                .http
                .get(url.clone())
                .query(&[("wait_ms", self.receipt_wait.as_millis() as u64)])
                .send()
                .await
                .map_err(transport)?;

            match response.status() {
                StatusCode::OK => {
                    let receipt: TransactionReceipt =
                        response.json().await.map_err(transport)?;
                    return Ok(match receipt.status {
                        ReceiptStatus::Confirmed => CallOutcome::Confirmed,
                        ReceiptStatus::Reverted { reason } => CallOutcome::Reverted(reason),
                    });
                }
                // Not sealed yet; keep polling. The coordinator's timeout
                // bounds this loop.
                StatusCode::NOT_FOUND => continue,
                _ => return Err(NodeError::Transport(api_error_message(response).await)),
            }
        }
    }

    async fn call(&self, query: &Query) -> Result<Vec<Primitive>, NodeError> {
        let url = self.endpoint("/call")?;
        let response = self
            .http
            .post(url)
            .json(&CallRequest {
                contract: query.contract.clone(),
                function: query.function.clone(),
                args: query.args.clone(),
            })
            .send()
            .await
            .map_err(transport)?;

        if !response.status().is_success() {
            return Err(NodeError::Query(api_error_message(response).await));
        }
        let body: CallResponse = response.json().await.map_err(transport)?;
        Ok(body.values)
    }
}

fn transport(err: reqwest::Error) -> NodeError {
    NodeError::Transport(err.to_string())
}

async fn api_error_message(response: Response) -> String {
    let status = response.status();
    match response.json::<ApiError>().await {
        Ok(api_error) => api_error.message,
        Err(_) => format!("node responded with status {status}"),
    }
}

#[cfg(test)]
#[path = "tests/transport_tests.rs"]
mod tests;
