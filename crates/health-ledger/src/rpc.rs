//! JSON-RPC 2.0 transport
//!
//! Methods used:
//! - `ledger_submitTransaction [SignedTransaction] -> { transactionId }`
//! - `ledger_getReceipt [transactionId] -> TransactionReceipt | null`
//! - `ledger_call [ContractCall] -> value`
//!
//! Submission returns once a terminal receipt is observed; receipts are
//! polled at a fixed interval.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::LedgerError;
use crate::receipt::TransactionReceipt;
use crate::transaction::{ContractCall, SignedTransaction};
use crate::transport::LedgerTransport;

/// Error code the node uses for "entity does not exist"
const NOT_FOUND_CODE: i64 = -32004;

#[derive(Serialize)]
struct RpcRequest<'a, P: Serialize> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: P,
}

#[derive(Debug, Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
struct RpcResponse<T> {
    result: Option<T>,
    error: Option<RpcErrorObject>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Submitted {
    transaction_id: String,
}

/// Map a decoded response envelope into a result
fn into_result<T>(method: &str, response: RpcResponse<T>) -> Result<Option<T>, LedgerError> {
    if let Some(err) = response.error {
        return Err(if err.code == NOT_FOUND_CODE {
            LedgerError::NotFound(err.message)
        } else {
            LedgerError::reverted(format!("{} failed ({}): {}", method, err.code, err.message))
        });
    }
    Ok(response.result)
}

pub struct JsonRpcTransport {
    client: reqwest::Client,
    endpoint: String,
    poll_interval: Duration,
    next_id: AtomicU64,
}

impl JsonRpcTransport {
    pub fn new(endpoint: impl Into<String>, poll_interval: Duration) -> Result<Self, LedgerError> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| LedgerError::Unreachable(format!("cannot build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
            poll_interval,
            next_id: AtomicU64::new(1),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn rpc<P, T>(&self, method: &str, params: P) -> Result<Option<T>, LedgerError>
    where
        P: Serialize + Send,
        T: DeserializeOwned,
    {
        let request = RpcRequest {
            jsonrpc: "2.0",
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            method,
            params,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|e| LedgerError::Unreachable(format!("{}: {}", self.endpoint, e)))?;

        if !response.status().is_success() {
            return Err(LedgerError::Unreachable(format!(
                "{} answered HTTP {}",
                self.endpoint,
                response.status()
            )));
        }

        let envelope: RpcResponse<T> = response
            .json()
            .await
            .map_err(|e| LedgerError::Malformed(format!("{} response: {}", method, e)))?;
        into_result(method, envelope)
    }
}

#[async_trait]
impl LedgerTransport for JsonRpcTransport {
    async fn submit(&self, tx: SignedTransaction) -> Result<TransactionReceipt, LedgerError> {
        let submitted: Submitted = self
            .rpc("ledger_submitTransaction", [&tx])
            .await?
            .ok_or_else(|| LedgerError::Malformed("submission returned no transaction id".to_string()))?;

        loop {
            let receipt: Option<TransactionReceipt> = self
                .rpc("ledger_getReceipt", [&submitted.transaction_id])
                .await?;
            match receipt {
                Some(receipt) if receipt.status.is_terminal() => return Ok(receipt),
                Some(_) | None => {
                    debug!(transaction_id = %submitted.transaction_id, "receipt pending");
                    tokio::time::sleep(self.poll_interval).await;
                }
            }
        }
    }

    async fn call(&self, call: ContractCall) -> Result<serde_json::Value, LedgerError> {
        let value: Option<serde_json::Value> = self.rpc("ledger_call", [&call]).await?;
        Ok(value.unwrap_or(serde_json::Value::Null))
    }
}
