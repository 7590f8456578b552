//! Starknet RPC capability and its JSON-RPC implementation.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::RpcError;
use crate::net::{CancelSignal, Interrupted, run_with_deadline};
use crate::sanitize::redact_sensitive_detail;
use crate::starknet::Felt;

/// A read-only contract call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FunctionCall {
    pub contract_address: Felt,
    pub entry_point_selector: Felt,
    pub calldata: Vec<Felt>,
}

impl FunctionCall {
    pub fn new(contract_address: Felt, entrypoint: &str, calldata: Vec<Felt>) -> Self {
        Self {
            contract_address,
            entry_point_selector: Felt::selector(entrypoint),
            calldata,
        }
    }
}

/// Receipt fields the status classifier consumes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawReceipt {
    #[serde(default)]
    pub execution_status: Option<String>,
    #[serde(default)]
    pub finality_status: Option<String>,
    #[serde(default)]
    pub revert_reason: Option<String>,
}

/// Opaque request/response access to a Starknet node.
#[async_trait]
pub trait StarknetRpc: Send + Sync {
    /// Execute a read-only call against the latest block.
    async fn call(&self, request: &FunctionCall) -> Result<Vec<Felt>, RpcError>;

    /// Fetch the receipt of a submitted transaction.
    async fn transaction_receipt(&self, tx_hash: &Felt) -> Result<RawReceipt, RpcError>;
}

/// JSON-RPC 2.0 client for a Starknet node.
pub struct JsonRpcClient {
    client: reqwest::Client,
    url: String,
    timeout: Duration,
    cancel: Option<CancelSignal>,
    next_id: AtomicU64,
}

impl JsonRpcClient {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
            timeout,
            cancel: None,
            next_id: AtomicU64::new(1),
        }
    }

    /// Abort in-flight and future requests when `signal` fires.
    pub fn with_cancel(mut self, signal: CancelSignal) -> Self {
        self.cancel = Some(signal);
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Chain id of the node, e.g. `SN_SEPOLIA` as a short string felt.
    pub async fn chain_id(&self) -> Result<Felt, RpcError> {
        let result = self.request("starknet_chainId", json!([])).await?;
        serde_json::from_value(result).map_err(|e| RpcError::InvalidResponse(e.to_string()))
    }

    async fn request(
        &self,
        method: &str,
        params: serde_json::Value,
    ) -> Result<serde_json::Value, RpcError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });

        tracing::debug!(method, id, "starknet rpc request");
        let send = async {
            let response = self
                .client
                .post(&self.url)
                .json(&body)
                .send()
                .await
                .map_err(|e| self.classify_transport(&e))?;
            let status = response.status();
            if !status.is_success() {
                return Err(RpcError::Transport(format!("HTTP {}", status.as_u16())));
            }
            response
                .json::<serde_json::Value>()
                .await
                .map_err(|e| RpcError::InvalidResponse(e.to_string()))
        };

        let envelope = run_with_deadline(send, self.timeout, self.cancel.as_ref())
            .await
            .map_err(|interrupted| match interrupted {
                Interrupted::TimedOut => RpcError::Timeout {
                    timeout: self.timeout,
                },
                Interrupted::Cancelled => RpcError::Cancelled,
            })??;

        if let Some(error) = envelope.get("error") {
            let code = error.get("code").and_then(|c| c.as_i64()).unwrap_or(-1);
            let message = error
                .get("message")
                .and_then(|m| m.as_str())
                .unwrap_or("unknown error")
                .to_string();
            return Err(RpcError::Node { code, message });
        }

        envelope
            .get("result")
            .cloned()
            .ok_or_else(|| RpcError::InvalidResponse("missing result".to_string()))
    }

    fn classify_transport(&self, error: &reqwest::Error) -> RpcError {
        if error.is_timeout() {
            RpcError::Timeout {
                timeout: self.timeout,
            }
        } else {
            RpcError::Transport(redact_sensitive_detail(&error.to_string()))
        }
    }
}

#[async_trait]
impl StarknetRpc for JsonRpcClient {
    async fn call(&self, request: &FunctionCall) -> Result<Vec<Felt>, RpcError> {
        let result = self
            .request(
                "starknet_call",
                json!({ "request": request, "block_id": "latest" }),
            )
            .await?;
        serde_json::from_value(result).map_err(|e| RpcError::InvalidResponse(e.to_string()))
    }

    async fn transaction_receipt(&self, tx_hash: &Felt) -> Result<RawReceipt, RpcError> {
        let result = self
            .request(
                "starknet_getTransactionReceipt",
                json!({ "transaction_hash": tx_hash }),
            )
            .await?;
        serde_json::from_value(result).map_err(|e| RpcError::InvalidResponse(e.to_string()))
    }
}
