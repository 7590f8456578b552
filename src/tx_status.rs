//! Transaction finality classification and bounded polling.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::RpcError;
use crate::net::CancelSignal;
use crate::sanitize::{redact_sensitive_detail, scrub_revert_reason};
use crate::starknet::{Felt, RawReceipt, StarknetRpc};

/// Finality values that settle a transaction's outcome.
pub const FINALIZED_STATUSES: [&str; 2] = ["ACCEPTED_ON_L2", "ACCEPTED_ON_L1"];

pub const EXECUTION_SUCCEEDED: &str = "SUCCEEDED";
pub const EXECUTION_REVERTED: &str = "REVERTED";

/// Settled outcome of a finalized transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TxOutcome {
    Succeeded,
    Reverted,
    Unknown,
}

impl TxOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Succeeded => "succeeded",
            Self::Reverted => "reverted",
            Self::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TxStatusResult {
    /// False means the caller should keep polling.
    pub finalized: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<TxOutcome>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution_status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finality_status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revert_reason: Option<String>,
}

impl TxStatusResult {
    fn pending(finality_status: Option<String>) -> Self {
        Self {
            finalized: false,
            status: None,
            execution_status: None,
            finality_status,
            revert_reason: None,
        }
    }

    fn unknown(reason: Option<String>) -> Self {
        Self {
            finalized: true,
            status: Some(TxOutcome::Unknown),
            execution_status: None,
            finality_status: None,
            revert_reason: reason,
        }
    }
}

/// Classify raw receipt fields.
pub fn classify_receipt(receipt: &RawReceipt) -> TxStatusResult {
    let finality = receipt.finality_status.as_deref().map(str::trim);
    let finalized = finality.is_some_and(|f| FINALIZED_STATUSES.contains(&f));
    if !finalized {
        return TxStatusResult::pending(receipt.finality_status.clone());
    }

    let execution = receipt.execution_status.as_deref().map(str::trim);
    let (status, revert_reason) = match execution {
        Some(EXECUTION_REVERTED) => (
            TxOutcome::Reverted,
            Some(scrub_revert_reason(
                receipt.revert_reason.as_deref().unwrap_or("reverted"),
            )),
        ),
        Some(EXECUTION_SUCCEEDED) => (TxOutcome::Succeeded, None),
        _ => (TxOutcome::Unknown, None),
    };

    TxStatusResult {
        finalized: true,
        status: Some(status),
        execution_status: receipt.execution_status.clone(),
        finality_status: receipt.finality_status.clone(),
        revert_reason,
    }
}

/// Look up and classify a transaction.
///
/// A "not found" lookup error means the transaction is still pending. Any
/// other error settles as `unknown` so pollers do not spin forever.
pub async fn fetch_tx_status(rpc: &dyn StarknetRpc, tx_hash: &Felt) -> TxStatusResult {
    match rpc.transaction_receipt(tx_hash).await {
        Ok(receipt) => classify_receipt(&receipt),
        Err(e) if e.is_not_found() => {
            tracing::debug!(tx_hash = %tx_hash, "transaction not found yet");
            TxStatusResult::pending(None)
        }
        Err(e) => {
            let detail = redact_sensitive_detail(&e.to_string());
            tracing::warn!(tx_hash = %tx_hash, error = %detail, "receipt lookup failed");
            TxStatusResult::unknown(Some(scrub_revert_reason(&detail)))
        }
    }
}

/// Poll until finalized, at most `max_attempts` lookups spaced by `interval`.
///
/// Returns the last non-finalized result when attempts run out.
pub async fn poll_tx_status(
    rpc: &dyn StarknetRpc,
    tx_hash: &Felt,
    interval: Duration,
    max_attempts: u32,
    cancel: Option<&CancelSignal>,
) -> Result<TxStatusResult, RpcError> {
    let mut last = TxStatusResult::pending(None);
    for attempt in 1..=max_attempts.max(1) {
        if cancel.is_some_and(CancelSignal::is_cancelled) {
            return Err(RpcError::Cancelled);
        }
        last = fetch_tx_status(rpc, tx_hash).await;
        if last.finalized {
            tracing::info!(
                tx_hash = %tx_hash,
                status = last.status.map(TxOutcome::as_str).unwrap_or("unknown"),
                attempt,
                "transaction finalized"
            );
            return Ok(last);
        }
        if attempt < max_attempts {
            match cancel {
                Some(signal) => {
                    let mut signal = signal.clone();
                    tokio::select! {
                        biased;
                        _ = signal.cancelled() => return Err(RpcError::Cancelled),
                        _ = tokio::time::sleep(interval) => {}
                    }
                }
                None => tokio::time::sleep(interval).await,
            }
        }
    }
    tracing::debug!(tx_hash = %tx_hash, max_attempts, "transaction still pending after polling");
    Ok(last)
}
