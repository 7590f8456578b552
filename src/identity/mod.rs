//! On-chain agent identity registry client.
//!
//! Individual reads are best-effort and fall back to safe defaults. The
//! composite [`IdentityRegistry::lookup_agent_identity`] never fails; it folds
//! every problem into a [`TrustLevel`] and a warning.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{CodecError, RpcError};
use crate::sanitize::redact_sensitive_detail;
use crate::starknet::{Felt, FunctionCall, StarknetRpc, decode_byte_array, encode_byte_array};

/// Metadata key holding the agent's display name.
pub const METADATA_NAME: &str = "name";
/// Metadata key holding the agent's declared type.
pub const METADATA_AGENT_TYPE: &str = "agent_type";
/// Metadata key holding the agent's model identifier.
pub const METADATA_MODEL: &str = "model";

const UNREGISTERED_WARNING: &str =
    "Agent is not registered in the identity registry; verify the counterparty before proceeding";

/// 256-bit agent identifier, sent on-chain as `(low, high)` u128 halves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AgentId {
    pub low: u128,
    pub high: u128,
}

impl AgentId {
    pub fn calldata(&self) -> [Felt; 2] {
        [Felt::from_u128(self.low), Felt::from_u128(self.high)]
    }
}

impl From<u128> for AgentId {
    fn from(low: u128) -> Self {
        Self { low, high: 0 }
    }
}

impl FromStr for AgentId {
    type Err = CodecError;

    /// Accepts decimal (up to u128) or `0x` hex (up to 256 bits).
    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let trimmed = raw.trim();
        if let Some(digits) = trimmed.strip_prefix("0x") {
            if digits.is_empty() || digits.len() > 64 {
                return Err(CodecError::InvalidFelt(raw.to_string()));
            }
            let bytes = hex::decode(format!("{digits:0>64}"))
                .map_err(|_| CodecError::InvalidFelt(raw.to_string()))?;
            let mut high = [0u8; 16];
            let mut low = [0u8; 16];
            high.copy_from_slice(&bytes[..16]);
            low.copy_from_slice(&bytes[16..]);
            return Ok(Self {
                low: u128::from_be_bytes(low),
                high: u128::from_be_bytes(high),
            });
        }
        trimmed
            .parse::<u128>()
            .map(Self::from)
            .map_err(|_| CodecError::InvalidFelt(raw.to_string()))
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.high == 0 {
            write!(f, "{}", self.low)
        } else {
            write!(f, "0x{:032x}{:032x}", self.high, self.low)
        }
    }
}

/// Derived confidence in an on-chain identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrustLevel {
    Verified,
    Registered,
    Unknown,
    Error,
}

impl TrustLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Verified => "verified",
            Self::Registered => "registered",
            Self::Unknown => "unknown",
            Self::Error => "error",
        }
    }
}

/// Identity fields read from the registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityRecord {
    pub agent_id: String,
    pub exists: bool,
    pub metadata: BTreeMap<String, String>,
    pub wallet_address: Option<String>,
}

/// Result of a composite identity lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityState {
    pub trust: TrustLevel,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identity: Option<IdentityRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

impl IdentityState {
    fn error(message: impl fmt::Display) -> Self {
        Self {
            trust: TrustLevel::Error,
            identity: None,
            warning: Some(redact_sensitive_detail(&message.to_string())),
        }
    }
}

/// Failure inside the composite lookup; never escapes the client.
#[derive(Debug, thiserror::Error)]
enum LookupFailure {
    #[error("identity registry unavailable: {0}")]
    Rpc(#[from] RpcError),
    #[error("identity registry returned an empty response")]
    EmptyResponse,
}

/// Client for the agent identity registry contract.
#[derive(Clone)]
pub struct IdentityRegistry {
    rpc: Arc<dyn StarknetRpc>,
    address: Felt,
}

impl IdentityRegistry {
    pub fn new(rpc: Arc<dyn StarknetRpc>, address: Felt) -> Self {
        Self { rpc, address }
    }

    pub fn address(&self) -> Felt {
        self.address
    }

    async fn call(&self, entrypoint: &str, calldata: Vec<Felt>) -> Result<Vec<Felt>, RpcError> {
        self.rpc
            .call(&FunctionCall::new(self.address, entrypoint, calldata))
            .await
    }

    async fn try_agent_exists(&self, agent_id: AgentId) -> Result<bool, LookupFailure> {
        let result = self
            .call("agent_exists", agent_id.calldata().to_vec())
            .await?;
        let flag = result.first().ok_or(LookupFailure::EmptyResponse)?;
        Ok(!flag.is_zero())
    }

    /// Whether `agent_id` is registered. `false` when the read fails.
    pub async fn agent_exists(&self, agent_id: AgentId) -> bool {
        match self.try_agent_exists(agent_id).await {
            Ok(exists) => exists,
            Err(e) => {
                tracing::debug!(%agent_id, error = %e, "agent_exists read failed");
                false
            }
        }
    }

    /// Metadata value for `key`. Empty when missing or unreadable.
    pub async fn get_metadata(&self, agent_id: AgentId, key: &str) -> String {
        let mut calldata = agent_id.calldata().to_vec();
        calldata.extend(encode_byte_array(key));
        let decoded = match self.call("get_metadata", calldata).await {
            Ok(felts) => decode_byte_array(&felts).map_err(|e| e.to_string()),
            Err(e) => Err(e.to_string()),
        };
        decoded.unwrap_or_else(|error| {
            tracing::debug!(%agent_id, key, error = %redact_sensitive_detail(&error), "get_metadata read failed");
            String::new()
        })
    }

    /// Wallet bound to the agent. `None` when unbound or unreadable.
    pub async fn get_agent_wallet(&self, agent_id: AgentId) -> Option<Felt> {
        match self
            .call("get_agent_wallet", agent_id.calldata().to_vec())
            .await
        {
            Ok(felts) => felts.first().copied().filter(|wallet| !wallet.is_zero()),
            Err(e) => {
                tracing::debug!(%agent_id, error = %e, "get_agent_wallet read failed");
                None
            }
        }
    }

    /// Number of registered agents, saturating at `u128::MAX`. Zero when unreadable.
    pub async fn total_agents(&self) -> u128 {
        match self.call("total_agents", Vec::new()).await {
            Ok(felts) => {
                let low = felts.first().and_then(Felt::to_u128).unwrap_or(0);
                let high = felts.get(1).and_then(Felt::to_u128).unwrap_or(0);
                if high == 0 { low } else { u128::MAX }
            }
            Err(e) => {
                tracing::debug!(error = %e, "total_agents read failed");
                0
            }
        }
    }

    /// Look up an agent and classify how far it can be trusted.
    pub async fn lookup_agent_identity(&self, agent_id: AgentId) -> IdentityState {
        let exists = match self.try_agent_exists(agent_id).await {
            Ok(exists) => exists,
            Err(e) => {
                tracing::warn!(%agent_id, error = %e, "identity lookup failed");
                return IdentityState::error(e);
            }
        };

        if !exists {
            return IdentityState {
                trust: TrustLevel::Unknown,
                identity: None,
                warning: Some(UNREGISTERED_WARNING.to_string()),
            };
        }

        let (name, agent_type, model, wallet) = tokio::join!(
            self.get_metadata(agent_id, METADATA_NAME),
            self.get_metadata(agent_id, METADATA_AGENT_TYPE),
            self.get_metadata(agent_id, METADATA_MODEL),
            self.get_agent_wallet(agent_id),
        );

        let mut missing = Vec::new();
        if name.trim().is_empty() {
            missing.push("missing name");
        }
        if wallet.is_none() {
            missing.push("no wallet bound");
        }

        let metadata = [
            (METADATA_NAME, name),
            (METADATA_AGENT_TYPE, agent_type),
            (METADATA_MODEL, model),
        ]
        .into_iter()
        .filter(|(_, value)| !value.is_empty())
        .map(|(key, value)| (key.to_string(), value))
        .collect();

        let identity = IdentityRecord {
            agent_id: agent_id.to_string(),
            exists: true,
            metadata,
            wallet_address: wallet.map(|w| w.to_fixed_hex()),
        };

        let (trust, warning) = if missing.is_empty() {
            (TrustLevel::Verified, None)
        } else {
            (
                TrustLevel::Registered,
                Some(format!("Registered but unverified: {}", missing.join(", "))),
            )
        };

        tracing::debug!(%agent_id, trust = trust.as_str(), "identity lookup complete");
        IdentityState {
            trust,
            identity: Some(identity),
            warning,
        }
    }
}
