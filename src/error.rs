//! Error types for Starkclaw.

use std::time::Duration;

use serde::Serialize;

use crate::sanitize::redact_sensitive_detail;

/// Top-level error type for the runtime.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("RPC error: {0}")]
    Rpc(#[from] RpcError),

    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("Paymaster error: {0}")]
    Paymaster(#[from] PaymasterError),

    #[error("Signer error: {0}")]
    Signer(#[from] SignerError),

    #[error("Execution error: {0}")]
    Execution(#[from] ExecutionError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Journal error: {0}")]
    Journal(#[from] JournalError),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),
}

/// Failure domains for CLI and consumer error surfaces.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ErrorDomain {
    Config,
    Network,
    Policy,
    Codec,
    Signer,
    Storage,
    Unknown,
}

/// Structured error payload with a stable code and retry hint.
///
/// The message is always redacted, so it is safe to log, display or persist.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ErrorSurface {
    pub domain: ErrorDomain,
    pub code: &'static str,
    pub retryable: bool,
    pub message: String,
}

impl ErrorSurface {
    fn new(
        domain: ErrorDomain,
        code: &'static str,
        retryable: bool,
        message: impl Into<String>,
    ) -> Self {
        Self {
            domain,
            code,
            retryable,
            message: redact_sensitive_detail(&message.into()),
        }
    }
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required configuration: {key}. {hint}")]
    MissingRequired { key: String, hint: String },

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors surfaced by the Starknet RPC capability.
#[derive(Debug, Clone, thiserror::Error)]
pub enum RpcError {
    #[error("RPC request timed out after {timeout:?}")]
    Timeout { timeout: Duration },

    #[error("RPC request cancelled")]
    Cancelled,

    #[error("RPC transport failed: {0}")]
    Transport(String),

    #[error("RPC error {code}: {message}")]
    Node { code: i64, message: String },

    #[error("Invalid RPC response: {0}")]
    InvalidResponse(String),
}

impl RpcError {
    /// True when the node reports that the requested object does not exist yet.
    pub fn is_not_found(&self) -> bool {
        self.to_string().to_ascii_lowercase().contains("not found")
    }
}

/// Malformed on-chain data.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    #[error("invalid felt '{0}'")]
    InvalidFelt(String),

    #[error("felt value exceeds {max} bits")]
    Overflow { max: u32 },

    #[error("byte array truncated: expected {expected} felts, got {actual}")]
    Truncated { expected: usize, actual: usize },

    #[error("pending word length {0} exceeds 30 bytes")]
    PendingLength(u64),

    #[error("decoded bytes are not valid UTF-8")]
    InvalidUtf8,
}

/// Sponsorship (paymaster) client errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum PaymasterError {
    #[error("paymaster request timed out after {timeout:?}")]
    Timeout { timeout: Duration },

    #[error("paymaster request cancelled")]
    Cancelled,

    #[error("paymaster connection failed: {0}")]
    Connection(String),

    #[error("paymaster rate limited the request")]
    RateLimited { body: String },

    #[error("paymaster server error (HTTP {status}): {body}")]
    Server { status: u16, body: String },

    #[error("paymaster rejected the request (HTTP {status}): {body}")]
    Client { status: u16, body: String },

    #[error("invalid paymaster response: {0}")]
    InvalidResponse(String),
}

impl PaymasterError {
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Timeout { .. } | Self::Connection(_) | Self::RateLimited { .. } | Self::Server { .. }
        )
    }
}

/// Remote or local signing/broadcast failures.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SignerError {
    #[error("signing service timed out after {timeout:?}")]
    Timeout { timeout: Duration },

    #[error("signing request cancelled")]
    Cancelled,

    #[error("signing service unreachable: {0}")]
    Connection(String),

    #[error("signing service rejected the action (HTTP {status}): {reason}")]
    Rejected { status: u16, reason: String },

    #[error("action was not broadcast: {reason}")]
    NotBroadcast { reason: String },

    #[error("invalid signing service response: {0}")]
    InvalidResponse(String),

    #[error("local signer failed: {0}")]
    Local(String),
}

impl SignerError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout { .. } | Self::Connection(_))
    }
}

/// Secure key/value store errors.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store IO failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("store contents are corrupt: {0}")]
    Corrupt(String),
}

/// Activity journal errors.
#[derive(Debug, thiserror::Error)]
pub enum JournalError {
    #[error("journal store failed: {0}")]
    Store(#[from] StoreError),

    #[error("journal serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// LLM provider errors.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("Provider {provider} request failed: {reason}")]
    RequestFailed { provider: String, reason: String },

    #[error("Provider {provider} rate limited")]
    RateLimited { provider: String },

    #[error("Invalid response from {provider}: {reason}")]
    InvalidResponse { provider: String, reason: String },

    #[error("Authentication failed for provider {provider}")]
    AuthFailed { provider: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Orchestrator failure that still carries the correlation chain for audit.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ExecutionError {
    #[error("mobile action id is required before execution")]
    MissingActionId,

    #[error("mobile action id {0} was already used")]
    DuplicateActionId(String),

    #[error("{mode} signer is not configured")]
    SignerNotConfigured {
        chain: crate::execution::CorrelationChain,
        mode: crate::execution::SignerMode,
    },

    #[error("policy denied action: {reason}")]
    PolicyDenied {
        chain: crate::execution::CorrelationChain,
        reason: String,
    },

    #[error("{source}")]
    Signer {
        chain: crate::execution::CorrelationChain,
        #[source]
        source: SignerError,
    },
}

impl ExecutionError {
    /// Partial correlation chain captured before the failure, when one exists.
    pub fn correlation(&self) -> Option<&crate::execution::CorrelationChain> {
        match self {
            Self::PolicyDenied { chain, .. }
            | Self::Signer { chain, .. }
            | Self::SignerNotConfigured { chain, .. } => Some(chain),
            Self::MissingActionId | Self::DuplicateActionId(_) => None,
        }
    }
}

impl Error {
    /// Map runtime errors into a structured, redacted surface.
    pub fn to_surface(&self) -> ErrorSurface {
        match self {
            Self::Config(err) => {
                ErrorSurface::new(ErrorDomain::Config, "config.invalid", false, err.to_string())
            }
            Self::Rpc(err) => {
                let (code, retryable) = match err {
                    RpcError::Timeout { .. } => ("network.rpc_timeout", true),
                    RpcError::Cancelled => ("network.rpc_cancelled", false),
                    RpcError::Transport(_) => ("network.rpc_connection", true),
                    RpcError::Node { .. } => ("network.rpc_node_error", false),
                    RpcError::InvalidResponse(_) => ("codec.rpc_response", false),
                };
                ErrorSurface::new(ErrorDomain::Network, code, retryable, err.to_string())
            }
            Self::Codec(err) => {
                ErrorSurface::new(ErrorDomain::Codec, "codec.malformed", false, err.to_string())
            }
            Self::Paymaster(err) => {
                let (domain, code) = match err {
                    PaymasterError::Timeout { .. } => (ErrorDomain::Network, "network.timeout"),
                    PaymasterError::Cancelled => (ErrorDomain::Network, "network.cancelled"),
                    PaymasterError::Connection(_) => (ErrorDomain::Network, "network.connection"),
                    PaymasterError::RateLimited { .. } => {
                        (ErrorDomain::Network, "paymaster.rate_limited")
                    }
                    PaymasterError::Server { .. } => (ErrorDomain::Network, "paymaster.server_error"),
                    PaymasterError::Client { .. } => (ErrorDomain::Network, "paymaster.client_error"),
                    PaymasterError::InvalidResponse(_) => {
                        (ErrorDomain::Codec, "paymaster.invalid_response")
                    }
                };
                ErrorSurface::new(domain, code, err.is_retryable(), err.to_string())
            }
            Self::Signer(err) => signer_surface(err),
            Self::Execution(err) => match err {
                ExecutionError::PolicyDenied { .. } => ErrorSurface::new(
                    ErrorDomain::Policy,
                    "policy.denied",
                    false,
                    err.to_string(),
                ),
                ExecutionError::Signer { source, .. } => signer_surface(source),
                ExecutionError::SignerNotConfigured { .. } => ErrorSurface::new(
                    ErrorDomain::Config,
                    "config.signer_missing",
                    false,
                    err.to_string(),
                ),
                ExecutionError::MissingActionId | ExecutionError::DuplicateActionId(_) => {
                    ErrorSurface::new(
                        ErrorDomain::Policy,
                        "execution.invalid_action_id",
                        false,
                        err.to_string(),
                    )
                }
            },
            Self::Store(err) => {
                ErrorSurface::new(ErrorDomain::Storage, "storage.store", false, err.to_string())
            }
            Self::Journal(err) => {
                ErrorSurface::new(ErrorDomain::Storage, "storage.journal", false, err.to_string())
            }
            Self::Llm(err) => {
                let retryable = matches!(err, LlmError::RateLimited { .. } | LlmError::Http(_));
                ErrorSurface::new(ErrorDomain::Network, "llm.request", retryable, err.to_string())
            }
        }
    }
}

fn signer_surface(err: &SignerError) -> ErrorSurface {
    let code = match err {
        SignerError::Timeout { .. } => "signer.timeout",
        SignerError::Cancelled => "signer.cancelled",
        SignerError::Connection(_) => "signer.connection",
        SignerError::Rejected { .. } => "signer.rejected",
        SignerError::NotBroadcast { .. } => "signer.not_broadcast",
        SignerError::InvalidResponse(_) => "signer.invalid_response",
        SignerError::Local(_) => "signer.local_failed",
    };
    ErrorSurface::new(ErrorDomain::Signer, code, err.is_retryable(), err.to_string())
}

/// Result type alias for the runtime.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_paymaster_rate_limit_as_retryable() {
        let err = Error::from(PaymasterError::RateLimited {
            body: "slow down".to_string(),
        });
        let surface = err.to_surface();

        assert_eq!(surface.domain, ErrorDomain::Network);
        assert_eq!(surface.code, "paymaster.rate_limited");
        assert!(surface.retryable);
    }

    #[test]
    fn client_errors_are_not_retryable() {
        let err = Error::from(PaymasterError::Client {
            status: 400,
            body: "bad calls".to_string(),
        });
        let surface = err.to_surface();

        assert_eq!(surface.code, "paymaster.client_error");
        assert!(!surface.retryable);
    }

    #[test]
    fn surface_message_is_redacted() {
        let err = Error::from(ConfigError::InvalidValue {
            key: "PAYMASTER_API_KEY".to_string(),
            message: "api_key=abc123secret rejected".to_string(),
        });
        let surface = err.to_surface();

        assert!(!surface.message.contains("abc123secret"));
        assert!(surface.message.contains("[REDACTED]"));
    }

    #[test]
    fn rpc_not_found_detection_is_case_insensitive() {
        let err = RpcError::Node {
            code: 29,
            message: "Transaction hash NOT FOUND".to_string(),
        };
        assert!(err.is_not_found());
        assert!(!RpcError::Transport("connection reset".to_string()).is_not_found());
    }
}
