//! Signer capabilities: a device-held local signer and the remote signing service.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::SignerError;
use crate::execution::action::Action;
use crate::net::{CancelSignal, Interrupted, run_with_deadline};
use crate::sanitize::{redact_sensitive_detail, scrub_revert_reason, truncate_error_body};
use crate::starknet::Felt;

/// Result of a local sign-and-broadcast.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalSubmission {
    pub tx_hash: Felt,
}

/// Device-held key that signs and broadcasts directly.
#[async_trait]
pub trait LocalSigner: Send + Sync {
    async fn sign_and_broadcast(&self, action: &Action) -> Result<LocalSubmission, SignerError>;
}

/// Body sent to the signing service.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteSignRequest<'a> {
    pub action: &'a Action,
    pub mobile_action_id: &'a str,
    pub requester: &'a str,
}

/// Response envelope, identical on success and failure paths.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteSignResponse {
    #[serde(default)]
    pub signer_request_id: Option<String>,
    #[serde(default)]
    pub tx_hash: Option<Felt>,
    #[serde(default)]
    pub execution_status: Option<String>,
    #[serde(default)]
    pub revert_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// A failed remote call, keeping whatever request id the service assigned.
#[derive(Debug, Clone)]
pub struct RemoteSignFailure {
    pub signer_request_id: Option<String>,
    pub error: SignerError,
}

impl From<SignerError> for RemoteSignFailure {
    fn from(error: SignerError) -> Self {
        Self {
            signer_request_id: None,
            error,
        }
    }
}

/// Delegated signing service.
#[async_trait]
pub trait SigningService: Send + Sync {
    async fn execute(
        &self,
        request: &RemoteSignRequest<'_>,
        cancel: Option<&CancelSignal>,
    ) -> Result<RemoteSignResponse, RemoteSignFailure>;
}

/// Signing service over HTTP: `POST {base}/v1/actions/execute`.
pub struct HttpSigningService {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl HttpSigningService {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            timeout,
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/v1/actions/execute", self.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl SigningService for HttpSigningService {
    async fn execute(
        &self,
        request: &RemoteSignRequest<'_>,
        cancel: Option<&CancelSignal>,
    ) -> Result<RemoteSignResponse, RemoteSignFailure> {
        let timeout = self.timeout;
        let send = async {
            let response = self
                .client
                .post(self.endpoint())
                .json(request)
                .send()
                .await
                .map_err(|e| classify_transport_error(&e, timeout))?;
            let status = response.status();
            let text = response
                .text()
                .await
                .map_err(|e| classify_transport_error(&e, timeout))?;
            Ok::<_, RemoteSignFailure>((status, text))
        };

        let (status, text) = run_with_deadline(send, timeout, cancel)
            .await
            .map_err(|interrupted| match interrupted {
                Interrupted::TimedOut => SignerError::Timeout { timeout },
                Interrupted::Cancelled => SignerError::Cancelled,
            })??;

        let parsed = serde_json::from_str::<RemoteSignResponse>(&text);
        if status.is_success() {
            return parsed.map_err(|e| SignerError::InvalidResponse(e.to_string()).into());
        }

        let envelope = parsed.unwrap_or_default();
        let reason = envelope
            .revert_reason
            .as_deref()
            .or(envelope.error.as_deref())
            .map(scrub_revert_reason)
            .unwrap_or_else(|| truncate_error_body(&text));
        Err(RemoteSignFailure {
            signer_request_id: envelope.signer_request_id,
            error: SignerError::Rejected {
                status: status.as_u16(),
                reason,
            },
        })
    }
}

fn classify_transport_error(error: &reqwest::Error, timeout: Duration) -> RemoteSignFailure {
    let error = if error.is_timeout() {
        SignerError::Timeout { timeout }
    } else {
        SignerError::Connection(redact_sensitive_detail(&error.to_string()))
    };
    error.into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn response_envelope_tolerates_missing_fields() {
        let parsed: RemoteSignResponse =
            serde_json::from_str(r#"{"signerRequestId":"req-1","txHash":null}"#).unwrap();
        assert_eq!(parsed.signer_request_id.as_deref(), Some("req-1"));
        assert_eq!(parsed.tx_hash, None);
        assert_eq!(parsed.revert_reason, None);
    }

    #[tokio::test]
    async fn unreachable_service_is_a_connection_failure() {
        let service = HttpSigningService::new("http://127.0.0.1:9", Duration::from_millis(500));
        let action = crate::execution::action::fixtures::small_transfer();
        let request = RemoteSignRequest {
            action: &action,
            mobile_action_id: "mact_test",
            requester: "cli",
        };
        let failure = service.execute(&request, None).await.unwrap_err();
        assert_eq!(failure.signer_request_id, None);
        assert!(failure.error.is_retryable());
    }
}
