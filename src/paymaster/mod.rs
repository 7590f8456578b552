//! Gas-sponsorship (paymaster) client.
//!
//! Availability probes fail closed: any error means "not available". Build
//! and execute calls classify failures into [`PaymasterError`] so callers
//! decide on retry from `is_retryable()` instead of raw transport errors.

mod eligibility;

use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::cache::TtlCache;
use crate::error::PaymasterError;
use crate::net::{CancelSignal, Interrupted, run_with_deadline};
use crate::sanitize::{redact_sensitive_detail, truncate_error_body};
use crate::starknet::{Call, Felt};

pub use self::eligibility::{
    BLOCKED_ENTRYPOINTS, EligibilityDecision, SPONSORABLE_ACTION_KINDS,
    check_sponsorship_eligibility,
};

const API_KEY_HEADER: &str = "x-paymaster-api-key";

/// Connection settings for the paymaster service.
#[derive(Debug, Clone)]
pub struct PaymasterSettings {
    pub base_url: String,
    pub api_key: Option<SecretString>,
    pub status_timeout: Duration,
    pub request_timeout: Duration,
    pub quote_ttl: Duration,
}

impl PaymasterSettings {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: None,
            status_timeout: Duration::from_secs(5),
            request_timeout: Duration::from_secs(12),
            quote_ttl: crate::cache::DEFAULT_TTL,
        }
    }
}

/// Request for sponsored typed data covering `calls`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildTypedDataRequest {
    pub user_address: Felt,
    pub calls: Vec<Call>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gas_token_address: Option<Felt>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_gas_token_amount: Option<String>,
}

/// Fee quote returned alongside typed data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeeEstimate {
    #[serde(default)]
    pub gas_token_address: Option<Felt>,
    pub estimated_fee: String,
    #[serde(default)]
    pub max_fee: Option<String>,
}

/// Typed data the user signs for sponsored execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypedDataResponse {
    pub typed_data: serde_json::Value,
    #[serde(default)]
    pub fee_estimate: Option<FeeEstimate>,
}

/// Signed typed data submitted for sponsored execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecuteSponsoredRequest {
    pub user_address: Felt,
    pub typed_data: serde_json::Value,
    pub signature: Vec<Felt>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SponsoredExecution {
    pub transaction_hash: Felt,
}

#[derive(Debug, Deserialize)]
struct StatusBody {
    #[serde(default)]
    available: Option<bool>,
}

/// HTTP client for the sponsorship service.
pub struct PaymasterClient {
    client: reqwest::Client,
    settings: PaymasterSettings,
    quotes: TtlCache<String, TypedDataResponse>,
}

impl PaymasterClient {
    pub fn new(settings: PaymasterSettings) -> Self {
        Self {
            client: reqwest::Client::new(),
            quotes: TtlCache::new(settings.quote_ttl),
            settings,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.settings.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.settings.base_url.trim_end_matches('/'), path)
    }

    fn with_auth(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.settings.api_key {
            Some(key) => builder.header(API_KEY_HEADER, key.expose_secret()),
            None => builder,
        }
    }

    /// Probe the service. Any failure, timeout or non-2xx reads as unavailable.
    pub async fn is_available(&self, cancel: Option<&CancelSignal>) -> bool {
        let timeout = self.settings.status_timeout;
        let probe = async {
            let response = self
                .with_auth(self.client.get(self.endpoint("status")))
                .send()
                .await?;
            if !response.status().is_success() {
                return Ok::<bool, reqwest::Error>(false);
            }
            let body = response.bytes().await?;
            let available = serde_json::from_slice::<StatusBody>(&body)
                .ok()
                .and_then(|status| status.available)
                .unwrap_or(true);
            Ok(available)
        };

        match run_with_deadline(probe, timeout, cancel).await {
            Ok(Ok(available)) => available,
            Ok(Err(e)) => {
                tracing::debug!(error = %redact_sensitive_detail(&e.to_string()), "paymaster status probe failed");
                false
            }
            Err(interrupted) => {
                tracing::debug!(?interrupted, "paymaster status probe interrupted");
                false
            }
        }
    }

    /// Build sponsored typed data (with fee quote) for a call list.
    ///
    /// Identical requests within the quote TTL are served from cache.
    pub async fn build_typed_data(
        &self,
        request: &BuildTypedDataRequest,
        cancel: Option<&CancelSignal>,
    ) -> Result<TypedDataResponse, PaymasterError> {
        let key = serde_json::to_string(request)
            .map_err(|e| PaymasterError::InvalidResponse(e.to_string()))?;
        if let Some(cached) = self.quotes.get(&key) {
            tracing::debug!("paymaster typed data served from cache");
            return Ok(cached);
        }

        let response: TypedDataResponse = self.post("build-typed-data", request, cancel).await?;
        self.quotes.insert(key, response.clone());
        Ok(response)
    }

    /// Submit a signed sponsored execution.
    pub async fn execute_sponsored(
        &self,
        request: &ExecuteSponsoredRequest,
        cancel: Option<&CancelSignal>,
    ) -> Result<SponsoredExecution, PaymasterError> {
        let execution: SponsoredExecution = self.post("execute", request, cancel).await?;
        tracing::info!(tx_hash = %execution.transaction_hash, "sponsored execution submitted");
        Ok(execution)
    }

    /// Drop every cached typed-data quote.
    pub fn clear_quote_cache(&self) {
        self.quotes.clear();
    }

    /// Drop the cached quote for one request.
    pub fn evict_quote(&self, request: &BuildTypedDataRequest) {
        if let Ok(key) = serde_json::to_string(request) {
            self.quotes.evict(&key);
        }
    }

    async fn post<B, T>(
        &self,
        path: &str,
        body: &B,
        cancel: Option<&CancelSignal>,
    ) -> Result<T, PaymasterError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let timeout = self.settings.request_timeout;
        let send = async {
            let response = self
                .with_auth(self.client.post(self.endpoint(path)))
                .json(body)
                .send()
                .await
                .map_err(|e| classify_transport_error(&e, timeout))?;

            let status = response.status();
            let text = response
                .text()
                .await
                .map_err(|e| classify_transport_error(&e, timeout))?;
            if !status.is_success() {
                return Err(classify_status(status.as_u16(), &text));
            }
            serde_json::from_str::<T>(&text)
                .map_err(|e| PaymasterError::InvalidResponse(e.to_string()))
        };

        let result = run_with_deadline(send, timeout, cancel)
            .await
            .map_err(|interrupted| match interrupted {
                Interrupted::TimedOut => PaymasterError::Timeout { timeout },
                Interrupted::Cancelled => PaymasterError::Cancelled,
            })?;
        if let Err(e) = &result {
            tracing::warn!(path, retryable = e.is_retryable(), error = %e, "paymaster request failed");
        }
        result
    }
}

/// Map a non-2xx status onto the error taxonomy.
pub fn classify_status(status: u16, body: &str) -> PaymasterError {
    let body = truncate_error_body(body);
    match status {
        429 => PaymasterError::RateLimited { body },
        s if s >= 500 => PaymasterError::Server { status: s, body },
        s => PaymasterError::Client { status: s, body },
    }
}

fn classify_transport_error(error: &reqwest::Error, timeout: Duration) -> PaymasterError {
    if error.is_timeout() {
        PaymasterError::Timeout { timeout }
    } else {
        PaymasterError::Connection(redact_sensitive_detail(&error.to_string()))
    }
}
