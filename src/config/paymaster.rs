use std::time::Duration;

use secrecy::SecretString;

use crate::config::helpers;
use crate::error::ConfigError;
use crate::paymaster::PaymasterSettings as ClientSettings;
use crate::settings::Settings;
use crate::starknet::Network;

/// Gas-sponsorship service endpoint and timeouts.
#[derive(Debug, Clone)]
pub struct PaymasterConfig {
    pub base_url: String,
    pub api_key: Option<SecretString>,
    pub status_timeout: Duration,
    pub request_timeout: Duration,
    pub cache_ttl: Duration,
}

impl PaymasterConfig {
    pub(crate) fn resolve(settings: &Settings, network: Network) -> Result<Self, ConfigError> {
        let base_url = helpers::optional_env("PAYMASTER_BASE_URL")?
            .or_else(|| settings.paymaster.base_url.clone())
            .unwrap_or_else(|| network.default_paymaster_url().to_string());
        url::Url::parse(&base_url).map_err(|e| ConfigError::InvalidValue {
            key: "PAYMASTER_BASE_URL".to_string(),
            message: e.to_string(),
        })?;

        let status_timeout_ms = helpers::positive_u64(
            "PAYMASTER_STATUS_TIMEOUT_MS",
            settings.paymaster.status_timeout_ms,
        )?;
        let request_timeout_ms = helpers::positive_u64(
            "PAYMASTER_REQUEST_TIMEOUT_MS",
            settings.paymaster.request_timeout_ms,
        )?;
        // Zero disables the quote cache.
        let cache_ttl_secs = helpers::parse_env(
            "PAYMASTER_CACHE_TTL_SECS",
            settings.paymaster.cache_ttl_secs,
            "a non-negative integer",
        )?;

        Ok(Self {
            base_url,
            api_key: helpers::optional_env("PAYMASTER_API_KEY")?.map(SecretString::from),
            status_timeout: Duration::from_millis(status_timeout_ms),
            request_timeout: Duration::from_millis(request_timeout_ms),
            cache_ttl: Duration::from_secs(cache_ttl_secs),
        })
    }

    pub fn client_settings(&self) -> ClientSettings {
        ClientSettings {
            base_url: self.base_url.clone(),
            api_key: self.api_key.clone(),
            status_timeout: self.status_timeout,
            request_timeout: self.request_timeout,
            quote_ttl: self.cache_ttl,
        }
    }
}
