use std::path::PathBuf;
use std::time::Duration;

use crate::config::{helpers, normalize_variant};
use crate::error::ConfigError;
use crate::execution::SignerMode;
use crate::settings::Settings;
use crate::store::FileStore;

fn parse_signer_mode(value: &str, key: &str) -> Result<SignerMode, ConfigError> {
    match normalize_variant(value).as_str() {
        "local" | "device" => Ok(SignerMode::Local),
        "remote" | "delegated" => Ok(SignerMode::Remote),
        _ => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("expected 'local' or 'remote', got '{value}'"),
        }),
    }
}

/// Signer selection and remote signing-service access.
#[derive(Debug, Clone)]
pub struct SignerConfig {
    pub mode: SignerMode,
    pub base_url: Option<String>,
    pub requester: Option<String>,
    pub timeout: Duration,
}

impl SignerConfig {
    pub(crate) fn resolve(settings: &Settings) -> Result<Self, ConfigError> {
        let mode = parse_signer_mode(
            &helpers::optional_env("SIGNER_MODE")?.unwrap_or_else(|| settings.signer.mode.clone()),
            "SIGNER_MODE",
        )?;
        let base_url = helpers::optional_env("SIGNER_BASE_URL")?
            .or_else(|| settings.signer.base_url.clone());
        let requester = helpers::optional_env("SIGNER_REQUESTER")?
            .or_else(|| settings.signer.requester.clone());
        let timeout_ms = helpers::positive_u64("SIGNER_TIMEOUT_MS", settings.signer.timeout_ms)?;

        if mode == SignerMode::Remote {
            if base_url.is_none() {
                return Err(ConfigError::MissingRequired {
                    key: "SIGNER_BASE_URL".to_string(),
                    hint: "Remote signer mode needs the signing service URL".to_string(),
                });
            }
            if requester.is_none() {
                return Err(ConfigError::MissingRequired {
                    key: "SIGNER_REQUESTER".to_string(),
                    hint: "Remote signer mode needs a requester tag".to_string(),
                });
            }
        }
        if let Some(url) = &base_url {
            url::Url::parse(url).map_err(|e| ConfigError::InvalidValue {
                key: "SIGNER_BASE_URL".to_string(),
                message: e.to_string(),
            })?;
        }

        Ok(Self {
            mode,
            base_url,
            requester,
            timeout: Duration::from_millis(timeout_ms),
        })
    }
}

/// Location of the secure store backing the activity journal.
#[derive(Debug, Clone)]
pub struct JournalConfig {
    pub store_path: PathBuf,
}

impl JournalConfig {
    pub(crate) fn resolve(settings: &Settings) -> Result<Self, ConfigError> {
        let store_path = helpers::optional_env("STARKCLAW_STORE_PATH")?
            .map(PathBuf::from)
            .or_else(|| settings.journal.store_path.clone())
            .unwrap_or_else(FileStore::default_path);
        Ok(Self { store_path })
    }
}
