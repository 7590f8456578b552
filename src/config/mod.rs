//! Configuration for starkclaw.
//!
//! Settings are loaded with priority: env var > `~/.starkclaw/config.toml` >
//! default. Secrets such as `PAYMASTER_API_KEY` live in `~/.starkclaw/.env`
//! (loaded via dotenvy early in startup) and never in the TOML file.

mod heartbeat;
pub(crate) mod helpers;
mod llm;
mod network;
mod paymaster;
mod signer;

use crate::error::ConfigError;
use crate::settings::Settings;

pub use self::heartbeat::HeartbeatConfig;
pub use self::llm::{LlmBackend, LlmConfig};
pub use self::network::{IdentityConfig, NetworkConfig};
pub(crate) use self::network::parse_network;
pub use self::paymaster::PaymasterConfig;
pub use self::signer::{JournalConfig, SignerConfig};

/// Fully resolved runtime configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub network: NetworkConfig,
    pub identity: IdentityConfig,
    pub paymaster: PaymasterConfig,
    pub signer: SignerConfig,
    pub journal: JournalConfig,
    pub llm: Option<LlmConfig>,
    pub heartbeat: HeartbeatConfig,
}

pub(crate) fn normalize_variant(value: &str) -> String {
    value.trim().to_ascii_lowercase().replace(['-', ' '], "_")
}

impl Config {
    /// Load configuration from env vars and the default TOML file.
    ///
    /// Loads both `./.env` (standard, higher priority) and
    /// `~/.starkclaw/.env` (lower priority) via dotenvy, which never
    /// overwrites existing vars.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_with_toml(None)
    }

    /// Load from env with an optional explicit TOML config file.
    pub fn from_env_with_toml(toml_path: Option<&std::path::Path>) -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        crate::bootstrap::load_starkclaw_env();
        let mut settings = Settings::default();
        Self::apply_toml_overlay(&mut settings, toml_path)?;
        Self::build(&settings)
    }

    /// Load and merge a TOML config file into settings.
    ///
    /// If `explicit_path` is `Some`, loads from that path (errors are fatal).
    /// If `None`, tries the default path `~/.starkclaw/config.toml` (missing
    /// file is silently ignored).
    fn apply_toml_overlay(
        settings: &mut Settings,
        explicit_path: Option<&std::path::Path>,
    ) -> Result<(), ConfigError> {
        let path = explicit_path
            .map(std::path::PathBuf::from)
            .unwrap_or_else(Settings::default_toml_path);

        match Settings::load_toml(&path) {
            Ok(Some(toml_settings)) => {
                settings.merge_from(&toml_settings);
                tracing::debug!("Loaded TOML config from {}", path.display());
            }
            Ok(None) => {
                if explicit_path.is_some() {
                    return Err(ConfigError::ParseError(format!(
                        "Config file not found: {}",
                        path.display()
                    )));
                }
            }
            Err(e) => {
                if explicit_path.is_some() {
                    return Err(ConfigError::ParseError(format!(
                        "Failed to load config file {}: {}",
                        path.display(),
                        e
                    )));
                }
                tracing::warn!("Failed to load default config file: {}", e);
            }
        }
        Ok(())
    }

    /// Resolve every section from settings plus env overrides.
    pub fn build(settings: &Settings) -> Result<Self, ConfigError> {
        let network = NetworkConfig::resolve(settings)?;
        let paymaster = PaymasterConfig::resolve(settings, network.network)?;
        Ok(Self {
            identity: IdentityConfig::resolve(settings)?,
            paymaster,
            signer: SignerConfig::resolve(settings)?,
            journal: JournalConfig::resolve(settings)?,
            llm: LlmConfig::resolve(settings)?,
            heartbeat: HeartbeatConfig::resolve(settings)?,
            network,
        })
    }
}
