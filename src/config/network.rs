use std::time::Duration;

use crate::config::{helpers, normalize_variant};
use crate::error::ConfigError;
use crate::settings::Settings;
use crate::starknet::{Felt, Network};

pub(crate) fn parse_network(value: &str, key: &str) -> Result<Network, ConfigError> {
    match normalize_variant(value).as_str() {
        "mainnet" | "sn_main" => Ok(Network::Mainnet),
        "sepolia" | "testnet" | "sn_sepolia" => Ok(Network::Sepolia),
        _ => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("expected 'mainnet' or 'sepolia', got '{value}'"),
        }),
    }
}

fn parse_address(value: &str, key: &str) -> Result<Felt, ConfigError> {
    Felt::from_hex(value).map_err(|e| ConfigError::InvalidValue {
        key: key.to_string(),
        message: e.to_string(),
    })
}

/// Starknet network and node access.
#[derive(Debug, Clone)]
pub struct NetworkConfig {
    pub network: Network,
    pub rpc_url: String,
    pub rpc_timeout: Duration,
    pub account_address: Option<Felt>,
}

impl NetworkConfig {
    pub(crate) fn resolve(settings: &Settings) -> Result<Self, ConfigError> {
        let network = parse_network(
            &helpers::optional_env("STARKCLAW_NETWORK")?
                .unwrap_or_else(|| settings.network.network.clone()),
            "STARKCLAW_NETWORK",
        )?;

        let rpc_url = helpers::optional_env("STARKNET_RPC_URL")?
            .or_else(|| settings.network.rpc_url.clone())
            .unwrap_or_else(|| network.default_rpc_url().to_string());

        let rpc_timeout_ms =
            helpers::positive_u64("STARKNET_RPC_TIMEOUT_MS", settings.network.rpc_timeout_ms)?;

        let account_address = helpers::optional_env("STARKCLAW_ACCOUNT_ADDRESS")?
            .or_else(|| settings.network.account_address.clone())
            .map(|raw| parse_address(&raw, "STARKCLAW_ACCOUNT_ADDRESS"))
            .transpose()?;

        Ok(Self {
            network,
            rpc_url,
            rpc_timeout: Duration::from_millis(rpc_timeout_ms),
            account_address,
        })
    }
}

/// Identity registry contract location.
#[derive(Debug, Clone)]
pub struct IdentityConfig {
    pub registry_address: Option<Felt>,
}

impl IdentityConfig {
    pub(crate) fn resolve(settings: &Settings) -> Result<Self, ConfigError> {
        let registry_address = helpers::optional_env("IDENTITY_REGISTRY_ADDRESS")?
            .or_else(|| settings.identity.registry_address.clone())
            .map(|raw| parse_address(&raw, "IDENTITY_REGISTRY_ADDRESS"))
            .transpose()?;
        Ok(Self { registry_address })
    }

    /// Registry address, or a hint on how to configure it.
    pub fn require_registry(&self) -> Result<Felt, ConfigError> {
        self.registry_address
            .ok_or_else(|| ConfigError::MissingRequired {
                key: "IDENTITY_REGISTRY_ADDRESS".to_string(),
                hint: "Set it in ~/.starkclaw/.env or [identity] in config.toml".to_string(),
            })
    }
}
