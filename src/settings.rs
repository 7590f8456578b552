//! Persisted user settings.
//!
//! Stored as TOML in `~/.starkclaw/config.toml`. Resolution priority is
//! env var > config.toml > default; see `crate::config`.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Supported LLM backends.
pub const SUPPORTED_LLM_BACKENDS: [&str; 2] = ["openai_compatible", "anthropic"];

/// Normalize backend aliases to canonical values.
pub fn normalize_llm_backend(value: &str) -> Option<String> {
    let normalized = value.trim().to_ascii_lowercase().replace(['-', ' '], "_");

    match normalized.as_str() {
        "anthropic" => Some("anthropic".to_string()),
        "openai" | "openai_compatible" | "openaicompat" | "openai_compat" => {
            Some("openai_compatible".to_string())
        }
        _ => None,
    }
}

/// User settings persisted to disk.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Settings {
    #[serde(default)]
    pub network: NetworkSettings,

    #[serde(default)]
    pub identity: IdentitySettings,

    #[serde(default)]
    pub paymaster: PaymasterSettings,

    #[serde(default)]
    pub signer: SignerSettings,

    #[serde(default)]
    pub journal: JournalSettings,

    #[serde(default)]
    pub llm: LlmSettings,

    #[serde(default)]
    pub heartbeat: HeartbeatSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkSettings {
    /// "mainnet" or "sepolia".
    #[serde(default = "default_network")]
    pub network: String,

    /// Starknet JSON-RPC endpoint; defaults per network.
    #[serde(default)]
    pub rpc_url: Option<String>,

    #[serde(default = "default_rpc_timeout_ms")]
    pub rpc_timeout_ms: u64,

    /// Account contract address of the user.
    #[serde(default)]
    pub account_address: Option<String>,
}

fn default_network() -> String {
    "sepolia".to_string()
}

fn default_rpc_timeout_ms() -> u64 {
    10_000
}

impl Default for NetworkSettings {
    fn default() -> Self {
        Self {
            network: default_network(),
            rpc_url: None,
            rpc_timeout_ms: default_rpc_timeout_ms(),
            account_address: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IdentitySettings {
    /// Identity registry contract address.
    #[serde(default)]
    pub registry_address: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymasterSettings {
    #[serde(default)]
    pub base_url: Option<String>,

    #[serde(default = "default_paymaster_status_timeout_ms")]
    pub status_timeout_ms: u64,

    #[serde(default = "default_paymaster_request_timeout_ms")]
    pub request_timeout_ms: u64,

    #[serde(default = "default_paymaster_cache_ttl_secs")]
    pub cache_ttl_secs: u64,
}

fn default_paymaster_status_timeout_ms() -> u64 {
    5_000
}

fn default_paymaster_request_timeout_ms() -> u64 {
    12_000
}

fn default_paymaster_cache_ttl_secs() -> u64 {
    15
}

impl Default for PaymasterSettings {
    fn default() -> Self {
        Self {
            base_url: None,
            status_timeout_ms: default_paymaster_status_timeout_ms(),
            request_timeout_ms: default_paymaster_request_timeout_ms(),
            cache_ttl_secs: default_paymaster_cache_ttl_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignerSettings {
    /// "local" or "remote".
    #[serde(default = "default_signer_mode")]
    pub mode: String,

    #[serde(default)]
    pub base_url: Option<String>,

    /// Requester tag sent to the remote signing service.
    #[serde(default)]
    pub requester: Option<String>,

    #[serde(default = "default_signer_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_signer_mode() -> String {
    "local".to_string()
}

fn default_signer_timeout_ms() -> u64 {
    15_000
}

impl Default for SignerSettings {
    fn default() -> Self {
        Self {
            mode: default_signer_mode(),
            base_url: None,
            requester: None,
            timeout_ms: default_signer_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JournalSettings {
    /// Secure store file; defaults to `~/.starkclaw/store.json`.
    #[serde(default)]
    pub store_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LlmSettings {
    #[serde(default, alias = "provider")]
    pub backend: Option<String>,

    #[serde(default)]
    pub base_url: Option<String>,

    #[serde(default)]
    pub model: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeartbeatSettings {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_heartbeat_interval")]
    pub interval_secs: u64,
}

fn default_heartbeat_interval() -> u64 {
    300
}

impl Default for HeartbeatSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            interval_secs: default_heartbeat_interval(),
        }
    }
}

impl Settings {
    /// Load `~/.starkclaw/config.toml`, falling back to defaults.
    pub fn load() -> Self {
        match Self::load_toml(&Self::default_toml_path()) {
            Ok(Some(settings)) => settings,
            Ok(None) => Self::default(),
            Err(e) => {
                tracing::warn!("Ignoring unreadable config file: {}", e);
                Self::default()
            }
        }
    }

    /// Default TOML config file path (~/.starkclaw/config.toml).
    pub fn default_toml_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".starkclaw")
            .join("config.toml")
    }

    /// Load settings from a TOML file.
    ///
    /// Returns `None` if the file doesn't exist. Returns an error only
    /// if the file exists but can't be parsed.
    pub fn load_toml(path: &std::path::Path) -> Result<Option<Self>, String> {
        let data = match std::fs::read_to_string(path) {
            Ok(d) => d,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(format!("failed to read {}: {}", path.display(), e)),
        };

        let mut settings: Self = toml::from_str(&data)
            .map_err(|e| format!("invalid TOML in {}: {}", path.display(), e))?;
        settings.sanitize_llm_backend();
        Ok(Some(settings))
    }

    /// Write a commented TOML config file with current settings.
    pub fn save_toml(&self, path: &std::path::Path) -> Result<(), String> {
        let raw = toml::to_string_pretty(self)
            .map_err(|e| format!("failed to serialize settings: {}", e))?;

        let content = format!(
            "# starkclaw configuration file.\n\
             #\n\
             # Priority: env var > this file > defaults.\n\
             # Secrets (API keys) belong in ~/.starkclaw/.env, not here.\n\
             \n\
             {raw}"
        );

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| format!("failed to create {}: {}", parent.display(), e))?;
        }

        std::fs::write(path, content)
            .map_err(|e| format!("failed to write {}: {}", path.display(), e))
    }

    /// Merge values from `other` into `self`, preferring `other` for
    /// fields that differ from the default.
    pub fn merge_from(&mut self, other: &Self) {
        let default_json = match serde_json::to_value(Self::default()) {
            Ok(v) => v,
            Err(_) => return,
        };
        let other_json = match serde_json::to_value(other) {
            Ok(v) => v,
            Err(_) => return,
        };
        let mut self_json = match serde_json::to_value(&*self) {
            Ok(v) => v,
            Err(_) => return,
        };

        merge_non_default(&mut self_json, &other_json, &default_json);

        if let Ok(merged) = serde_json::from_value(self_json) {
            *self = merged;
            self.sanitize_llm_backend();
        }
    }

    fn sanitize_llm_backend(&mut self) {
        if let Some(raw) = self.llm.backend.take() {
            match normalize_llm_backend(&raw) {
                Some(normalized) => self.llm.backend = Some(normalized),
                None => tracing::warn!("Ignoring unsupported LLM backend '{}'", raw),
            }
        }
    }
}

fn merge_non_default(
    target: &mut serde_json::Value,
    other: &serde_json::Value,
    defaults: &serde_json::Value,
) {
    match (target, other, defaults) {
        (
            serde_json::Value::Object(t),
            serde_json::Value::Object(o),
            serde_json::Value::Object(d),
        ) => {
            for (key, other_val) in o {
                let default_val = d.get(key).cloned().unwrap_or(serde_json::Value::Null);
                if let Some(target_val) = t.get_mut(key) {
                    merge_non_default(target_val, other_val, &default_val);
                } else if other_val != &default_val {
                    t.insert(key.clone(), other_val.clone());
                }
            }
        }
        (target, other, defaults) => {
            if other != defaults {
                *target = other.clone();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::settings::*;

    #[test]
    fn default_toml_path_under_starkclaw() {
        let path = Settings::default_toml_path();
        assert!(path.to_string_lossy().contains(".starkclaw"));
        assert!(path.to_string_lossy().ends_with("config.toml"));
    }

    #[test]
    fn toml_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let mut settings = Settings::default();
        settings.network.network = "mainnet".to_string();
        settings.signer.mode = "remote".to_string();
        settings.signer.requester = Some("mobile".to_string());
        settings.save_toml(&path).unwrap();

        let loaded = Settings::load_toml(&path).unwrap().unwrap();
        assert_eq!(loaded.network.network, "mainnet");
        assert_eq!(loaded.signer.requester.as_deref(), Some("mobile"));
        assert_eq!(loaded.paymaster.cache_ttl_secs, 15);
    }

    #[test]
    fn missing_toml_is_none_and_garbage_is_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Settings::load_toml(&dir.path().join("absent.toml")).unwrap().is_none());

        let bad = dir.path().join("bad.toml");
        std::fs::write(&bad, "network = [").unwrap();
        assert!(Settings::load_toml(&bad).is_err());
    }

    #[test]
    fn merge_only_applies_non_default_fields() {
        let mut base = Settings::default();
        base.paymaster.request_timeout_ms = 20_000;
        base.heartbeat.enabled = true;

        let mut overlay = Settings::default();
        overlay.network.network = "mainnet".to_string();

        base.merge_from(&overlay);
        assert_eq!(base.network.network, "mainnet");
        assert_eq!(base.paymaster.request_timeout_ms, 20_000);
        assert!(base.heartbeat.enabled);
    }

    #[test]
    fn llm_backend_aliases_are_normalized() {
        let settings: Settings = toml::from_str("[llm]\nprovider = \"openai\"\n").unwrap();
        let mut settings = settings;
        settings.sanitize_llm_backend();
        assert_eq!(settings.llm.backend.as_deref(), Some("openai_compatible"));
        assert_eq!(normalize_llm_backend("ollama"), None);
    }
}
