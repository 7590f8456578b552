use std::time::Duration;

use crate::config::helpers;
use crate::error::ConfigError;
use crate::settings::Settings;

/// Background routine ticking.
#[derive(Debug, Clone)]
pub struct HeartbeatConfig {
    pub enabled: bool,
    pub interval: Duration,
}

impl HeartbeatConfig {
    pub(crate) fn resolve(settings: &Settings) -> Result<Self, ConfigError> {
        let enabled = helpers::parse_env(
            "HEARTBEAT_ENABLED",
            settings.heartbeat.enabled,
            "'true' or 'false'",
        )?;
        let interval_secs =
            helpers::positive_u64("HEARTBEAT_INTERVAL_SECS", settings.heartbeat.interval_secs)?;
        Ok(Self {
            enabled,
            interval: Duration::from_secs(interval_secs),
        })
    }
}
