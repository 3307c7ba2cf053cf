//! Typed host configuration (spec §6, SPEC_FULL §10.3).

use serde::{Deserialize, Serialize};

use crate::error::ConfigurationError;

/// Minimum allowed polling interval: 5 seconds (spec §4.2, §8).
pub const MIN_POLLING_INTERVAL_MS: u64 = 5_000;
/// Maximum allowed polling interval when set explicitly: 1 hour (spec §4.2, §8).
pub const MAX_POLLING_INTERVAL_MS: u64 = 3_600_000;

/// The small typed configuration the engine reads at `start` (spec §6).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Optional bearer authorization token sent to every server.
    #[serde(default)]
    pub token: Option<String>,
    /// Polling interval in milliseconds.
    #[serde(default = "default_polling_interval_ms")]
    pub polling_interval_ms: u64,
    /// Length of generated correlation identifiers.
    #[serde(default = "default_correlation_id_length")]
    pub correlation_id_length: usize,
    /// Length of generated secret keys / nonces.
    #[serde(default = "default_correlation_id_nonce_length")]
    pub correlation_id_nonce_length: usize,
    /// HTTP request timeout in milliseconds.
    #[serde(default = "default_http_timeout_ms")]
    pub http_timeout_ms: u64,
    /// Optional convenience list of servers for `initialize_clients`.
    #[serde(default)]
    pub server_list: Vec<String>,
}

fn default_polling_interval_ms() -> u64 {
    5_000
}

fn default_correlation_id_length() -> usize {
    20
}

fn default_correlation_id_nonce_length() -> usize {
    13
}

fn default_http_timeout_ms() -> u64 {
    10_000
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            token: None,
            polling_interval_ms: default_polling_interval_ms(),
            correlation_id_length: default_correlation_id_length(),
            correlation_id_nonce_length: default_correlation_id_nonce_length(),
            http_timeout_ms: default_http_timeout_ms(),
            server_list: Vec::new(),
        }
    }
}

impl EngineConfig {
    /// Validate the polling interval against spec §8's boundary rule.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.polling_interval_ms < MIN_POLLING_INTERVAL_MS
            || self.polling_interval_ms > MAX_POLLING_INTERVAL_MS
        {
            return Err(ConfigurationError::InvalidPollingInterval(
                self.polling_interval_ms,
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(EngineConfig::default().validate().is_ok());
    }

    #[test]
    fn rejects_interval_below_minimum() {
        let mut config = EngineConfig::default();
        config.polling_interval_ms = 4_999;
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_interval_above_maximum() {
        let mut config = EngineConfig::default();
        config.polling_interval_ms = 3_600_001;
        assert!(config.validate().is_err());
    }

    #[test]
    fn accepts_boundary_values() {
        let mut config = EngineConfig::default();
        config.polling_interval_ms = MIN_POLLING_INTERVAL_MS;
        assert!(config.validate().is_ok());
        config.polling_interval_ms = MAX_POLLING_INTERVAL_MS;
        assert!(config.validate().is_ok());
    }
}
