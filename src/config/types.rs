//! Configuration types

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::console::reconnect::{ReconnectConfig, DEFAULT_RECONNECT_DELAY};

fn default_reconnect_delay_ms() -> u64 {
    DEFAULT_RECONNECT_DELAY.as_millis() as u64
}

fn default_request_timeout_secs() -> u64 {
    10
}

/// Console settings, deserialized by the host from its own config source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsoleConfig {
    /// Fixed delay before each reconnect attempt
    #[serde(default = "default_reconnect_delay_ms")]
    pub reconnect_delay_ms: u64,
    #[serde(default)]
    pub panel: PanelConfig,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            reconnect_delay_ms: default_reconnect_delay_ms(),
            panel: PanelConfig::default(),
        }
    }
}

impl ConsoleConfig {
    pub fn reconnect(&self) -> ReconnectConfig {
        ReconnectConfig {
            delay: Duration::from_millis(self.reconnect_delay_ms),
        }
    }
}

/// Panel REST API settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PanelConfig {
    /// API root, e.g. `https://panel.example.com/api/client`
    #[serde(default)]
    pub base_url: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for PanelConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl PanelConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_fields_use_defaults() {
        let config: ConsoleConfig =
            serde_json::from_str(r#"{"panel": {"baseUrl": "https://panel.test/api"}}"#).unwrap();

        assert_eq!(config.reconnect_delay_ms, 5000);
        assert_eq!(config.panel.base_url, "https://panel.test/api");
        assert_eq!(config.panel.request_timeout(), Duration::from_secs(10));
    }

    #[test]
    fn test_reconnect_config() {
        let config = ConsoleConfig {
            reconnect_delay_ms: 1500,
            ..Default::default()
        };
        assert_eq!(config.reconnect().delay, Duration::from_millis(1500));
        assert_eq!(ConsoleConfig::default().reconnect().delay, DEFAULT_RECONNECT_DELAY);
    }
}
