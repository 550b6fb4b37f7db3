//! Tool configuration, loaded from an optional YAML file and overridden by
//! command-line flags.

use std::path::Path;
use std::time::Duration;

use esplink_client::{ClientConfig, DEFAULT_BRIDGE_PORT};
use esplink_protocol::DEFAULT_REQUEST_TAG;
use serde::{Deserialize, Serialize};

use crate::error::CliError;

/// Settings shared by every subcommand.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    /// Address of the esp-link serial bridge.
    pub addr: String,
    /// Length of one receive tick in microseconds.
    pub tick_us: u64,
    /// How long to wait for a reply.
    pub receive_timeout_ms: u64,
    /// How long to wait for each packet during the sync handshake.
    pub sync_timeout_ms: u64,
    /// Handshake attempts before giving up.
    pub sync_retries: u32,
    /// Value field sent with every request.
    pub request_tag: u32,
}

impl Default for CliConfig {
    fn default() -> Self {
        CliConfig {
            addr: format!("esp-link.local:{}", DEFAULT_BRIDGE_PORT),
            tick_us: 1_000,
            receive_timeout_ms: 2_000,
            sync_timeout_ms: 500,
            sync_retries: 5,
            request_tag: DEFAULT_REQUEST_TAG,
        }
    }
}

impl CliConfig {
    /// Parse a YAML document.
    pub fn from_yaml(text: &str) -> Result<Self, CliError> {
        Ok(serde_yaml::from_str(text)?)
    }

    /// Read a YAML file.
    pub fn load(path: &Path) -> Result<Self, CliError> {
        let text = std::fs::read_to_string(path).map_err(|source| CliError::ConfigRead {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_yaml(&text)
    }

    /// Tick length as a duration.
    pub fn tick(&self) -> Duration {
        Duration::from_micros(self.tick_us)
    }

    /// Client settings with the millisecond timeouts converted to ticks.
    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            request_tag: self.request_tag,
            receive_timeout: self.ticks(self.receive_timeout_ms),
            sync_timeout: self.ticks(self.sync_timeout_ms),
        }
    }

    fn ticks(&self, ms: u64) -> u32 {
        let ticks = ms.saturating_mul(1_000) / self.tick_us.max(1);
        u32::try_from(ticks).unwrap_or(u32::MAX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document_gives_defaults() {
        let config = CliConfig::from_yaml("{}").unwrap();
        assert_eq!(config, CliConfig::default());
    }

    #[test]
    fn test_partial_document() {
        let config = CliConfig::from_yaml("addr: 192.168.4.1:23\nsync_retries: 1\n").unwrap();
        assert_eq!(config.addr, "192.168.4.1:23");
        assert_eq!(config.sync_retries, 1);
        assert_eq!(config.tick_us, 1_000);
    }

    #[test]
    fn test_timeouts_convert_to_ticks() {
        let config = CliConfig {
            tick_us: 250,
            receive_timeout_ms: 3,
            sync_timeout_ms: 1,
            ..CliConfig::default()
        };
        let client = config.client_config();
        assert_eq!(client.receive_timeout, 12);
        assert_eq!(client.sync_timeout, 4);
        assert_eq!(client.request_tag, 0x142);
    }

    #[test]
    fn test_zero_tick_does_not_divide_by_zero() {
        let config = CliConfig {
            tick_us: 0,
            receive_timeout_ms: 1,
            ..CliConfig::default()
        };
        assert_eq!(config.client_config().receive_timeout, 1_000);
    }

    #[test]
    fn test_unknown_type_is_an_error() {
        assert!(CliConfig::from_yaml("tick_us: fast\n").is_err());
    }
}
