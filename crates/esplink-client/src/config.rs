//! Client configuration.

use esplink_protocol::DEFAULT_REQUEST_TAG;
use serde::{Deserialize, Serialize};

/// Default receive timeout, in transport ticks. On an AVR UART a tick is a
/// single poll of the data register, roughly 1.25 µs.
pub const DEFAULT_RECEIVE_TIMEOUT: u32 = 5_000_000;

/// Tunables for a [`crate::Client`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Value field sent with every request; echoed back by the sync
    /// acknowledgement.
    pub request_tag: u32,
    /// Ticks [`crate::Client::receive`] waits before giving up.
    pub receive_timeout: u32,
    /// Ticks to wait for each packet while synchronizing.
    pub sync_timeout: u32,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            request_tag: DEFAULT_REQUEST_TAG,
            receive_timeout: DEFAULT_RECEIVE_TIMEOUT,
            sync_timeout: DEFAULT_RECEIVE_TIMEOUT,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let config: ClientConfig = serde_yaml::from_str("receive_timeout: 100\n").expect("parse");
        assert_eq!(config.receive_timeout, 100);
        assert_eq!(config.request_tag, 0x142);
        assert_eq!(config.sync_timeout, DEFAULT_RECEIVE_TIMEOUT);
    }
}
