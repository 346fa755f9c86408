//! Channel configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tethertrust::{ProtocolConfig, TetherTrustError};

use crate::error::{Result, TetherStreamError};

/// Default handshake deadline in milliseconds.
pub const DEFAULT_HANDSHAKE_TIMEOUT_MS: u64 = 10_000;

/// Default upper bound on a single application payload.
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 1024 * 1024;

/// Configuration for a [`SecureChannel`](crate::SecureChannel).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ChannelConfig {
    /// Protocol parameters; must match the peer's.
    pub protocol: ProtocolConfig,
    /// Deadline for `open()` in milliseconds. `None` waits indefinitely.
    pub handshake_timeout_ms: Option<u64>,
    /// Largest plaintext accepted by `send()`.
    pub max_message_size: usize,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            protocol: ProtocolConfig::default(),
            handshake_timeout_ms: Some(DEFAULT_HANDSHAKE_TIMEOUT_MS),
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
        }
    }
}

impl ChannelConfig {
    /// Parse and validate a JSON document. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| TetherStreamError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.protocol.validate().map_err(|e| match e {
            TetherTrustError::Config(msg) => TetherStreamError::Config(msg),
            other => TetherStreamError::Config(other.to_string()),
        })?;
        if self.max_message_size == 0 {
            return Err(TetherStreamError::Config(
                "max_message_size must be greater than zero".into(),
            ));
        }
        if self.handshake_timeout_ms == Some(0) {
            return Err(TetherStreamError::Config(
                "handshake_timeout_ms must be greater than zero".into(),
            ));
        }
        Ok(())
    }

    pub fn handshake_timeout(&self) -> Option<Duration> {
        self.handshake_timeout_ms.map(Duration::from_millis)
    }
}
