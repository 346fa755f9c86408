use thiserror::Error;

use tethertrust::TetherTrustError;

/// All errors produced by the TetherStream channel layer.
#[derive(Debug, Error)]
pub enum TetherStreamError {
    #[error("channel is not established")]
    ChannelNotReady,

    #[error("channel has failed")]
    ChannelFailed,

    #[error("channel is closed")]
    ChannelClosed,

    #[error("handshake did not complete within {timeout_ms} ms")]
    HandshakeTimeout { timeout_ms: u64 },

    #[error("payload too large: {size} bytes exceeds maximum {max}")]
    PayloadTooLarge { size: usize, max: usize },

    #[error("invalid state transition from {from} to {to}")]
    InvalidStateTransition { from: String, to: String },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("peer closed the transport")]
    PeerClosed,

    #[error("protocol error: {0}")]
    Protocol(#[from] TetherTrustError),

    #[error("invalid channel configuration: {0}")]
    Config(String),
}

impl TetherStreamError {
    /// True if the failure came from the transport rather than the protocol.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            TetherStreamError::Transport(_) | TetherStreamError::PeerClosed
        )
    }

    /// The underlying protocol error, if any.
    pub fn protocol(&self) -> Option<&TetherTrustError> {
        match self {
            TetherStreamError::Protocol(e) => Some(e),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, TetherStreamError>;
