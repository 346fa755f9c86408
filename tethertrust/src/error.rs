// TetherTrust error types

use thiserror::Error;

/// Top-level error type for the TetherTrust crate.
#[derive(Debug, Error)]
pub enum TetherTrustError {
    // ── Environment errors ──────────────────────────────────────────────
    #[error("crypto primitive unavailable: {0}")]
    CryptoUnavailable(String),

    #[error("entropy source unavailable: {0}")]
    EntropyUnavailable(String),

    // ── Peer-supplied data ──────────────────────────────────────────────
    #[error("malformed public key: {0}")]
    MalformedKey(String),

    #[error("malformed handshake: expected {expected} bytes, got {actual}")]
    MalformedHandshake { expected: usize, actual: usize },

    #[error("peer reflected our own handshake message")]
    ReflectedHandshake,

    #[error("malformed record: need at least {min} bytes, got {actual}")]
    MalformedRecord { min: usize, actual: usize },

    // ── Primitive rejections ────────────────────────────────────────────
    #[error("key agreement failed: {0}")]
    KeyAgreementFailure(String),

    #[error("key derivation failed: {0}")]
    DerivationFailure(String),

    #[error("record authentication failed")]
    AuthenticationFailure,

    #[error("AEAD encryption failed: {0}")]
    Encryption(String),

    // ── Handshake errors ────────────────────────────────────────────────
    #[error("invalid handshake state transition: {from} -> {to}")]
    InvalidStateTransition { from: String, to: String },

    // ── Configuration ───────────────────────────────────────────────────
    #[error("invalid protocol configuration: {0}")]
    Config(String),
}

impl TetherTrustError {
    /// True for errors caused by data the peer sent (as opposed to local
    /// environment or caller misuse).
    pub fn is_peer_fault(&self) -> bool {
        matches!(
            self,
            TetherTrustError::MalformedKey(_)
                | TetherTrustError::MalformedHandshake { .. }
                | TetherTrustError::ReflectedHandshake
                | TetherTrustError::MalformedRecord { .. }
                | TetherTrustError::KeyAgreementFailure(_)
                | TetherTrustError::AuthenticationFailure
        )
    }
}

/// Crate-level result alias.
pub type Result<T> = std::result::Result<T, TetherTrustError>;
