// Handshake state machine states.

use bytes::Bytes;

use crate::crypto::agreement::KeyPair;
use crate::handshake::messages::SALT_LEN;

/// The current state of one side of a handshake.
#[derive(Debug)]
pub enum HandshakeState {
    /// Nothing sent yet.
    Uninitiated,

    /// Our handshake message is out; waiting for the peer's.
    HandshakeSent {
        /// Ephemeral keypair, consumed when the peer's message arrives.
        keypair: KeyPair,
        /// The salt we sent.
        salt: [u8; SALT_LEN],
        /// The exact bytes we sent, kept to detect reflection.
        message: Bytes,
    },

    /// Session keys derived. No key material is retained here.
    Established,

    /// Terminal. Any key material has been dropped.
    Failed,
}

impl HandshakeState {
    /// Human-readable label for the current state (used in error messages).
    pub fn label(&self) -> &'static str {
        match self {
            HandshakeState::Uninitiated => "Uninitiated",
            HandshakeState::HandshakeSent { .. } => "HandshakeSent",
            HandshakeState::Established => "Established",
            HandshakeState::Failed => "Failed",
        }
    }
}
