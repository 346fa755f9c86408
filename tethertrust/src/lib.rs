// TetherTrust: ephemeral key agreement, session key derivation and the
// authenticated record format for Tether secure channels.
//
// Crate root: module declarations and public re-exports.

pub mod config;
pub mod crypto;
pub mod error;
pub mod handshake;

// Re-export key types at crate root for convenience.
pub use config::{ProtocolConfig, DEFAULT_CONTEXT};
pub use crypto::aead::CipherSuite;
pub use crypto::agreement::{Curve, KeyPair, PeerPublicKey, SharedSecret};
pub use crypto::kdf::{derive_session_keys, SessionKeys};
pub use crypto::random::{OsRandom, RandomSource, RngSource};
pub use crypto::record::{decrypt_record, encrypt_record, verify_mac, RecordCipher, MIN_RECORD_LEN};
pub use error::{Result, TetherTrustError};
pub use handshake::{Handshake, HandshakeState};
