// AEAD cipher suites: AES-256-GCM and ChaCha20-Poly1305 (RFC 8439).
//
// The suite is a protocol constant configured on both peers; it never travels
// on the wire. Both suites use a 96-bit nonce and a 128-bit tag.

// Both aes-gcm and chacha20poly1305 re-export the same `aead` traits.
// Import once from aes_gcm to avoid redundant imports.
use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce as AesNonce};
use chacha20poly1305::{ChaCha20Poly1305, Nonce};
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::error::{Result, TetherTrustError};

/// AEAD nonce length in bytes.
pub const NONCE_LEN: usize = 12;

/// AEAD tag length in bytes.
pub const TAG_LEN: usize = 16;

/// Symmetric key length in bytes.
pub const KEY_LEN: usize = 32;

/// Record encryption algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum CipherSuite {
    /// AES-256-GCM.
    #[default]
    #[serde(rename = "aes-256-gcm")]
    Aes256Gcm,
    /// ChaCha20-Poly1305.
    #[serde(rename = "chacha20-poly1305")]
    ChaCha20Poly1305,
}

impl CipherSuite {
    /// Algorithm label mixed into the HKDF info for the encryption key.
    pub fn label(self) -> &'static str {
        match self {
            CipherSuite::Aes256Gcm => "AES-256-GCM",
            CipherSuite::ChaCha20Poly1305 => "CHACHA20-POLY1305",
        }
    }
}

/// A 256-bit AEAD key bound to its cipher suite.
pub struct AeadKey {
    suite: CipherSuite,
    key: Zeroizing<[u8; KEY_LEN]>,
}

impl AeadKey {
    /// Construct from a 32-byte key and the desired cipher suite.
    pub fn new(suite: CipherSuite, key: &[u8; KEY_LEN]) -> Self {
        Self {
            suite,
            key: Zeroizing::new(*key),
        }
    }

    pub fn suite(&self) -> CipherSuite {
        self.suite
    }

    /// Encrypt `plaintext` under `nonce`. Returns ciphertext || 16-byte tag.
    pub fn encrypt(&self, nonce: &[u8; NONCE_LEN], plaintext: &[u8]) -> Result<Vec<u8>> {
        match self.suite {
            CipherSuite::Aes256Gcm => {
                let cipher = Aes256Gcm::new_from_slice(&self.key[..])
                    .map_err(|e| TetherTrustError::Encryption(format!("aes-gcm init: {e}")))?;
                cipher
                    .encrypt(AesNonce::from_slice(nonce), plaintext)
                    .map_err(|e| TetherTrustError::Encryption(format!("{e}")))
            }
            CipherSuite::ChaCha20Poly1305 => {
                let cipher = ChaCha20Poly1305::new_from_slice(&self.key[..])
                    .map_err(|e| TetherTrustError::Encryption(format!("cipher init: {e}")))?;
                cipher
                    .encrypt(Nonce::from_slice(nonce), plaintext)
                    .map_err(|e| TetherTrustError::Encryption(format!("{e}")))
            }
        }
    }

    /// Decrypt `ciphertext` (with its appended tag) under `nonce`.
    ///
    /// Any failure is reported as `AuthenticationFailure`; no partial
    /// plaintext is returned.
    pub fn decrypt(&self, nonce: &[u8; NONCE_LEN], ciphertext: &[u8]) -> Result<Vec<u8>> {
        match self.suite {
            CipherSuite::Aes256Gcm => {
                let cipher = Aes256Gcm::new_from_slice(&self.key[..])
                    .map_err(|e| TetherTrustError::CryptoUnavailable(format!("aes-gcm init: {e}")))?;
                cipher
                    .decrypt(AesNonce::from_slice(nonce), ciphertext)
                    .map_err(|_| TetherTrustError::AuthenticationFailure)
            }
            CipherSuite::ChaCha20Poly1305 => {
                let cipher = ChaCha20Poly1305::new_from_slice(&self.key[..])
                    .map_err(|e| TetherTrustError::CryptoUnavailable(format!("cipher init: {e}")))?;
                cipher
                    .decrypt(Nonce::from_slice(nonce), ciphertext)
                    .map_err(|_| TetherTrustError::AuthenticationFailure)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chacha_roundtrip() {
        let key = AeadKey::new(CipherSuite::ChaCha20Poly1305, &[0x42u8; 32]);
        let nonce = [0u8; 12];
        let ct = key.encrypt(&nonce, b"hello tether aead").unwrap();
        assert_eq!(ct.len(), b"hello tether aead".len() + TAG_LEN);
        assert_eq!(key.decrypt(&nonce, &ct).unwrap(), b"hello tether aead");
    }

    #[test]
    fn aes_gcm_roundtrip() {
        let key = AeadKey::new(CipherSuite::Aes256Gcm, &[0x99u8; 32]);
        let nonce = [1u8; 12];
        let ct = key.encrypt(&nonce, b"aes gcm secret").unwrap();
        assert_eq!(key.decrypt(&nonce, &ct).unwrap(), b"aes gcm secret");
    }

    #[test]
    fn aes_gcm_wrong_key_fails() {
        let enc = AeadKey::new(CipherSuite::Aes256Gcm, &[0x11u8; 32]);
        let dec = AeadKey::new(CipherSuite::Aes256Gcm, &[0x22u8; 32]);
        let nonce = [0u8; 12];
        let ct = enc.encrypt(&nonce, b"secret").unwrap();
        assert!(matches!(
            dec.decrypt(&nonce, &ct),
            Err(TetherTrustError::AuthenticationFailure)
        ));
    }

    #[test]
    fn chacha_tampered_ciphertext_fails() {
        let key = AeadKey::new(CipherSuite::ChaCha20Poly1305, &[0xBBu8; 32]);
        let nonce = [3u8; 12];
        let mut ct = key.encrypt(&nonce, b"data").unwrap();
        ct[0] ^= 0xFF; // flip a byte
        assert!(key.decrypt(&nonce, &ct).is_err());
    }

    #[test]
    fn suites_are_not_interchangeable() {
        let aes = AeadKey::new(CipherSuite::Aes256Gcm, &[0x55u8; 32]);
        let chacha = AeadKey::new(CipherSuite::ChaCha20Poly1305, &[0x55u8; 32]);
        let nonce = [0u8; 12];
        let ct = aes.encrypt(&nonce, b"msg").unwrap();
        assert!(chacha.decrypt(&nonce, &ct).is_err());
    }

    #[test]
    fn cipher_suite_serde_names() {
        let aes: CipherSuite = serde_json::from_str("\"aes-256-gcm\"").unwrap();
        let chacha: CipherSuite = serde_json::from_str("\"chacha20-poly1305\"").unwrap();
        assert_eq!(aes, CipherSuite::Aes256Gcm);
        assert_eq!(chacha, CipherSuite::ChaCha20Poly1305);
    }
}
