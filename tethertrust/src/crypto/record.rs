//! Authenticated record layer.
//!
//! Every application message becomes one self-contained record:
//!
//! ```text
//! +-----------+----------------------+-------------+----------------+
//! | nonce(12) | ciphertext(len(pt))  | aead tag(16)| hmac-sha256(32)|
//! +-----------+----------------------+-------------+----------------+
//! ```
//!
//! The HMAC is keyed with the session's auth key and covers every byte before
//! it. On receipt the HMAC is checked in constant time first; the AEAD is only
//! invoked on records whose MAC verified.

use bytes::{BufMut, Bytes, BytesMut};
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::crypto::aead::{AeadKey, CipherSuite, NONCE_LEN, TAG_LEN};
use crate::crypto::kdf::SessionKeys;
use crate::crypto::random::RandomSource;
use crate::error::{Result, TetherTrustError};

type HmacSha256 = Hmac<Sha256>;

#[cfg(test)]
thread_local! {
    // AEAD decryptions attempted on this thread.
    static AEAD_OPENS: std::cell::Cell<usize> = const { std::cell::Cell::new(0) };
}

/// HMAC-SHA256 output length.
pub const MAC_LEN: usize = 32;

/// Smallest valid record: an empty plaintext.
pub const MIN_RECORD_LEN: usize = NONCE_LEN + TAG_LEN + MAC_LEN;

/// Bytes a record adds on top of its plaintext.
pub const RECORD_OVERHEAD: usize = MIN_RECORD_LEN;

/// Encrypt one plaintext into a framed record.
pub fn encrypt_record(
    keys: &SessionKeys,
    cipher: CipherSuite,
    rng: &mut dyn RandomSource,
    plaintext: &[u8],
) -> Result<Bytes> {
    let mut nonce = [0u8; NONCE_LEN];
    rng.fill_bytes(&mut nonce)?;

    let sealed = AeadKey::new(cipher, &keys.encrypt_key).encrypt(&nonce, plaintext)?;

    let mut record = BytesMut::with_capacity(NONCE_LEN + sealed.len() + MAC_LEN);
    record.put_slice(&nonce);
    record.put_slice(&sealed);

    let tag = mac(&keys.auth_key)?.chain_update(&record[..]).finalize();
    record.put_slice(&tag.into_bytes());

    Ok(record.freeze())
}

/// Check a record's trailing HMAC in constant time.
///
/// Returns the authenticated prefix (`nonce || ciphertext || tag`) on
/// success. Nothing in the prefix should be trusted before this passes.
pub fn verify_mac<'a>(keys: &SessionKeys, record: &'a [u8]) -> Result<&'a [u8]> {
    if record.len() < MIN_RECORD_LEN {
        return Err(TetherTrustError::MalformedRecord {
            min: MIN_RECORD_LEN,
            actual: record.len(),
        });
    }

    let (authenticated, tag) = record.split_at(record.len() - MAC_LEN);
    mac(&keys.auth_key)?
        .chain_update(authenticated)
        .verify_slice(tag)
        .map_err(|_| TetherTrustError::AuthenticationFailure)?;
    Ok(authenticated)
}

/// Verify and decrypt one framed record.
pub fn decrypt_record(keys: &SessionKeys, cipher: CipherSuite, record: &[u8]) -> Result<Vec<u8>> {
    let authenticated = verify_mac(keys, record)?;

    let (nonce, sealed) = authenticated.split_at(NONCE_LEN);
    let mut nonce_arr = [0u8; NONCE_LEN];
    nonce_arr.copy_from_slice(nonce);

    #[cfg(test)]
    AEAD_OPENS.with(|n| n.set(n.get() + 1));

    AeadKey::new(cipher, &keys.encrypt_key).decrypt(&nonce_arr, sealed)
}

fn mac(auth_key: &[u8]) -> Result<HmacSha256> {
    <HmacSha256 as Mac>::new_from_slice(auth_key)
        .map_err(|e| TetherTrustError::CryptoUnavailable(format!("hmac init: {e}")))
}

/// Session keys bound to a cipher suite: the per-channel record cipher.
///
/// Immutable once built; nonces come from the caller's randomness source.
pub struct RecordCipher {
    keys: SessionKeys,
    cipher: CipherSuite,
}

impl RecordCipher {
    pub fn new(keys: SessionKeys, cipher: CipherSuite) -> Self {
        Self { keys, cipher }
    }

    pub fn cipher_suite(&self) -> CipherSuite {
        self.cipher
    }

    #[cfg(test)]
    pub(crate) fn keys(&self) -> &SessionKeys {
        &self.keys
    }

    pub fn seal(&self, rng: &mut dyn RandomSource, plaintext: &[u8]) -> Result<Bytes> {
        encrypt_record(&self.keys, self.cipher, rng, plaintext)
    }

    pub fn open(&self, record: &[u8]) -> Result<Vec<u8>> {
        decrypt_record(&self.keys, self.cipher, record)
    }
}

impl std::fmt::Debug for RecordCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordCipher")
            .field("cipher", &self.cipher)
            .finish_non_exhaustive()
    }
}
