// HKDF-SHA256 session key derivation.
//
// ```text
// prk         = HKDF-Extract(salt, shared_secret)
// encrypt_key = HKDF-Expand(prk, context || 0x00 || cipher_label,  32)
// auth_key    = HKDF-Expand(prk, context || 0x00 || "HMAC-SHA256", 32)
// ```
//
// Both expansions share the salt and context and differ only in the output
// key specification, so two peers holding the same shared secret, salt and
// context always arrive at the same pair of keys.

use std::fmt;

use hkdf::Hkdf;
use sha2::Sha256;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::crypto::aead::{CipherSuite, KEY_LEN};
use crate::crypto::agreement::SharedSecret;
use crate::error::{Result, TetherTrustError};

/// Output key specification label for the record MAC key.
pub const AUTH_KEY_LABEL: &str = "HMAC-SHA256";

/// Symmetric keys for one established session.
///
/// Opaque outside this crate and not cloneable: the only copy lives in the
/// [`RecordCipher`](crate::RecordCipher) that owns it, and is wiped on drop.
#[derive(Zeroize, ZeroizeOnDrop)]
#[cfg_attr(test, derive(PartialEq, Eq))]
pub struct SessionKeys {
    pub(crate) encrypt_key: [u8; KEY_LEN],
    pub(crate) auth_key: [u8; KEY_LEN],
}

impl fmt::Debug for SessionKeys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SessionKeys { .. }")
    }
}

fn info_for(context: &[u8], label: &str) -> Vec<u8> {
    let mut info = Vec::with_capacity(context.len() + 1 + label.len());
    info.extend_from_slice(context);
    info.push(0x00);
    info.extend_from_slice(label.as_bytes());
    info
}

/// Derive the encryption and authentication keys for a session.
pub fn derive_session_keys(
    shared_secret: &SharedSecret,
    salt: &[u8],
    context: &[u8],
    cipher: CipherSuite,
) -> Result<SessionKeys> {
    if shared_secret.is_empty() {
        return Err(TetherTrustError::DerivationFailure(
            "empty shared secret".into(),
        ));
    }

    let mut keys = SessionKeys {
        encrypt_key: [0u8; KEY_LEN],
        auth_key: [0u8; KEY_LEN],
    };

    {
        // The PRK copy is wiped here; the extractor drops at the end of the block.
        let (mut prk, hk) = Hkdf::<Sha256>::extract(Some(salt), shared_secret.as_bytes());
        prk.as_mut_slice().zeroize();

        hk.expand(&info_for(context, cipher.label()), &mut keys.encrypt_key)
            .map_err(|e| TetherTrustError::DerivationFailure(format!("HKDF expand error: {e}")))?;
        hk.expand(&info_for(context, AUTH_KEY_LABEL), &mut keys.auth_key)
            .map_err(|e| TetherTrustError::DerivationFailure(format!("HKDF expand error: {e}")))?;
    }

    if keys.encrypt_key == [0u8; KEY_LEN] || keys.auth_key == [0u8; KEY_LEN] {
        return Err(TetherTrustError::DerivationFailure(
            "derived an all-zero key".into(),
        ));
    }

    Ok(keys)
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONTEXT: &[u8] = b"tether/secure-channel/v1";

    #[test]
    fn derivation_is_deterministic() {
        let secret = SharedSecret::from_bytes(&[0x5Au8; 65]);
        let salt = [7u8; 64];
        let k1 = derive_session_keys(&secret, &salt, CONTEXT, CipherSuite::Aes256Gcm).unwrap();
        let k2 = derive_session_keys(&secret, &salt, CONTEXT, CipherSuite::Aes256Gcm).unwrap();
        assert_eq!(k1, k2);
    }

    #[test]
    fn encrypt_and_auth_keys_differ() {
        let secret = SharedSecret::from_bytes(&[0x11u8; 66]);
        let keys = derive_session_keys(&secret, &[1u8; 32], CONTEXT, CipherSuite::Aes256Gcm).unwrap();
        assert_ne!(keys.encrypt_key, keys.auth_key);
    }

    #[test]
    fn salt_and_context_separate_sessions() {
        let secret = SharedSecret::from_bytes(&[0x22u8; 32]);
        let base = derive_session_keys(&secret, &[1u8; 32], CONTEXT, CipherSuite::Aes256Gcm).unwrap();
        let other_salt =
            derive_session_keys(&secret, &[2u8; 32], CONTEXT, CipherSuite::Aes256Gcm).unwrap();
        let other_ctx =
            derive_session_keys(&secret, &[1u8; 32], b"other/v1", CipherSuite::Aes256Gcm).unwrap();
        assert_ne!(base.encrypt_key, other_salt.encrypt_key);
        assert_ne!(base.encrypt_key, other_ctx.encrypt_key);
        assert_ne!(base.auth_key, other_ctx.auth_key);
    }

    #[test]
    fn cipher_label_changes_only_encrypt_key() {
        let secret = SharedSecret::from_bytes(&[0x33u8; 32]);
        let aes = derive_session_keys(&secret, &[0u8; 32], CONTEXT, CipherSuite::Aes256Gcm).unwrap();
        let chacha =
            derive_session_keys(&secret, &[0u8; 32], CONTEXT, CipherSuite::ChaCha20Poly1305)
                .unwrap();
        assert_ne!(aes.encrypt_key, chacha.encrypt_key);
        assert_eq!(aes.auth_key, chacha.auth_key);
    }

    #[test]
    fn empty_secret_rejected() {
        let secret = SharedSecret::from_bytes(&[]);
        let err = derive_session_keys(&secret, &[0u8; 32], CONTEXT, CipherSuite::Aes256Gcm)
            .unwrap_err();
        assert!(matches!(err, TetherTrustError::DerivationFailure(_)));
    }

    #[test]
    fn derivation_matches_plain_hkdf() {
        let secret = SharedSecret::from_bytes(&[0x0bu8; 22]);
        let salt = [0x0cu8; 13];
        let keys = derive_session_keys(&secret, &salt, CONTEXT, CipherSuite::Aes256Gcm).unwrap();

        let hk = Hkdf::<Sha256>::new(Some(&salt), &[0x0bu8; 22]);
        let mut expected = [0u8; KEY_LEN];
        hk.expand(&info_for(CONTEXT, AUTH_KEY_LABEL), &mut expected)
            .unwrap();
        assert_eq!(keys.auth_key, expected);
    }

    #[test]
    fn zeroize_wipes_both_keys() {
        let secret = SharedSecret::from_bytes(&[0x55u8; 32]);
        let mut keys =
            derive_session_keys(&secret, &[0u8; 32], CONTEXT, CipherSuite::Aes256Gcm).unwrap();
        keys.zeroize();
        assert_eq!(keys.encrypt_key, [0u8; KEY_LEN]);
        assert_eq!(keys.auth_key, [0u8; KEY_LEN]);
    }

    #[test]
    fn debug_is_redacted() {
        let secret = SharedSecret::from_bytes(&[0x44u8; 32]);
        let keys = derive_session_keys(&secret, &[0u8; 32], CONTEXT, CipherSuite::Aes256Gcm).unwrap();
        assert_eq!(format!("{keys:?}"), "SessionKeys { .. }");
    }
}
