// Handshake message exchanged by both peers before any record flows.
//
//   salt(32) || ephemeral_public_key(133 for P-521, 32 for X25519)
//
// Both lengths are fixed by the configured curve, so the split is unambiguous.

use bytes::{BufMut, Bytes, BytesMut};

use crate::crypto::agreement::Curve;
use crate::error::{Result, TetherTrustError};

/// Per-handshake salt length.
pub const SALT_LEN: usize = 32;

/// A parsed handshake message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandshakeMessage {
    /// Sender's fresh salt.
    pub salt: [u8; SALT_LEN],
    /// Sender's ephemeral public key encoding (not yet validated as a point).
    pub public_key: Vec<u8>,
}

/// Wire length of a handshake message for `curve`.
pub fn handshake_len(curve: Curve) -> usize {
    SALT_LEN + curve.public_key_len()
}

/// Frame `salt || public_key`.
pub fn build_handshake(salt: &[u8; SALT_LEN], public_key: &[u8]) -> Bytes {
    let mut buf = BytesMut::with_capacity(SALT_LEN + public_key.len());
    buf.put_slice(salt);
    buf.put_slice(public_key);
    buf.freeze()
}

/// Split a received handshake message into its salt and public key.
pub fn parse_handshake(curve: Curve, bytes: &[u8]) -> Result<HandshakeMessage> {
    let expected = handshake_len(curve);
    if bytes.len() != expected {
        return Err(TetherTrustError::MalformedHandshake {
            expected,
            actual: bytes.len(),
        });
    }

    let (salt_bytes, public_key) = bytes.split_at(SALT_LEN);
    let mut salt = [0u8; SALT_LEN];
    salt.copy_from_slice(salt_bytes);

    Ok(HandshakeMessage {
        salt,
        public_key: public_key.to_vec(),
    })
}

/// Derivation salt agreed by both peers: the two handshake salts in
/// ascending byte order, concatenated.
pub fn combine_salts(a: &[u8; SALT_LEN], b: &[u8; SALT_LEN]) -> [u8; 2 * SALT_LEN] {
    let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
    let mut out = [0u8; 2 * SALT_LEN];
    out[..SALT_LEN].copy_from_slice(lo);
    out[SALT_LEN..].copy_from_slice(hi);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_then_parse() {
        let salt = [0xA5u8; SALT_LEN];
        let public_key = vec![0x04u8; Curve::P521.public_key_len()];
        let wire = build_handshake(&salt, &public_key);
        assert_eq!(wire.len(), handshake_len(Curve::P521));

        let parsed = parse_handshake(Curve::P521, &wire).unwrap();
        assert_eq!(parsed.salt, salt);
        assert_eq!(parsed.public_key, public_key);
    }

    #[test]
    fn salt_comes_first() {
        let wire = build_handshake(&[1u8; SALT_LEN], &[2u8; 32]);
        assert_eq!(&wire[..SALT_LEN], &[1u8; SALT_LEN]);
        assert_eq!(&wire[SALT_LEN..], &[2u8; 32]);
    }

    #[test]
    fn wrong_lengths_rejected() {
        for len in [0, SALT_LEN, handshake_len(Curve::X25519) - 1, handshake_len(Curve::X25519) + 1] {
            let err = parse_handshake(Curve::X25519, &vec![0u8; len]).unwrap_err();
            assert!(matches!(
                err,
                TetherTrustError::MalformedHandshake { expected: 64, actual } if actual == len
            ));
        }
    }

    #[test]
    fn combined_salt_is_order_independent() {
        let a = [3u8; SALT_LEN];
        let mut b = [3u8; SALT_LEN];
        b[31] = 9;
        assert_eq!(combine_salts(&a, &b), combine_salts(&b, &a));
        assert_eq!(&combine_salts(&a, &b)[..SALT_LEN], &a);
    }
}
