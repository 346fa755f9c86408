// Ephemeral ECDH key agreement for one handshake.
//
// Two curves are supported; which one is used is a protocol constant that
// both peers configure identically (nothing is negotiated on the wire):
//
//   P-521   public key = SEC1 uncompressed point (133 bytes)
//           shared secret = 66-byte big-endian x-coordinate
//   X25519  public key = 32 bytes, shared secret = 32 bytes
//
// The raw shared secret has a single leading zero byte stripped when present.
// For P-521 this happens on roughly half of all exchanges because the 66-byte
// encoding only carries 521 significant bits.

use std::fmt;

use p521::elliptic_curve::sec1::ToEncodedPoint;
use serde::{Deserialize, Serialize};
use x25519_dalek::{PublicKey as X25519PublicKey, StaticSecret};
use zeroize::Zeroizing;

use crate::crypto::random::RandomSource;
use crate::error::{Result, TetherTrustError};

/// SEC1 uncompressed P-521 point: 0x04 || x(66) || y(66).
pub const P521_PUBLIC_KEY_LEN: usize = 133;

/// Raw X25519 public key length.
pub const X25519_PUBLIC_KEY_LEN: usize = 32;

const SEC1_UNCOMPRESSED_TAG: u8 = 0x04;
const P521_SCALAR_LEN: usize = 66;

/// Rejection-sampling budget for P-521 scalars. A masked 521-bit candidate is
/// out of range with probability ~2^-260, so hitting this limit means the
/// randomness source is broken.
const MAX_SCALAR_ATTEMPTS: usize = 16;

/// Named curve used for the ephemeral exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Curve {
    /// NIST P-521 (secp521r1).
    #[default]
    P521,
    /// Curve25519 in Montgomery form.
    X25519,
}

impl Curve {
    /// Length of the exported public key encoding.
    pub fn public_key_len(self) -> usize {
        match self {
            Curve::P521 => P521_PUBLIC_KEY_LEN,
            Curve::X25519 => X25519_PUBLIC_KEY_LEN,
        }
    }

    /// Human-readable curve name.
    pub fn label(self) -> &'static str {
        match self {
            Curve::P521 => "P-521",
            Curve::X25519 => "X25519",
        }
    }

    /// Generate a fresh ephemeral keypair, drawing the private scalar from `rng`.
    pub fn generate(self, rng: &mut dyn RandomSource) -> Result<KeyPair> {
        match self {
            Curve::P521 => generate_p521(rng),
            Curve::X25519 => {
                let mut bytes = Zeroizing::new([0u8; 32]);
                rng.fill_bytes(&mut bytes[..])?;
                let secret = StaticSecret::from(*bytes);
                let public = X25519PublicKey::from(&secret);
                Ok(KeyPair {
                    secret: LocalSecret::X25519(secret),
                    public: public.as_bytes().to_vec(),
                })
            }
        }
    }

    /// Import a peer's public key from its raw encoding.
    pub fn import_public(self, bytes: &[u8]) -> Result<PeerPublicKey> {
        let expected = self.public_key_len();
        if bytes.len() != expected {
            return Err(TetherTrustError::MalformedKey(format!(
                "{} public key must be {expected} bytes, got {}",
                self.label(),
                bytes.len()
            )));
        }

        match self {
            Curve::P521 => {
                if bytes[0] != SEC1_UNCOMPRESSED_TAG {
                    return Err(TetherTrustError::MalformedKey(format!(
                        "expected uncompressed SEC1 tag 0x04, got 0x{:02x}",
                        bytes[0]
                    )));
                }
                // from_sec1_bytes rejects points off the curve and the identity.
                let key = p521::PublicKey::from_sec1_bytes(bytes).map_err(|_| {
                    TetherTrustError::MalformedKey("point is not on the P-521 curve".into())
                })?;
                Ok(PeerPublicKey::P521(key))
            }
            Curve::X25519 => {
                let mut raw = [0u8; X25519_PUBLIC_KEY_LEN];
                raw.copy_from_slice(bytes);
                Ok(PeerPublicKey::X25519(X25519PublicKey::from(raw)))
            }
        }
    }
}

impl fmt::Display for Curve {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

fn generate_p521(rng: &mut dyn RandomSource) -> Result<KeyPair> {
    for _ in 0..MAX_SCALAR_ATTEMPTS {
        let mut candidate = Zeroizing::new([0u8; P521_SCALAR_LEN]);
        rng.fill_bytes(&mut candidate[..])?;
        // Keep only the low 521 bits; the group order sits just below 2^521.
        candidate[0] &= 0x01;

        if let Ok(secret) = p521::SecretKey::from_slice(&candidate[..]) {
            let public = secret
                .public_key()
                .to_encoded_point(false)
                .as_bytes()
                .to_vec();
            return Ok(KeyPair {
                secret: LocalSecret::P521(secret),
                public,
            });
        }
    }

    Err(TetherTrustError::CryptoUnavailable(format!(
        "no valid P-521 scalar after {MAX_SCALAR_ATTEMPTS} attempts"
    )))
}

enum LocalSecret {
    P521(p521::SecretKey),
    X25519(StaticSecret),
}

/// An ephemeral keypair for one handshake.
///
/// The private half never leaves this type. It is consumed by
/// [`KeyPair::compute_shared_secret`] and zeroized when dropped.
pub struct KeyPair {
    secret: LocalSecret,
    public: Vec<u8>,
}

impl KeyPair {
    /// The curve this keypair lives on.
    pub fn curve(&self) -> Curve {
        match self.secret {
            LocalSecret::P521(_) => Curve::P521,
            LocalSecret::X25519(_) => Curve::X25519,
        }
    }

    /// Fixed-length raw encoding of the public key.
    pub fn export_public(&self) -> &[u8] {
        &self.public
    }

    /// Perform Diffie-Hellman with a peer's public key.
    ///
    /// Consumes the keypair so the private key cannot outlive the exchange.
    /// The returned secret has a single leading zero byte stripped if present.
    pub fn compute_shared_secret(self, peer: &PeerPublicKey) -> Result<SharedSecret> {
        match (&self.secret, peer) {
            (LocalSecret::P521(secret), PeerPublicKey::P521(peer_pk)) => {
                let shared = p521::elliptic_curve::ecdh::diffie_hellman(
                    secret.to_nonzero_scalar(),
                    peer_pk.as_affine(),
                );
                Ok(SharedSecret::normalized(shared.raw_secret_bytes().as_slice()))
            }
            (LocalSecret::X25519(secret), PeerPublicKey::X25519(peer_pk)) => {
                let shared = secret.diffie_hellman(peer_pk);
                if !shared.was_contributory() {
                    return Err(TetherTrustError::KeyAgreementFailure(
                        "peer key is a low-order X25519 point".into(),
                    ));
                }
                Ok(SharedSecret::normalized(shared.as_bytes()))
            }
            _ => Err(TetherTrustError::KeyAgreementFailure(format!(
                "peer key is on {}, local key is on {}",
                peer.curve(),
                self.curve()
            ))),
        }
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("curve", &self.curve())
            .field("public_len", &self.public.len())
            .finish_non_exhaustive()
    }
}

/// A validated peer public key.
#[derive(Debug, Clone)]
pub enum PeerPublicKey {
    P521(p521::PublicKey),
    X25519(X25519PublicKey),
}

impl PeerPublicKey {
    pub fn curve(&self) -> Curve {
        match self {
            PeerPublicKey::P521(_) => Curve::P521,
            PeerPublicKey::X25519(_) => Curve::X25519,
        }
    }
}

/// Normalized ECDH output, zeroized on drop.
pub struct SharedSecret(Zeroizing<Vec<u8>>);

impl SharedSecret {
    fn normalized(raw: &[u8]) -> Self {
        Self(Zeroizing::new(strip_leading_zero(raw).to_vec()))
    }

    /// Wrap bytes that are already normalized (derivation tests, interop vectors).
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self(Zeroizing::new(bytes.to_vec()))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for SharedSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SharedSecret({} bytes)", self.0.len())
    }
}

/// Drop a single leading zero byte, the encoding artifact of fixed-width
/// shared secrets.
pub fn strip_leading_zero(raw: &[u8]) -> &[u8] {
    match raw.split_first() {
        Some((&0, rest)) => rest,
        _ => raw,
    }
}
