// Symmetric ephemeral handshake.
//
//   Peer A                               Peer B
//     |--- salt_a || pub_a ------------->|
//     |<------------- salt_b || pub_b ---|
//     |   shared = ECDH(own secret, peer public)
//     |   salt   = sort(salt_a, salt_b) concatenated
//     |   keys   = HKDF(shared, salt, context)
//     |==== records ====================|
//
// There are no roles: both sides run the same code and may send first.

use bytes::Bytes;
use tracing::debug;

use crate::config::ProtocolConfig;
use crate::crypto::kdf::derive_session_keys;
use crate::crypto::random::RandomSource;
use crate::crypto::record::RecordCipher;
use crate::error::{Result, TetherTrustError};
use crate::handshake::messages::{build_handshake, combine_salts, parse_handshake, SALT_LEN};
use crate::handshake::state::HandshakeState;

/// One side of a handshake.
#[derive(Debug)]
pub struct Handshake {
    config: ProtocolConfig,
    state: HandshakeState,
}

impl Handshake {
    pub fn new(config: ProtocolConfig) -> Self {
        Self {
            config,
            state: HandshakeState::Uninitiated,
        }
    }

    pub fn config(&self) -> &ProtocolConfig {
        &self.config
    }

    pub fn state(&self) -> &HandshakeState {
        &self.state
    }

    pub fn is_established(&self) -> bool {
        matches!(self.state, HandshakeState::Established)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.state, HandshakeState::Failed)
    }

    /// Generate an ephemeral keypair and salt and return the message to send.
    ///
    /// Valid once, from `Uninitiated`.
    pub fn initiate(&mut self, rng: &mut dyn RandomSource) -> Result<Bytes> {
        if !matches!(self.state, HandshakeState::Uninitiated) {
            return Err(TetherTrustError::InvalidStateTransition {
                from: self.state.label().into(),
                to: "HandshakeSent".into(),
            });
        }

        let keypair = match self.config.curve.generate(rng) {
            Ok(kp) => kp,
            Err(e) => {
                self.state = HandshakeState::Failed;
                return Err(e);
            }
        };

        let mut salt = [0u8; SALT_LEN];
        if let Err(e) = rng.fill_bytes(&mut salt) {
            self.state = HandshakeState::Failed;
            return Err(e);
        }

        let message = build_handshake(&salt, keypair.export_public());
        debug!(
            curve = %self.config.curve,
            len = message.len(),
            "handshake message generated"
        );

        self.state = HandshakeState::HandshakeSent {
            keypair,
            salt,
            message: message.clone(),
        };
        Ok(message)
    }

    /// Process the peer's handshake message and derive the session keys.
    ///
    /// On any validation or derivation failure the handshake moves to
    /// `Failed` and the ephemeral key is dropped.
    pub fn receive(&mut self, message: &[u8]) -> Result<RecordCipher> {
        // Leaves `Failed` behind; only success overwrites it.
        let (keypair, own_salt, own_message) =
            match std::mem::replace(&mut self.state, HandshakeState::Failed) {
                HandshakeState::HandshakeSent {
                    keypair,
                    salt,
                    message,
                } => (keypair, salt, message),
                other => {
                    let from = other.label();
                    self.state = other;
                    return Err(TetherTrustError::InvalidStateTransition {
                        from: from.into(),
                        to: "Established".into(),
                    });
                }
            };

        let curve = self.config.curve;
        let peer = parse_handshake(curve, message)?;
        if message == &own_message[..] {
            return Err(TetherTrustError::ReflectedHandshake);
        }

        let peer_key = curve.import_public(&peer.public_key)?;
        let shared = keypair.compute_shared_secret(&peer_key)?;
        let salt = combine_salts(&own_salt, &peer.salt);
        let keys = derive_session_keys(
            &shared,
            &salt,
            self.config.context.as_bytes(),
            self.config.cipher,
        )?;

        self.state = HandshakeState::Established;
        debug!(
            curve = %curve,
            cipher = self.config.cipher.label(),
            "handshake established"
        );
        Ok(RecordCipher::new(keys, self.config.cipher))
    }

    /// Abandon the handshake, dropping any key material.
    pub fn fail(&mut self) {
        self.state = HandshakeState::Failed;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::random::RngSource;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn rng(seed: u64) -> RngSource<StdRng> {
        RngSource::new(StdRng::seed_from_u64(seed))
    }

    #[test]
    fn receive_before_initiate_keeps_state() {
        let mut hs = Handshake::new(ProtocolConfig::default());
        let err = hs.receive(&[0u8; 165]).unwrap_err();
        assert!(matches!(err, TetherTrustError::InvalidStateTransition { .. }));
        assert_eq!(hs.state().label(), "Uninitiated");
    }

    #[test]
    fn second_initiate_rejected() {
        let mut hs = Handshake::new(ProtocolConfig::default());
        hs.initiate(&mut rng(1)).unwrap();
        let err = hs.initiate(&mut rng(2)).unwrap_err();
        assert!(matches!(
            err,
            TetherTrustError::InvalidStateTransition { ref from, .. } if from == "HandshakeSent"
        ));
        assert_eq!(hs.state().label(), "HandshakeSent");
    }

    #[test]
    fn fail_drops_to_failed() {
        let mut hs = Handshake::new(ProtocolConfig::default());
        hs.initiate(&mut rng(3)).unwrap();
        hs.fail();
        assert!(hs.is_failed());
    }
}
