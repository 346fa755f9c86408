//! Secure channel state machine.
//!
//! Lifecycle:
//! Uninitiated -> HandshakeSent -> Established -> Closed,
//! with Failed reachable from any non-terminal state.
//!
//! `open()` connects the transport, sends our handshake message first and
//! waits for the peer's. Once established, every `send()` becomes exactly one
//! record and every inbound transport message is decrypted as one record.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use tethertrust::crypto::record::RECORD_OVERHEAD;
use tethertrust::{Handshake, OsRandom, RandomSource, RecordCipher};

use crate::config::ChannelConfig;
use crate::error::{Result, TetherStreamError};
use crate::transport::{Transport, TransportEvent};

/// Channel lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    /// `open()` has not been called.
    Uninitiated,
    /// Our handshake message is out; waiting for the peer's.
    HandshakeSent,
    /// Session keys are in place; records flow.
    Established,
    /// Closed locally or via a [`CloseHandle`].
    Closed,
    /// Terminal failure, including the peer closing the transport.
    /// Create a new channel to retry.
    Failed,
}

impl fmt::Display for ChannelState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelState::Uninitiated => write!(f, "Uninitiated"),
            ChannelState::HandshakeSent => write!(f, "HandshakeSent"),
            ChannelState::Established => write!(f, "Established"),
            ChannelState::Closed => write!(f, "Closed"),
            ChannelState::Failed => write!(f, "Failed"),
        }
    }
}

/// Closes a channel from another task.
///
/// A pending `open()` or `receive()` on the channel resolves with
/// [`TetherStreamError::ChannelClosed`].
#[derive(Debug, Clone)]
pub struct CloseHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl CloseHandle {
    pub fn close(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_closed(&self) -> bool {
        *self.tx.borrow()
    }
}

/// An encrypted, authenticated message channel over a [`Transport`].
pub struct SecureChannel<T: Transport> {
    transport: T,
    config: ChannelConfig,
    rng: Box<dyn RandomSource + Send>,
    handshake: Handshake,
    cipher: Option<RecordCipher>,
    state: ChannelState,
    close_tx: Arc<watch::Sender<bool>>,
    close_rx: watch::Receiver<bool>,
}

impl<T: Transport> SecureChannel<T> {
    /// Create a channel drawing randomness from the operating system.
    ///
    /// Fails with `Config` if `config` does not pass [`ChannelConfig::validate`].
    pub fn new(transport: T, config: ChannelConfig) -> Result<Self> {
        Self::with_rng(transport, config, OsRandom::os())
    }

    /// Create a channel with an explicit randomness source.
    pub fn with_rng<R>(transport: T, config: ChannelConfig, rng: R) -> Result<Self>
    where
        R: RandomSource + Send + 'static,
    {
        config.validate()?;
        let (close_tx, close_rx) = watch::channel(false);
        Ok(Self {
            handshake: Handshake::new(config.protocol.clone()),
            transport,
            config,
            rng: Box::new(rng),
            cipher: None,
            state: ChannelState::Uninitiated,
            close_tx: Arc::new(close_tx),
            close_rx,
        })
    }

    pub fn state(&self) -> ChannelState {
        self.state
    }

    pub fn config(&self) -> &ChannelConfig {
        &self.config
    }

    pub fn is_established(&self) -> bool {
        self.state == ChannelState::Established
    }

    pub fn close_handle(&self) -> CloseHandle {
        CloseHandle {
            tx: Arc::clone(&self.close_tx),
        }
    }

    /// Run the handshake. Resolves once, when the channel is established or
    /// has failed.
    pub async fn open(&mut self) -> Result<()> {
        self.honor_close_request().await;
        match self.state {
            ChannelState::Uninitiated => {}
            ChannelState::Failed => return Err(TetherStreamError::ChannelFailed),
            ChannelState::Closed => return Err(TetherStreamError::ChannelClosed),
            other => {
                return Err(TetherStreamError::InvalidStateTransition {
                    from: other.to_string(),
                    to: ChannelState::HandshakeSent.to_string(),
                })
            }
        }

        let mut close_rx = self.close_rx.clone();
        let limit = self.config.handshake_timeout();
        let result = tokio::select! {
            biased;
            _ = close_requested(&mut close_rx) => Err(TetherStreamError::ChannelClosed),
            r = with_deadline(limit, self.run_handshake()) => r,
        };

        match result {
            Ok(()) => {
                info!(
                    curve = %self.config.protocol.curve,
                    cipher = self.config.protocol.cipher.label(),
                    "secure channel established"
                );
                Ok(())
            }
            // Only a local close request produces this.
            Err(TetherStreamError::ChannelClosed) => {
                self.close().await;
                Err(TetherStreamError::ChannelClosed)
            }
            Err(e) => {
                self.fail(&e).await;
                Err(e)
            }
        }
    }

    async fn run_handshake(&mut self) -> Result<()> {
        self.transport.connect().await?;
        debug!("transport open, starting handshake");

        let message = self.handshake.initiate(&mut *self.rng)?;
        self.state = ChannelState::HandshakeSent;
        self.transport.send_message(message).await?;

        let peer_message = match self.transport.next_event().await {
            Some(TransportEvent::Message(m)) => m,
            Some(TransportEvent::Error(reason)) => return Err(TetherStreamError::Transport(reason)),
            Some(TransportEvent::Closed) | None => return Err(TetherStreamError::PeerClosed),
        };
        debug!(len = peer_message.len(), "peer handshake received");

        let cipher = self.handshake.receive(&peer_message)?;
        self.cipher = Some(cipher);
        self.state = ChannelState::Established;
        Ok(())
    }

    /// Encrypt `plaintext` into one record and send it.
    pub async fn send(&mut self, plaintext: &[u8]) -> Result<()> {
        self.honor_close_request().await;
        self.ensure_established()?;

        let max = self.config.max_message_size;
        if plaintext.len() > max {
            return Err(TetherStreamError::PayloadTooLarge {
                size: plaintext.len(),
                max,
            });
        }

        let cipher = self
            .cipher
            .as_ref()
            .ok_or(TetherStreamError::ChannelNotReady)?;
        let record = match cipher.seal(&mut *self.rng, plaintext) {
            Ok(record) => record,
            Err(e) => {
                let err = TetherStreamError::from(e);
                self.fail(&err).await;
                return Err(err);
            }
        };

        debug!(len = record.len(), "record sent");
        if let Err(e) = self.transport.send_message(record).await {
            self.fail(&e).await;
            return Err(e);
        }
        Ok(())
    }

    /// Wait for the next record from the peer and return its plaintext.
    pub async fn receive(&mut self) -> Result<Bytes> {
        self.honor_close_request().await;
        self.ensure_established()?;

        let event = tokio::select! {
            biased;
            _ = close_requested(&mut self.close_rx) => None,
            event = self.transport.next_event() => Some(event),
        };
        let Some(event) = event else {
            self.close().await;
            return Err(TetherStreamError::ChannelClosed);
        };

        match event {
            Some(TransportEvent::Message(record)) => {
                let limit = self.config.max_message_size.saturating_add(RECORD_OVERHEAD);
                if record.len() > limit {
                    let err = TetherStreamError::PayloadTooLarge {
                        size: record.len().saturating_sub(RECORD_OVERHEAD),
                        max: self.config.max_message_size,
                    };
                    self.fail(&err).await;
                    return Err(err);
                }
                let cipher = self
                    .cipher
                    .as_ref()
                    .ok_or(TetherStreamError::ChannelNotReady)?;
                match cipher.open(&record) {
                    Ok(plaintext) => {
                        debug!(len = record.len(), "record received");
                        Ok(Bytes::from(plaintext))
                    }
                    Err(e) => {
                        let err = TetherStreamError::from(e);
                        self.fail(&err).await;
                        Err(err)
                    }
                }
            }
            Some(TransportEvent::Error(reason)) => {
                let err = TetherStreamError::Transport(reason);
                self.fail(&err).await;
                Err(err)
            }
            Some(TransportEvent::Closed) | None => {
                let err = TetherStreamError::PeerClosed;
                self.fail(&err).await;
                Err(err)
            }
        }
    }

    /// Close the channel and its transport, dropping all key material.
    /// Idempotent. A failed channel stays `Failed`.
    pub async fn close(&mut self) {
        if self.state == ChannelState::Closed {
            return;
        }
        let from = self.state;
        if from != ChannelState::Failed {
            self.state = ChannelState::Closed;
        }
        self.discard_keys();
        self.close_tx.send_replace(true);
        self.transport.close().await;
        info!(from = %from, "secure channel closed");
    }

    async fn fail(&mut self, err: &TetherStreamError) {
        warn!(state = %self.state, error = %err, "secure channel failed");
        self.state = ChannelState::Failed;
        self.discard_keys();
        self.transport.close().await;
    }

    fn discard_keys(&mut self) {
        self.cipher = None;
        if !self.handshake.is_established() {
            self.handshake.fail();
        }
    }

    async fn honor_close_request(&mut self) {
        let requested = *self.close_rx.borrow();
        if requested && !matches!(self.state, ChannelState::Closed | ChannelState::Failed) {
            self.close().await;
        }
    }

    fn ensure_established(&self) -> Result<()> {
        match self.state {
            ChannelState::Established => Ok(()),
            ChannelState::Uninitiated | ChannelState::HandshakeSent => {
                Err(TetherStreamError::ChannelNotReady)
            }
            ChannelState::Closed => Err(TetherStreamError::ChannelClosed),
            ChannelState::Failed => Err(TetherStreamError::ChannelFailed),
        }
    }
}

impl<T: Transport> fmt::Debug for SecureChannel<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecureChannel")
            .field("state", &self.state)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Resolves once a close has been requested.
async fn close_requested(rx: &mut watch::Receiver<bool>) {
    if rx.wait_for(|closed| *closed).await.is_err() {
        // Sender gone: nobody can request a close any more.
        std::future::pending::<()>().await;
    }
}

async fn with_deadline<F>(limit: Option<Duration>, fut: F) -> Result<()>
where
    F: Future<Output = Result<()>>,
{
    match limit {
        Some(limit) => tokio::time::timeout(limit, fut).await.unwrap_or_else(|_| {
            Err(TetherStreamError::HandshakeTimeout {
                timeout_ms: u64::try_from(limit.as_millis()).unwrap_or(u64::MAX),
            })
        }),
        None => fut.await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::MemoryTransport;

    #[test]
    fn state_labels() {
        assert_eq!(ChannelState::Uninitiated.to_string(), "Uninitiated");
        assert_eq!(ChannelState::Established.to_string(), "Established");
        assert_eq!(ChannelState::Failed.to_string(), "Failed");
    }

    #[tokio::test]
    async fn send_before_open_is_not_ready() {
        let (a, _b) = MemoryTransport::pair();
        let mut channel = SecureChannel::new(a, ChannelConfig::default()).unwrap();
        assert!(matches!(
            channel.send(b"early").await,
            Err(TetherStreamError::ChannelNotReady)
        ));
        assert!(matches!(
            channel.receive().await,
            Err(TetherStreamError::ChannelNotReady)
        ));
        assert_eq!(channel.state(), ChannelState::Uninitiated);
    }

    #[test]
    fn invalid_config_rejected_at_construction() {
        for config in [
            ChannelConfig {
                max_message_size: 0,
                ..ChannelConfig::default()
            },
            ChannelConfig {
                handshake_timeout_ms: Some(0),
                ..ChannelConfig::default()
            },
        ] {
            let (a, _b) = MemoryTransport::pair();
            assert!(matches!(
                SecureChannel::new(a, config),
                Err(TetherStreamError::Config(_))
            ));
        }
    }

    #[tokio::test]
    async fn close_is_idempotent() {
        let (a, _b) = MemoryTransport::pair();
        let mut channel = SecureChannel::new(a, ChannelConfig::default()).unwrap();
        channel.close().await;
        channel.close().await;
        assert_eq!(channel.state(), ChannelState::Closed);
        assert!(channel.close_handle().is_closed());
        assert!(matches!(
            channel.open().await,
            Err(TetherStreamError::ChannelClosed)
        ));
    }
}
