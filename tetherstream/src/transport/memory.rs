//! In-process transport pair backed by tokio channels.

use bytes::Bytes;
use tokio::sync::mpsc;
use tracing::trace;

use super::{Transport, TransportEvent};
use crate::error::{Result, TetherStreamError};

/// One end of an in-memory transport pair.
#[derive(Debug)]
pub struct MemoryTransport {
    outbound: Option<mpsc::UnboundedSender<TransportEvent>>,
    inbound: mpsc::UnboundedReceiver<TransportEvent>,
    connected: bool,
    closed: bool,
}

impl MemoryTransport {
    /// Two connected ends. Whatever one end sends, the other receives.
    pub fn pair() -> (Self, Self) {
        let (a_tx, b_rx) = mpsc::unbounded_channel();
        let (b_tx, a_rx) = mpsc::unbounded_channel();
        (Self::new(a_tx, a_rx), Self::new(b_tx, b_rx))
    }

    fn new(
        outbound: mpsc::UnboundedSender<TransportEvent>,
        inbound: mpsc::UnboundedReceiver<TransportEvent>,
    ) -> Self {
        Self {
            outbound: Some(outbound),
            inbound,
            connected: false,
            closed: false,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connected && !self.closed
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

impl Transport for MemoryTransport {
    async fn connect(&mut self) -> Result<()> {
        if self.closed {
            return Err(TetherStreamError::Transport("transport is closed".into()));
        }
        self.connected = true;
        Ok(())
    }

    async fn send_message(&mut self, message: Bytes) -> Result<()> {
        if !self.connected {
            return Err(TetherStreamError::Transport("transport is not connected".into()));
        }
        let outbound = self
            .outbound
            .as_ref()
            .ok_or_else(|| TetherStreamError::Transport("transport is closed".into()))?;
        trace!(len = message.len(), "memory transport send");
        outbound
            .send(TransportEvent::Message(message))
            .map_err(|_| TetherStreamError::Transport("peer end dropped".into()))
    }

    async fn next_event(&mut self) -> Option<TransportEvent> {
        if self.closed {
            return None;
        }
        self.inbound.recv().await
    }

    async fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        if let Some(outbound) = self.outbound.take() {
            // The peer may already be gone.
            let _ = outbound.send(TransportEvent::Closed);
        }
        self.inbound.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn messages_arrive_in_order() {
        let (mut a, mut b) = MemoryTransport::pair();
        a.connect().await.unwrap();
        b.connect().await.unwrap();

        a.send_message(Bytes::from_static(b"one")).await.unwrap();
        a.send_message(Bytes::from_static(b"two")).await.unwrap();

        assert_eq!(
            b.next_event().await,
            Some(TransportEvent::Message(Bytes::from_static(b"one")))
        );
        assert_eq!(
            b.next_event().await,
            Some(TransportEvent::Message(Bytes::from_static(b"two")))
        );
    }

    #[tokio::test]
    async fn send_requires_connect() {
        let (mut a, _b) = MemoryTransport::pair();
        let err = a.send_message(Bytes::from_static(b"x")).await.unwrap_err();
        assert!(err.is_transport());
    }

    #[tokio::test]
    async fn close_notifies_peer() {
        let (mut a, mut b) = MemoryTransport::pair();
        a.connect().await.unwrap();
        a.close().await;
        a.close().await;

        assert!(a.is_closed());
        assert_eq!(b.next_event().await, Some(TransportEvent::Closed));
        assert_eq!(b.next_event().await, None);
        assert!(a.connect().await.is_err());
    }

    #[tokio::test]
    async fn dropped_peer_ends_stream() {
        let (mut a, b) = MemoryTransport::pair();
        a.connect().await.unwrap();
        drop(b);
        assert_eq!(a.next_event().await, None);
        assert!(a.send_message(Bytes::from_static(b"x")).await.is_err());
    }
}
