//! Message-framed transport collaborator.
//!
//! A transport delivers whole messages in order, one at a time. The channel
//! drives it through [`Transport`]; completing [`Transport::connect`] is the
//! "open" notification, and inbound traffic, errors and closure arrive as
//! [`TransportEvent`]s.

pub mod memory;

use std::future::Future;

use bytes::Bytes;

use crate::error::Result;

pub use memory::MemoryTransport;

/// Something that happened on the inbound side of a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// One complete message from the peer.
    Message(Bytes),
    /// The transport failed; no further events follow.
    Error(String),
    /// The peer closed the transport.
    Closed,
}

/// A bidirectional, message-preserving transport.
pub trait Transport: Send {
    /// Establish the underlying connection.
    fn connect(&mut self) -> impl Future<Output = Result<()>> + Send;

    /// Send one message. Boundaries are preserved on the peer side.
    fn send_message(&mut self, message: Bytes) -> impl Future<Output = Result<()>> + Send;

    /// Wait for the next inbound event. `None` once the transport is gone.
    fn next_event(&mut self) -> impl Future<Output = Option<TransportEvent>> + Send;

    /// Close the transport. Idempotent.
    fn close(&mut self) -> impl Future<Output = ()> + Send;
}
