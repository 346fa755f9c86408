//! TetherStream -- secure channel orchestration for the Tether protocol.
//!
//! Runs the TetherTrust handshake over any message-framed [`Transport`] and
//! then carries application messages as authenticated records:
//! - **SecureChannel**: open / send / receive / close with a cloneable
//!   [`CloseHandle`] for cancellation from other tasks
//! - **MemoryTransport**: an in-process transport pair for tests and demos

pub mod channel;
pub mod config;
pub mod error;
pub mod transport;

// Re-export key public types at crate root.
pub use channel::{ChannelState, CloseHandle, SecureChannel};
pub use config::ChannelConfig;
pub use error::{Result, TetherStreamError};
pub use transport::{MemoryTransport, Transport, TransportEvent};
