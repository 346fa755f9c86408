// Handshake module declarations

pub mod messages;
pub mod protocol;
pub mod state;

pub use messages::{build_handshake, parse_handshake, HandshakeMessage, SALT_LEN};
pub use protocol::Handshake;
pub use state::HandshakeState;
