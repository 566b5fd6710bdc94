//! Peer connections and the message/acknowledgement exchange.
//!
//! This is the "just works" layer. An initiator connects and exchanges
//! messages for acknowledgements; a responder accepts connections and runs
//! the acknowledgement loop for each one on its own thread.

pub mod connector;
pub mod error;
pub mod exchange;
pub mod listener;
pub mod peer;
pub mod shutdown;

pub use connector::{connect, connect_with_config};
pub use error::{PeerError, Result};
pub use exchange::{
    ack_text, exchange, exchange_lines, respond, Ack, InitiatorEvents, ResponderEvents,
    SessionEnd, SessionSummary,
};
pub use listener::PeerListener;
pub use peer::{Peer, PeerConfig};
pub use shutdown::ShutdownHandle;
pub use xorlink_transform::{Key, DEFAULT_KEY};
