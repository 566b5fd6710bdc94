//! TCP transport for xorlink.
//!
//! This is the lowest layer. It owns sockets and nothing else: no framing,
//! no payload handling. Everything above builds on [`LinkStream`] and
//! [`TcpTransport`].

pub mod error;
pub mod stream;
pub mod tcp;

pub use error::{Result, TransportError};
pub use stream::LinkStream;
pub use tcp::{ListenerCloser, TcpTransport};
