//! Length-prefixed, key-obfuscated message exchange over TCP.
//!
//! Every message travels as a 4-byte big-endian length followed by the
//! payload, XORed with a shared repeating key. A responder answers each
//! non-empty message with `ACK: Received <n> bytes`.
//!
//! The XOR transform is obfuscation only. It offers no confidentiality
//! against anyone who can see the traffic.
//!
//! # Crate Structure
//!
//! - [`transport`]: TCP listener, connector and stream
//! - [`transform`]: repeating-key XOR and the validated [`Key`](transform::Key)
//! - [`frame`]: length-prefixed framing (plus a `tokio_util` codec behind `async`)
//! - [`peer`]: message/acknowledgement exchange and connection lifecycle (behind `peer`)

/// Re-export transport types.
pub mod transport {
    pub use xorlink_transport::*;
}

/// Re-export transform types.
pub mod transform {
    pub use xorlink_transform::*;
}

/// Re-export frame types.
pub mod frame {
    pub use xorlink_frame::*;
}

/// Re-export peer types (requires `peer` feature).
#[cfg(feature = "peer")]
pub mod peer {
    pub use xorlink_peer::*;
}
