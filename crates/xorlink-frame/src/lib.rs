//! Length-prefixed message framing over byte streams.
//!
//! Every message on the wire is a 4-byte big-endian payload length followed
//! by exactly that many payload bytes. A zero length is a valid, empty frame.
//!
//! Readers distinguish three outcomes: a complete frame, a clean disconnect
//! at a frame boundary (`Ok(None)`), and an error. A stream that ends partway
//! through a header or payload is [`FrameError::Truncated`], never a clean
//! disconnect.

pub mod codec;
pub mod error;
pub mod reader;
pub mod writer;

#[cfg(feature = "async")]
pub mod async_codec;

#[cfg(feature = "async")]
pub use async_codec::FrameCodec;
pub use codec::{
    decode_frame, decode_header, encode_frame, encode_header, Frame, FrameConfig,
    DEFAULT_MAX_PAYLOAD, HEADER_SIZE,
};
pub use error::{FrameError, Result, TruncatedAt};
pub use reader::{read_frame, FrameReader};
pub use writer::{write_frame, FrameWriter};
