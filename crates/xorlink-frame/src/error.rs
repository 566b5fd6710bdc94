use std::fmt;

/// Which part of a frame the stream ended in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TruncatedAt {
    Header,
    Payload,
}

impl fmt::Display for TruncatedAt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TruncatedAt::Header => f.write_str("header"),
            TruncatedAt::Payload => f.write_str("payload"),
        }
    }
}

/// Errors that can occur during frame encoding/decoding.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The payload exceeds the configured maximum size.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// The stream ended after part of a frame had been received.
    #[error("connection closed mid-{stage} ({received} of {expected} bytes)")]
    Truncated {
        stage: TruncatedAt,
        expected: usize,
        received: usize,
    },

    /// The payload buffer could not be allocated.
    #[error("failed to allocate {size} byte frame buffer")]
    Alloc { size: usize },

    /// An I/O error occurred while reading or writing frames.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The connection stopped accepting bytes before the frame was sent.
    #[error("connection closed (incomplete frame written)")]
    ConnectionClosed,
}

impl FrameError {
    /// True for a peer that went away mid-frame, on either side.
    pub fn is_truncation(&self) -> bool {
        matches!(
            self,
            FrameError::Truncated { .. } | FrameError::ConnectionClosed
        )
    }
}

pub type Result<T> = std::result::Result<T, FrameError>;
