/// Errors that can occur in peer operations.
#[derive(Debug, thiserror::Error)]
pub enum PeerError {
    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] xorlink_transport::TransportError),

    /// Frame-level error.
    #[error("frame error: {0}")]
    Frame(#[from] xorlink_frame::FrameError),

    /// Payload transform failed.
    #[error("transform error: {0}")]
    Transform(#[from] xorlink_transform::TransformError),

    /// Peer disconnected cleanly before the exchange completed.
    #[error("peer disconnected: {0}")]
    Disconnected(String),

    /// Reading local input for the interactive exchange failed.
    #[error("input error: {0}")]
    Input(std::io::Error),
}

impl PeerError {
    /// True when the peer closed the connection at a frame boundary.
    pub fn is_disconnect(&self) -> bool {
        matches!(self, PeerError::Disconnected(_))
    }
}

pub type Result<T> = std::result::Result<T, PeerError>;
