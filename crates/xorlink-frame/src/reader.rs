use std::io::{ErrorKind, Read};

use bytes::Bytes;
use tracing::trace;
use xorlink_transport::LinkStream;

use crate::codec::{decode_header, Frame, FrameConfig, HEADER_SIZE, RESERVE_CHUNK};
use crate::error::{FrameError, Result, TruncatedAt};

/// Reads complete frames from any `Read` stream.
///
/// Partial reads are handled internally; callers never see a partial frame.
pub struct FrameReader<T> {
    inner: T,
    config: FrameConfig,
}

impl<T: Read> FrameReader<T> {
    /// Create a new frame reader with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    /// Create a new frame reader with explicit configuration.
    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        Self { inner, config }
    }

    /// Read the next complete frame (blocking).
    ///
    /// - `Ok(Some(frame))`: a whole frame arrived.
    /// - `Ok(None)`: the peer closed the stream before sending any byte of
    ///   the next frame, or right after a header before any payload byte.
    /// - `Err(FrameError::Truncated { .. })`: the stream ended inside a
    ///   header or partway through a payload.
    /// - any other `Err`: I/O failure, oversized length, or allocation
    ///   failure.
    pub fn read_frame(&mut self) -> Result<Option<Frame>> {
        let mut header = [0u8; HEADER_SIZE];
        match read_full(&mut self.inner, &mut header)? {
            Fill::Complete => {}
            Fill::Eof { received: 0 } => {
                trace!("stream closed at frame boundary");
                return Ok(None);
            }
            Fill::Eof { received } => {
                return Err(FrameError::Truncated {
                    stage: TruncatedAt::Header,
                    expected: HEADER_SIZE,
                    received,
                });
            }
        }

        let len = decode_header(header);
        if len > self.config.max_payload_size {
            return Err(FrameError::PayloadTooLarge {
                size: len,
                max: self.config.max_payload_size,
            });
        }
        if len == 0 {
            return Ok(Some(Frame::new(Bytes::new())));
        }

        let payload = match read_payload(&mut self.inner, len)? {
            Payload::Complete(payload) => payload,
            Payload::Eof { received: 0 } => {
                trace!(len, "stream closed after header");
                return Ok(None);
            }
            Payload::Eof { received } => {
                return Err(FrameError::Truncated {
                    stage: TruncatedAt::Payload,
                    expected: len,
                    received,
                });
            }
        };

        trace!(len, "frame received");
        Ok(Some(Frame::new(payload)))
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the reader and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Update maximum payload size for subsequent frame decoding.
    pub fn set_max_payload_size(&mut self, max_payload_size: usize) {
        self.config.max_payload_size = max_payload_size;
    }

    /// Current frame reader configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }
}

impl FrameReader<LinkStream> {
    /// Create a frame reader for `LinkStream` and apply read timeout from config.
    pub fn with_config_link(inner: LinkStream, config: FrameConfig) -> Result<Self> {
        inner
            .set_read_timeout(config.read_timeout)
            .map_err(transport_to_frame_error)?;
        Ok(Self::with_config(inner, config))
    }
}

/// Read one frame from `reader` with the default configuration.
pub fn read_frame<R: Read + ?Sized>(reader: &mut R) -> Result<Option<Frame>> {
    FrameReader::new(reader).read_frame()
}

enum Payload {
    Complete(Vec<u8>),
    Eof { received: usize },
}

/// Read a `len`-byte payload, growing the buffer only as bytes arrive.
///
/// The declared length comes from the peer, so at most one
/// [`RESERVE_CHUNK`] is committed ahead of received data.
fn read_payload<R: Read>(inner: &mut R, len: usize) -> Result<Payload> {
    let mut payload = Vec::new();
    while payload.len() < len {
        let start = payload.len();
        let step = (len - start).min(RESERVE_CHUNK);
        payload
            .try_reserve(step)
            .map_err(|_| FrameError::Alloc { size: len })?;
        payload.resize(start + step, 0);

        if let Fill::Eof { received } = read_full(inner, &mut payload[start..])? {
            return Ok(Payload::Eof {
                received: start + received,
            });
        }
    }
    Ok(Payload::Complete(payload))
}

enum Fill {
    Complete,
    Eof { received: usize },
}

/// Complete-read: fill `buf` entirely, retrying interrupted reads.
///
/// Returns how many bytes arrived if the stream ends first. Any other error
/// aborts immediately and the partial contents of `buf` are meaningless.
fn read_full<R: Read>(inner: &mut R, buf: &mut [u8]) -> std::io::Result<Fill> {
    let mut filled = 0usize;
    while filled < buf.len() {
        match inner.read(&mut buf[filled..]) {
            Ok(0) => return Ok(Fill::Eof { received: filled }),
            Ok(n) => filled += n,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => return Err(err),
        }
    }
    Ok(Fill::Complete)
}

pub(crate) fn transport_to_frame_error(err: xorlink_transport::TransportError) -> FrameError {
    match err {
        xorlink_transport::TransportError::Io(io)
        | xorlink_transport::TransportError::Accept(io) => FrameError::Io(io),
        xorlink_transport::TransportError::Bind { source, .. }
        | xorlink_transport::TransportError::Connect { source, .. } => FrameError::Io(source),
        other => FrameError::Io(std::io::Error::other(other.to_string())),
    }
}
