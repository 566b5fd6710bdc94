use std::io::{Read, Write};
use std::net::SocketAddr;
use std::time::Duration;

use tracing::trace;
use xorlink_frame::{FrameConfig, FrameReader, FrameWriter, DEFAULT_MAX_PAYLOAD};
use xorlink_transform::Key;
use xorlink_transport::LinkStream;

use crate::error::Result;
use crate::exchange::{self, Ack, ResponderEvents, SessionSummary};

/// Per-connection settings shared by connectors and listeners.
#[derive(Debug, Clone)]
pub struct PeerConfig {
    /// Largest payload accepted or sent on this connection.
    pub max_payload_size: usize,
    /// Read timeout. `None` blocks indefinitely.
    pub read_timeout: Option<Duration>,
    /// Write timeout. `None` blocks indefinitely.
    pub write_timeout: Option<Duration>,
}

impl Default for PeerConfig {
    fn default() -> Self {
        Self {
            max_payload_size: DEFAULT_MAX_PAYLOAD,
            read_timeout: None,
            write_timeout: None,
        }
    }
}

impl PeerConfig {
    pub(crate) fn frame_config(&self) -> FrameConfig {
        FrameConfig {
            max_payload_size: self.max_payload_size,
            read_timeout: self.read_timeout,
            write_timeout: self.write_timeout,
        }
    }
}

/// One end of an established connection.
///
/// Messages are transformed with the peer's [`Key`] before they are framed
/// and after they are read, so callers only ever see plaintext. The
/// connection closes when the peer is dropped.
pub struct Peer<R = LinkStream, W = LinkStream> {
    id: String,
    addr: Option<SocketAddr>,
    reader: FrameReader<R>,
    writer: FrameWriter<W>,
    key: Key,
}

impl Peer<LinkStream, LinkStream> {
    /// Wrap a connected stream, splitting it into a read half and a write half.
    pub fn from_stream(
        id: impl Into<String>,
        stream: LinkStream,
        key: Key,
        config: &PeerConfig,
    ) -> Result<Self> {
        let addr = stream.peer_addr().ok();
        let read_half = stream.try_clone()?;
        let reader = FrameReader::with_config_link(read_half, config.frame_config())?;
        let writer = FrameWriter::with_config_link(stream, config.frame_config())?;

        Ok(Self {
            id: id.into(),
            addr,
            reader,
            writer,
            key,
        })
    }
}

impl<R: Read, W: Write> Peer<R, W> {
    /// Assemble a peer from an existing frame reader and writer.
    pub fn from_parts(
        id: impl Into<String>,
        reader: FrameReader<R>,
        writer: FrameWriter<W>,
        key: Key,
    ) -> Self {
        Self {
            id: id.into(),
            addr: None,
            reader,
            writer,
            key,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Remote address, when the peer sits on a socket.
    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.addr
    }

    /// The underlying write half.
    pub fn get_writer(&self) -> &W {
        self.writer.get_ref()
    }

    /// Transform `message` and send it as one frame.
    pub fn send_message(&mut self, message: &[u8]) -> Result<()> {
        let mut payload = message.to_vec();
        self.key.apply(&mut payload)?;
        self.writer.write_frame(&payload)?;
        trace!(peer = %self.id, size = message.len(), "message sent");
        Ok(())
    }

    /// Receive one frame and undo the transform.
    ///
    /// Returns `Ok(None)` when the remote side closed the connection cleanly
    /// at a frame boundary. Empty frames come back as empty messages.
    pub fn recv_message(&mut self) -> Result<Option<Vec<u8>>> {
        let Some(frame) = self.reader.read_frame()? else {
            return Ok(None);
        };

        let mut message = frame.into_vec();
        if !message.is_empty() {
            self.key.apply(&mut message)?;
        }
        trace!(peer = %self.id, size = message.len(), "message received");
        Ok(Some(message))
    }

    /// Send one message and wait for its acknowledgement.
    pub fn exchange(&mut self, message: &[u8]) -> Result<Ack> {
        exchange::exchange(self, message)
    }

    /// Acknowledge incoming messages until the connection ends.
    pub fn respond<E: ResponderEvents>(&mut self, events: &mut E) -> SessionSummary {
        exchange::respond(self, events)
    }
}

impl<R, W> std::fmt::Debug for Peer<R, W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Peer")
            .field("id", &self.id)
            .field("addr", &self.addr)
            .finish_non_exhaustive()
    }
}
