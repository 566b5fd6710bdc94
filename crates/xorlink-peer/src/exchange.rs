//! The message/acknowledgement exchange.
//!
//! An initiator sends one message per frame and waits for a single
//! acknowledgement frame before sending the next. A responder answers every
//! non-empty message with `ACK: Received <n> bytes`, where `<n>` is the
//! decoded message length, and silently skips empty frames.

use std::io::{BufRead, Read, Write};

use tracing::{debug, info, warn};

use crate::error::{PeerError, Result};
use crate::peer::Peer;

/// Acknowledgement text for a message of `received` bytes.
pub fn ack_text(received: usize) -> String {
    format!("ACK: Received {received} bytes")
}

/// An acknowledgement as seen by the initiator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ack {
    /// Decoded acknowledgement, lossily converted to UTF-8.
    pub text: String,
    /// Decoded acknowledgement length in bytes.
    pub size: usize,
}

/// How a responder session ended.
#[derive(Debug)]
pub enum SessionEnd {
    /// Remote side closed at a frame boundary.
    Disconnected,
    /// A receive or send failed; the connection was abandoned.
    Failed(PeerError),
}

/// Totals for one responder session.
#[derive(Debug)]
pub struct SessionSummary {
    /// Messages acknowledged.
    pub messages: u64,
    /// Decoded bytes acknowledged.
    pub bytes: u64,
    pub end: SessionEnd,
}

impl SessionSummary {
    pub fn is_clean(&self) -> bool {
        matches!(self.end, SessionEnd::Disconnected)
    }
}

/// Hooks for presenting an interactive exchange.
pub trait InitiatorEvents {
    /// Called before each line is read.
    fn prompt(&mut self) {}

    /// Called after a line has been acknowledged.
    fn acknowledged(&mut self, _message: &str, _ack: &Ack) {}
}

impl InitiatorEvents for () {}

/// Hooks for presenting a responder session.
pub trait ResponderEvents {
    /// Called with each decoded, non-empty message.
    fn received(&mut self, _peer_id: &str, _message: &[u8]) {}

    /// Called after an acknowledgement has been sent.
    fn acknowledged(&mut self, _peer_id: &str, _ack: &str) {}
}

impl ResponderEvents for () {}

/// Send `message` and wait for the acknowledgement.
///
/// A clean disconnect before the acknowledgement arrives is
/// [`PeerError::Disconnected`].
pub fn exchange<R: Read, W: Write>(peer: &mut Peer<R, W>, message: &[u8]) -> Result<Ack> {
    peer.send_message(message)?;

    let reply = peer.recv_message()?.ok_or_else(|| {
        PeerError::Disconnected(format!("{} closed before acknowledging", peer.id()))
    })?;

    let ack = Ack {
        size: reply.len(),
        text: String::from_utf8_lossy(&reply).into_owned(),
    };
    debug!(peer = peer.id(), sent = message.len(), ack = %ack.text, "exchange complete");
    Ok(ack)
}

/// Exchange each line of `input` until end of input or an empty line.
///
/// Trailing `\r` and `\n` are stripped before sending. Returns the number of
/// completed exchanges. Any exchange failure stops the loop and is returned.
pub fn exchange_lines<R, W, B, E>(
    peer: &mut Peer<R, W>,
    mut input: B,
    events: &mut E,
) -> Result<u64>
where
    R: Read,
    W: Write,
    B: BufRead,
    E: InitiatorEvents,
{
    let mut completed = 0;
    let mut line = String::new();

    loop {
        events.prompt();
        line.clear();
        if input.read_line(&mut line).map_err(PeerError::Input)? == 0 {
            break;
        }

        let message = line.trim_end_matches(['\r', '\n']);
        if message.is_empty() {
            break;
        }

        let ack = exchange(peer, message.as_bytes())?;
        events.acknowledged(message, &ack);
        completed += 1;
    }

    debug!(peer = peer.id(), completed, "interactive exchange finished");
    Ok(completed)
}

/// Acknowledge messages from `peer` until it disconnects or fails.
///
/// Never panics and never propagates: the outcome is in the returned
/// summary so that one connection cannot take down its listener.
pub fn respond<R, W, E>(peer: &mut Peer<R, W>, events: &mut E) -> SessionSummary
where
    R: Read,
    W: Write,
    E: ResponderEvents,
{
    let mut messages = 0u64;
    let mut bytes = 0u64;

    let end = loop {
        let message = match peer.recv_message() {
            Ok(Some(message)) => message,
            Ok(None) => {
                info!(peer = peer.id(), messages, "peer disconnected");
                break SessionEnd::Disconnected;
            }
            Err(err) => {
                warn!(peer = peer.id(), error = %err, "receive failed; closing connection");
                break SessionEnd::Failed(err);
            }
        };

        if message.is_empty() {
            debug!(peer = peer.id(), "empty frame skipped");
            continue;
        }

        events.received(peer.id(), &message);

        let ack = ack_text(message.len());
        if let Err(err) = peer.send_message(ack.as_bytes()) {
            warn!(peer = peer.id(), error = %err, "acknowledgement failed; closing connection");
            break SessionEnd::Failed(err);
        }
        events.acknowledged(peer.id(), &ack);

        messages += 1;
        bytes += message.len() as u64;
    };

    SessionSummary {
        messages,
        bytes,
        end,
    }
}

#[cfg(all(test, unix))]
mod tests {
    use std::io::{Cursor, Read, Write};
    use std::os::unix::net::UnixStream;
    use std::thread;

    use xorlink_frame::{read_frame, write_frame, FrameError, FrameReader, FrameWriter, TruncatedAt};
    use xorlink_transform::Key;

    use super::*;

    /// Moves at most one byte per call in either direction.
    struct OneByte<T>(T);

    impl<T: Read> Read for OneByte<T> {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            let len = buf.len().min(1);
            self.0.read(&mut buf[..len])
        }
    }

    impl<T: Write> Write for OneByte<T> {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            let len = buf.len().min(1);
            self.0.write(&buf[..len])
        }

        fn flush(&mut self) -> std::io::Result<()> {
            self.0.flush()
        }
    }

    fn socket_peer(id: &str, stream: UnixStream) -> Peer<UnixStream, UnixStream> {
        let read_half = stream.try_clone().unwrap();
        Peer::from_parts(
            id,
            FrameReader::new(read_half),
            FrameWriter::new(stream),
            Key::default(),
        )
    }

    fn encoded(messages: &[&[u8]]) -> Vec<u8> {
        let key = Key::default();
        let mut wire = Vec::new();
        for message in messages {
            let mut payload = message.to_vec();
            key.apply(&mut payload).unwrap();
            write_frame(&mut wire, &payload).unwrap();
        }
        wire
    }

    fn decoded(mut wire: &[u8]) -> Vec<String> {
        let key = Key::default();
        let mut out = Vec::new();
        while let Some(frame) = read_frame(&mut wire).unwrap() {
            let mut payload = frame.into_vec();
            key.apply(&mut payload).unwrap();
            out.push(String::from_utf8(payload).unwrap());
        }
        out
    }

    fn scripted(input: Vec<u8>) -> Peer<Cursor<Vec<u8>>, Vec<u8>> {
        Peer::from_parts(
            "scripted",
            FrameReader::new(Cursor::new(input)),
            FrameWriter::new(Vec::new()),
            Key::default(),
        )
    }

    #[derive(Default)]
    struct Recorder {
        received: Vec<Vec<u8>>,
        acks: Vec<String>,
        prompts: usize,
        acknowledged: Vec<(String, Ack)>,
    }

    impl ResponderEvents for Recorder {
        fn received(&mut self, _peer_id: &str, message: &[u8]) {
            self.received.push(message.to_vec());
        }

        fn acknowledged(&mut self, _peer_id: &str, ack: &str) {
            self.acks.push(ack.to_string());
        }
    }

    impl InitiatorEvents for Recorder {
        fn prompt(&mut self) {
            self.prompts += 1;
        }

        fn acknowledged(&mut self, message: &str, ack: &Ack) {
            self.acknowledged.push((message.to_string(), ack.clone()));
        }
    }

    #[test]
    fn ack_text_format() {
        assert_eq!(ack_text(5), "ACK: Received 5 bytes");
        assert_eq!(ack_text(0), "ACK: Received 0 bytes");
        assert_eq!(ack_text(1), "ACK: Received 1 bytes");
    }

    #[test]
    fn hello_is_acknowledged_end_to_end() {
        let (left, right) = UnixStream::pair().unwrap();

        let responder = thread::spawn(move || {
            let mut peer = socket_peer("responder", right);
            peer.respond(&mut ())
        });

        let mut initiator = socket_peer("initiator", left);
        let ack = initiator.exchange(b"hello").unwrap();
        assert_eq!(ack.text, "ACK: Received 5 bytes");
        assert_eq!(ack.size, 21);
        drop(initiator);

        let summary = responder.join().unwrap();
        assert!(summary.is_clean());
        assert_eq!(summary.messages, 1);
        assert_eq!(summary.bytes, 5);
    }

    #[test]
    fn responder_writes_encoded_ack_frame() {
        let mut peer = scripted(encoded(&[b"hello"]));
        let mut events = Recorder::default();
        let summary = respond(&mut peer, &mut events);

        assert!(summary.is_clean());
        assert_eq!(events.received, vec![b"hello".to_vec()]);
        assert_eq!(events.acks, vec!["ACK: Received 5 bytes"]);

        let expected = encoded(&[b"ACK: Received 5 bytes"]);
        assert_eq!(peer.writer_output(), expected.as_slice());
    }

    #[test]
    fn responder_skips_empty_frames() {
        let mut peer = scripted(encoded(&[b"", b"hi", b""]));
        let summary = respond(&mut peer, &mut ());

        assert!(summary.is_clean());
        assert_eq!(summary.messages, 1);
        assert_eq!(decoded(peer.writer_output()), vec!["ACK: Received 2 bytes"]);
    }

    #[test]
    fn responder_counts_multiple_messages() {
        let mut peer = scripted(encoded(&[b"a", b"bb", b"ccc"]));
        let summary = respond(&mut peer, &mut ());

        assert_eq!(summary.messages, 3);
        assert_eq!(summary.bytes, 6);
        assert_eq!(
            decoded(peer.writer_output()),
            vec![
                "ACK: Received 1 bytes",
                "ACK: Received 2 bytes",
                "ACK: Received 3 bytes",
            ]
        );
    }

    #[test]
    fn responder_reports_truncation_as_failure() {
        let mut input = encoded(&[b"ok"]);
        input.extend_from_slice(&[0, 0, 0, 8, 1, 2, 3]);

        let mut peer = scripted(input);
        let summary = respond(&mut peer, &mut ());

        assert_eq!(summary.messages, 1);
        match summary.end {
            SessionEnd::Failed(PeerError::Frame(FrameError::Truncated {
                stage: TruncatedAt::Payload,
                expected: 8,
                received: 3,
            })) => {}
            other => panic!("expected truncated payload, got {other:?}"),
        }
    }

    #[test]
    fn responder_eof_after_header_is_disconnect() {
        let mut peer = scripted(vec![0, 0, 0, 5]);
        let summary = respond(&mut peer, &mut ());
        assert!(summary.is_clean());
        assert_eq!(summary.messages, 0);
        assert!(peer.writer_output().is_empty());
    }

    #[test]
    fn responder_with_no_input_disconnects_cleanly() {
        let mut peer = scripted(Vec::new());
        let summary = respond(&mut peer, &mut ());
        assert!(summary.is_clean());
        assert!(peer.writer_output().is_empty());
    }

    #[test]
    fn exchange_without_ack_is_disconnect() {
        let mut peer = scripted(Vec::new());
        let err = exchange(&mut peer, b"hello").unwrap_err();
        assert!(err.is_disconnect());
        assert_eq!(decoded(peer.writer_output()), vec!["hello"]);
    }

    #[test]
    fn exchange_with_truncated_ack_is_error() {
        let mut peer = scripted(vec![0, 0, 0, 21, 0x0c]);
        let err = exchange(&mut peer, b"hello").unwrap_err();
        assert!(matches!(
            err,
            PeerError::Frame(FrameError::Truncated { .. })
        ));
    }

    #[test]
    fn exchange_decodes_non_utf8_ack_lossily() {
        let mut payload = vec![b'o', b'k', 0xff];
        Key::default().apply(&mut payload).unwrap();
        let mut wire = Vec::new();
        write_frame(&mut wire, &payload).unwrap();

        let mut peer = scripted(wire);
        let ack = exchange(&mut peer, b"x").unwrap();
        assert_eq!(ack.size, 3);
        assert_eq!(ack.text, "ok\u{fffd}");
    }

    #[test]
    fn exchange_over_one_byte_streams() {
        let (left, right) = UnixStream::pair().unwrap();

        let responder = thread::spawn(move || {
            let read_half = right.try_clone().unwrap();
            let mut peer = Peer::from_parts(
                "responder",
                FrameReader::new(OneByte(read_half)),
                FrameWriter::new(OneByte(right)),
                Key::default(),
            );
            peer.respond(&mut ())
        });

        let read_half = left.try_clone().unwrap();
        let mut initiator = Peer::from_parts(
            "initiator",
            FrameReader::new(OneByte(read_half)),
            FrameWriter::new(OneByte(left)),
            Key::default(),
        );

        let message = vec![b'z'; 1000];
        let ack = initiator.exchange(&message).unwrap();
        assert_eq!(ack.text, "ACK: Received 1000 bytes");
        drop(initiator);

        assert!(responder.join().unwrap().is_clean());
    }

    #[test]
    fn exchange_lines_strips_and_stops_on_empty_line() {
        let (left, right) = UnixStream::pair().unwrap();

        let responder = thread::spawn(move || {
            let mut peer = socket_peer("responder", right);
            let mut events = Recorder::default();
            let summary = peer.respond(&mut events);
            (summary, events.received)
        });

        let mut initiator = socket_peer("initiator", left);
        let mut events = Recorder::default();
        let input = Cursor::new(b"one\r\ntwo\n\nthree\n".to_vec());
        let completed = exchange_lines(&mut initiator, input, &mut events).unwrap();
        drop(initiator);

        assert_eq!(completed, 2);
        assert_eq!(events.prompts, 3);
        assert_eq!(events.acknowledged[0].0, "one");
        assert_eq!(events.acknowledged[0].1.text, "ACK: Received 3 bytes");
        assert_eq!(events.acknowledged[1].0, "two");

        let (summary, received) = responder.join().unwrap();
        assert!(summary.is_clean());
        assert_eq!(received, vec![b"one".to_vec(), b"two".to_vec()]);
    }

    #[test]
    fn exchange_lines_ends_at_eof_without_newline() {
        let (left, right) = UnixStream::pair().unwrap();

        let responder = thread::spawn(move || socket_peer("responder", right).respond(&mut ()));

        let mut initiator = socket_peer("initiator", left);
        let completed =
            exchange_lines(&mut initiator, Cursor::new(b"last".to_vec()), &mut ()).unwrap();
        drop(initiator);

        assert_eq!(completed, 1);
        assert_eq!(responder.join().unwrap().messages, 1);
    }

    #[test]
    fn exchange_lines_stops_on_failure() {
        let mut peer = scripted(Vec::new());
        let input = Cursor::new(b"first\nsecond\n".to_vec());
        let err = exchange_lines(&mut peer, input, &mut ()).unwrap_err();
        assert!(err.is_disconnect());
        assert_eq!(decoded(peer.writer_output()), vec!["first"]);
    }

    impl Peer<Cursor<Vec<u8>>, Vec<u8>> {
        fn writer_output(&self) -> &[u8] {
            self.get_writer()
        }
    }
}
