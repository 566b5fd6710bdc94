use std::fmt::Display;
use std::io::ErrorKind;
use std::net::{SocketAddr, ToSocketAddrs};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;

use tracing::{debug, info, warn};
use xorlink_transform::Key;
use xorlink_transport::{TcpTransport, TransportError};

use crate::error::{PeerError, Result};
use crate::peer::{Peer, PeerConfig};
use crate::shutdown::ShutdownHandle;

/// Listens for and accepts peer connections.
pub struct PeerListener {
    transport: TcpTransport,
    key: Key,
    peer_config: PeerConfig,
    shutdown: ShutdownHandle,
    next_peer_id: AtomicU64,
}

impl PeerListener {
    /// Bind and listen on `addr`.
    pub fn bind<A: ToSocketAddrs + Display>(addr: A, key: Key) -> Result<Self> {
        let transport = TcpTransport::bind(addr)?;
        let shutdown = ShutdownHandle::new(transport.closer()?);
        Ok(Self {
            transport,
            key,
            peer_config: PeerConfig::default(),
            shutdown,
            next_peer_id: AtomicU64::new(1),
        })
    }

    /// Override per-connection settings for accepted peers.
    pub fn with_peer_config(mut self, config: PeerConfig) -> Self {
        self.peer_config = config;
        self
    }

    /// Bound address, with the real port when bound to port `0`.
    pub fn local_addr(&self) -> SocketAddr {
        self.transport.local_addr()
    }

    /// A handle that stops [`serve`](Self::serve) from another thread.
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.shutdown.clone()
    }

    /// Accept next connection and assign an auto-generated peer id.
    pub fn accept(&self) -> Result<Peer> {
        let id = self.next_id();
        self.accept_with_id(&id)
    }

    /// Accept next connection and use explicit peer id.
    ///
    /// Fails with [`TransportError::Shutdown`] once shutdown has been
    /// triggered, even if a connection raced in.
    pub fn accept_with_id(&self, peer_id: &str) -> Result<Peer> {
        let accepted = self.transport.accept();
        if self.shutdown.is_triggered() {
            return Err(TransportError::Shutdown.into());
        }
        let (stream, addr) = accepted?;
        debug!(peer = peer_id, %addr, "connection accepted");
        Peer::from_stream(peer_id, stream, self.key.clone(), &self.peer_config)
    }

    /// Accept connections until shutdown, running `handler` for each one on
    /// its own thread.
    ///
    /// A failing connection never stops the loop. Returns `Ok(())` after
    /// shutdown and an error only when the listening socket itself fails.
    pub fn serve<F>(&self, handler: F) -> Result<()>
    where
        F: Fn(Peer) + Send + Sync + 'static,
    {
        let handler = Arc::new(handler);

        loop {
            let accepted = self.transport.accept();
            if self.shutdown.is_triggered() {
                info!(addr = %self.local_addr(), "listener stopped");
                return Ok(());
            }

            let (stream, addr) = match accepted {
                Ok(accepted) => accepted,
                Err(TransportError::Accept(err)) if is_transient(err.kind()) => {
                    warn!(error = %err, "accept failed; continuing");
                    continue;
                }
                Err(err) => return Err(PeerError::Transport(err)),
            };

            let id = self.next_id();
            let peer = match Peer::from_stream(id, stream, self.key.clone(), &self.peer_config) {
                Ok(peer) => peer,
                Err(err) => {
                    warn!(%addr, error = %err, "connection setup failed; dropping");
                    continue;
                }
            };
            info!(peer = peer.id(), %addr, "client connected");

            let handler = Arc::clone(&handler);
            let spawned = thread::Builder::new()
                .name(format!("xorlink-{}", peer.id()))
                .spawn(move || handler(peer));
            if let Err(err) = spawned {
                warn!(%addr, error = %err, "could not spawn connection thread; dropping");
            }
        }
    }

    fn next_id(&self) -> String {
        let id = self.next_peer_id.fetch_add(1, Ordering::Relaxed);
        format!("peer-{id}")
    }
}

impl std::fmt::Debug for PeerListener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PeerListener")
            .field("local_addr", &self.local_addr())
            .field("shutdown", &self.shutdown.is_triggered())
            .finish_non_exhaustive()
    }
}

/// Per-connection accept failures that leave the listener usable.
fn is_transient(kind: ErrorKind) -> bool {
    matches!(
        kind,
        ErrorKind::Interrupted
            | ErrorKind::WouldBlock
            | ErrorKind::ConnectionAborted
            | ErrorKind::ConnectionReset
    )
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::net::TcpStream;
    use std::sync::mpsc;
    use std::time::Duration;

    use crate::connector::connect;
    use crate::exchange::SessionSummary;

    use super::*;

    fn serve_in_background(
        listener: PeerListener,
    ) -> (
        thread::JoinHandle<Result<()>>,
        mpsc::Receiver<(String, SessionSummary)>,
    ) {
        let (tx, rx) = mpsc::channel();
        let server = thread::spawn(move || {
            listener.serve(move |mut peer| {
                let summary = peer.respond(&mut ());
                let _ = tx.send((peer.id().to_string(), summary));
            })
        });
        (server, rx)
    }

    #[test]
    fn accept_assigns_sequential_ids() {
        let listener = PeerListener::bind("127.0.0.1:0", Key::default()).unwrap();
        let addr = listener.local_addr();

        let clients = thread::spawn(move || {
            let first = connect(addr, Key::default()).unwrap();
            let second = connect(addr, Key::default()).unwrap();
            (first, second)
        });

        let a = listener.accept().unwrap();
        let b = listener.accept().unwrap();
        assert_eq!(a.id(), "peer-1");
        assert_eq!(b.id(), "peer-2");

        drop(clients.join().unwrap());
    }

    #[test]
    fn accept_after_shutdown_fails() {
        let listener = PeerListener::bind("127.0.0.1:0", Key::default()).unwrap();
        listener.shutdown_handle().trigger();

        let err = listener.accept().unwrap_err();
        assert!(matches!(
            err,
            PeerError::Transport(TransportError::Shutdown)
        ));
    }

    #[test]
    fn serve_acknowledges_clients() {
        let listener = PeerListener::bind("127.0.0.1:0", Key::default()).unwrap();
        let addr = listener.local_addr();
        let shutdown = listener.shutdown_handle();
        let (server, sessions) = serve_in_background(listener);

        let mut client = connect(addr, Key::default()).unwrap();
        let ack = client.exchange(b"hello").unwrap();
        assert_eq!(ack.text, "ACK: Received 5 bytes");

        // Empty messages are skipped without an acknowledgement.
        client.send_message(b"").unwrap();
        let ack = client.exchange(b"hi").unwrap();
        assert_eq!(ack.text, "ACK: Received 2 bytes");
        drop(client);

        let (id, summary) = sessions.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(id, "peer-1");
        assert!(summary.is_clean());
        assert_eq!(summary.messages, 2);
        assert_eq!(summary.bytes, 7);

        shutdown.trigger();
        server.join().unwrap().unwrap();
    }

    #[test]
    fn failing_connection_does_not_affect_others() {
        let listener = PeerListener::bind("127.0.0.1:0", Key::default()).unwrap();
        let addr = listener.local_addr();
        let shutdown = listener.shutdown_handle();
        let (server, sessions) = serve_in_background(listener);

        let mut healthy = connect(addr, Key::default()).unwrap();
        assert_eq!(
            healthy.exchange(b"one").unwrap().text,
            "ACK: Received 3 bytes"
        );

        // Promise 100 bytes, deliver 3, hang up.
        let mut broken = TcpStream::connect(addr).unwrap();
        broken.write_all(&[0, 0, 0, 100, 1, 2, 3]).unwrap();
        drop(broken);

        let (_, summary) = sessions.recv_timeout(Duration::from_secs(5)).unwrap();
        assert!(!summary.is_clean());
        assert_eq!(summary.messages, 0);

        assert_eq!(
            healthy.exchange(b"four").unwrap().text,
            "ACK: Received 4 bytes"
        );
        drop(healthy);

        let (_, summary) = sessions.recv_timeout(Duration::from_secs(5)).unwrap();
        assert!(summary.is_clean());
        assert_eq!(summary.messages, 2);

        shutdown.trigger();
        server.join().unwrap().unwrap();
    }

    #[test]
    fn shutdown_stops_accepting_but_keeps_sessions() {
        let listener = PeerListener::bind("127.0.0.1:0", Key::default()).unwrap();
        let addr = listener.local_addr();
        let shutdown = listener.shutdown_handle();
        let (server, sessions) = serve_in_background(listener);

        let mut client = connect(addr, Key::default()).unwrap();
        client.exchange(b"before").unwrap();

        shutdown.trigger();
        shutdown.trigger();
        assert!(shutdown.is_triggered());
        server.join().unwrap().unwrap();

        let ack = client.exchange(b"after").unwrap();
        assert_eq!(ack.text, "ACK: Received 5 bytes");
        drop(client);

        let (id, summary) = sessions.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(id, "peer-1");
        assert_eq!(summary.messages, 2);
    }

    #[test]
    fn transient_accept_errors() {
        assert!(is_transient(ErrorKind::Interrupted));
        assert!(is_transient(ErrorKind::ConnectionAborted));
        assert!(!is_transient(ErrorKind::PermissionDenied));
    }
}
