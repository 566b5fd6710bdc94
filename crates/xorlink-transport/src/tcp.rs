use std::fmt::Display;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, TcpListener, TcpStream, ToSocketAddrs};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use crate::error::{Result, TransportError};
use crate::stream::LinkStream;

const WAKE_CONNECT_TIMEOUT: Duration = Duration::from_millis(250);

/// TCP transport.
///
/// Provides bind/accept/connect over TCP. Accept and connect are blocking;
/// callers that need concurrency hand accepted streams to their own threads.
pub struct TcpTransport {
    listener: TcpListener,
    local_addr: SocketAddr,
}

impl TcpTransport {
    /// Bind and listen on `addr`.
    ///
    /// Port `0` asks the OS for an ephemeral port; use [`local_addr`] to
    /// find out which one was assigned.
    ///
    /// [`local_addr`]: TcpTransport::local_addr
    pub fn bind<A: ToSocketAddrs + Display>(addr: A) -> Result<Self> {
        let listener = TcpListener::bind(&addr).map_err(|e| TransportError::Bind {
            addr: addr.to_string(),
            source: e,
        })?;
        let local_addr = listener.local_addr().map_err(|e| TransportError::Bind {
            addr: addr.to_string(),
            source: e,
        })?;

        info!(%local_addr, "listening on tcp");

        Ok(Self {
            listener,
            local_addr,
        })
    }

    /// Accept an incoming connection (blocking).
    pub fn accept(&self) -> Result<(LinkStream, SocketAddr)> {
        let (stream, addr) = self.listener.accept().map_err(TransportError::Accept)?;
        debug!(peer = %addr, "accepted connection");
        Ok((LinkStream::from_tcp(stream), addr))
    }

    /// Connect to a listening peer (blocking).
    pub fn connect<A: ToSocketAddrs + Display>(addr: A) -> Result<LinkStream> {
        let stream = TcpStream::connect(&addr).map_err(|e| TransportError::Connect {
            addr: addr.to_string(),
            source: e,
        })?;
        debug!(%addr, "connected over tcp");
        Ok(LinkStream::from_tcp(stream))
    }

    /// The address this listener is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// A handle that can close this listener from another thread.
    pub fn closer(&self) -> Result<ListenerCloser> {
        let listener = self.listener.try_clone()?;
        Ok(ListenerCloser {
            listener: Arc::new(listener),
            wake_addr: wake_addr(self.local_addr),
        })
    }
}

/// Closes a [`TcpTransport`] from outside the thread blocked in `accept`.
///
/// Shutting the listening socket down makes a blocked `accept` fail on
/// Linux. Other platforms ignore shutdown on listening sockets, so `close`
/// also makes one throwaway connection to wake the acceptor.
#[derive(Clone)]
pub struct ListenerCloser {
    listener: Arc<TcpListener>,
    wake_addr: SocketAddr,
}

impl ListenerCloser {
    /// Close the listener. Safe to call more than once.
    pub fn close(&self) {
        #[cfg(unix)]
        if let Err(err) = shutdown_listener(&self.listener) {
            debug!(error = %err, "listener shutdown not supported; relying on wake connection");
        }

        match TcpStream::connect_timeout(&self.wake_addr, WAKE_CONNECT_TIMEOUT) {
            Ok(_) => debug!(addr = %self.wake_addr, "woke acceptor"),
            Err(err) => debug!(addr = %self.wake_addr, error = %err, "wake connection refused"),
        }
    }
}

impl std::fmt::Debug for ListenerCloser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenerCloser")
            .field("wake_addr", &self.wake_addr)
            .finish()
    }
}

#[cfg(unix)]
fn shutdown_listener(listener: &TcpListener) -> std::io::Result<()> {
    use std::os::fd::AsRawFd;

    // SAFETY: the descriptor belongs to `listener`, which stays open for the
    // duration of this call. `shutdown` does not close or invalidate it.
    let rc = unsafe { libc::shutdown(listener.as_raw_fd(), libc::SHUT_RDWR) };
    if rc == 0 {
        Ok(())
    } else {
        Err(std::io::Error::last_os_error())
    }
}

/// Wildcard addresses are not connectable everywhere; use loopback instead.
fn wake_addr(local: SocketAddr) -> SocketAddr {
    let ip = match local.ip() {
        IpAddr::V4(ip) if ip.is_unspecified() => IpAddr::V4(Ipv4Addr::LOCALHOST),
        IpAddr::V6(ip) if ip.is_unspecified() => IpAddr::V6(Ipv6Addr::LOCALHOST),
        ip => ip,
    };
    SocketAddr::new(ip, local.port())
}
