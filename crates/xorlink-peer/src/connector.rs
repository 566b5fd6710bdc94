use std::fmt::Display;
use std::net::ToSocketAddrs;

use tracing::info;
use xorlink_transform::Key;
use xorlink_transport::TcpTransport;

use crate::error::Result;
use crate::peer::{Peer, PeerConfig};

/// Connect to a listening peer.
pub fn connect<A: ToSocketAddrs + Display>(addr: A, key: Key) -> Result<Peer> {
    connect_with_config(addr, key, &PeerConfig::default())
}

/// Connect with explicit per-connection settings.
pub fn connect_with_config<A: ToSocketAddrs + Display>(
    addr: A,
    key: Key,
    config: &PeerConfig,
) -> Result<Peer> {
    let stream = TcpTransport::connect(&addr)?;
    let id = match stream.peer_addr() {
        Ok(remote) => remote.to_string(),
        Err(_) => addr.to_string(),
    };

    let peer = Peer::from_stream(id, stream, key, config)?;
    info!(peer = peer.id(), "connected");
    Ok(peer)
}
