//! Minimal acknowledgement server: accepts clients on their own threads and
//! answers every message until the process is killed.
//!
//! Run with:
//!   cargo run --example ack-server
//!
//! In another terminal:
//!   cargo run --features cli -- send 127.0.0.1 5000 hello

use xorlink::peer::{Key, PeerListener, ResponderEvents};

struct Print;

impl ResponderEvents for Print {
    fn received(&mut self, peer_id: &str, message: &[u8]) {
        eprintln!(
            "[{peer_id}] {} bytes: {}",
            message.len(),
            String::from_utf8_lossy(message)
        );
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let listener = PeerListener::bind("127.0.0.1:5000", Key::default())?;
    eprintln!("Listening on {}", listener.local_addr());

    listener.serve(|mut peer| {
        eprintln!("Peer connected: {}", peer.id());
        let summary = peer.respond(&mut Print);
        eprintln!(
            "Peer {} gone after {} messages (clean: {})",
            peer.id(),
            summary.messages,
            summary.is_clean()
        );
    })?;

    Ok(())
}
