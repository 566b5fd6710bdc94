//! Async client using the `tokio_util` codec: sends each argument as one
//! message and prints the acknowledgements.
//!
//! Run with:
//!   cargo run --example async-client --features async -- 127.0.0.1:5000 hello world

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_util::codec::Framed;
use xorlink::frame::FrameCodec;
use xorlink::transform::Key;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut args = std::env::args().skip(1);
    let addr = args.next().unwrap_or_else(|| "127.0.0.1:5000".to_string());
    let key = Key::default();

    let stream = TcpStream::connect(&addr).await?;
    let mut framed = Framed::new(stream, FrameCodec::new());

    for message in args {
        let mut payload = message.clone().into_bytes();
        key.apply(&mut payload)?;
        framed.send(&payload[..]).await?;

        let Some(frame) = framed.next().await.transpose()? else {
            eprintln!("server closed the connection");
            break;
        };
        let mut ack = frame.into_vec();
        key.apply(&mut ack)?;
        println!("{message} -> {}", String::from_utf8_lossy(&ack));
    }

    Ok(())
}
