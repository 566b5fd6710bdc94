use std::net::SocketAddr;

use tracing::info;
use xorlink_peer::{PeerConfig, PeerListener, ResponderEvents, SessionEnd, ShutdownHandle};

use crate::cmd::{parse_optional_duration, ServeArgs};
use crate::exit::{peer_error, CliError, CliResult, INTERNAL, SUCCESS};
use crate::output::{emit, Event, OutputFormat};

pub fn run(args: ServeArgs, format: OutputFormat) -> CliResult<i32> {
    let key = args.key.resolve()?;
    let read_timeout = parse_optional_duration(args.read_timeout.as_deref())?;

    let addr = SocketAddr::new(args.bind, args.port);
    let listener = PeerListener::bind(addr, key)
        .map_err(|err| peer_error("bind failed", err))?
        .with_peer_config(PeerConfig {
            read_timeout,
            ..PeerConfig::default()
        });

    install_ctrlc_handler(listener.shutdown_handle())?;
    emit(
        &Event::Listening {
            addr: listener.local_addr(),
        },
        format,
    );

    listener
        .serve(move |mut peer| {
            emit(
                &Event::Connected {
                    peer: peer.id(),
                    addr: peer.peer_addr(),
                },
                format,
            );

            let summary = peer.respond(&mut ConnectionEvents { format });
            let error = match &summary.end {
                SessionEnd::Disconnected => None,
                SessionEnd::Failed(err) => Some(err.to_string()),
            };
            emit(
                &Event::Disconnected {
                    peer: peer.id(),
                    messages: summary.messages,
                    bytes: summary.bytes,
                    error,
                },
                format,
            );
        })
        .map_err(|err| peer_error("accept failed", err))?;

    info!("server stopped");
    emit(&Event::ShuttingDown, format);
    Ok(SUCCESS)
}

struct ConnectionEvents {
    format: OutputFormat,
}

impl ResponderEvents for ConnectionEvents {
    fn received(&mut self, peer_id: &str, message: &[u8]) {
        emit(
            &Event::MessageReceived {
                peer: peer_id,
                size: message.len(),
                message,
            },
            self.format,
        );
    }

    fn acknowledged(&mut self, peer_id: &str, ack: &str) {
        emit(&Event::AckSent { peer: peer_id, ack }, self.format);
    }
}

fn install_ctrlc_handler(shutdown: ShutdownHandle) -> CliResult<()> {
    ctrlc::set_handler(move || shutdown.trigger())
        .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}
