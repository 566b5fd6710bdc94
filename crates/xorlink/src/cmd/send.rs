use std::io::{IsTerminal, Write};

use xorlink_peer::{connect_with_config, exchange_lines, Ack, InitiatorEvents, PeerConfig};

use crate::cmd::{parse_optional_duration, SendArgs};
use crate::exit::{peer_error, CliError, CliResult, SUCCESS};
use crate::output::{emit, Event, OutputFormat};

const PROMPT: &str = "→ ";

pub fn run(args: SendArgs, format: OutputFormat) -> CliResult<i32> {
    let key = args.key.resolve()?;
    let timeout = parse_optional_duration(args.timeout.as_deref())?;
    if args.message.as_deref() == Some("") {
        return Err(CliError::usage(
            "message must not be empty; empty messages are never acknowledged",
        ));
    }

    let config = PeerConfig {
        read_timeout: timeout,
        write_timeout: timeout,
        ..PeerConfig::default()
    };
    let target = server_address(&args.host, args.port);
    let mut peer = connect_with_config(target.as_str(), key, &config)
        .map_err(|err| peer_error("connect failed", err))?;

    match args.message {
        Some(message) => {
            let ack = peer
                .exchange(message.as_bytes())
                .map_err(|err| peer_error("exchange failed", err))?;
            SendEvents::new(format, false).acknowledged(&message, &ack);
        }
        None => {
            let stdin = std::io::stdin();
            let mut events = SendEvents::new(format, stdin.is_terminal());
            exchange_lines(&mut peer, stdin.lock(), &mut events)
                .map_err(|err| peer_error("exchange failed", err))?;
        }
    }

    Ok(SUCCESS)
}

/// `host:port`, bracketing bare IPv6 literals.
fn server_address(host: &str, port: u16) -> String {
    if host.contains(':') && !host.starts_with('[') {
        format!("[{host}]:{port}")
    } else {
        format!("{host}:{port}")
    }
}

struct SendEvents {
    format: OutputFormat,
    prompt: bool,
}

impl SendEvents {
    fn new(format: OutputFormat, prompt: bool) -> Self {
        Self { format, prompt }
    }
}

impl InitiatorEvents for SendEvents {
    fn prompt(&mut self) {
        if self.prompt {
            let mut err = std::io::stderr().lock();
            let _ = write!(err, "{PROMPT}");
            let _ = err.flush();
        }
    }

    fn acknowledged(&mut self, message: &str, ack: &Ack) {
        emit(
            &Event::AckReceived {
                message,
                ack: &ack.text,
                size: ack.size,
            },
            self.format,
        );
    }
}
