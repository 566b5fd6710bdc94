use std::io::{IsTerminal, Write};
use std::net::SocketAddr;
use std::time::{SystemTime, UNIX_EPOCH};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::{Serialize, Serializer};

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Pretty
        } else {
            Self::Json
        }
    }
}

/// Something worth telling the operator about, one per stdout record.
#[derive(Debug, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Event<'a> {
    Listening {
        addr: SocketAddr,
    },
    Connected {
        peer: &'a str,
        addr: Option<SocketAddr>,
    },
    MessageReceived {
        peer: &'a str,
        size: usize,
        #[serde(serialize_with = "serialize_preview")]
        message: &'a [u8],
    },
    AckSent {
        peer: &'a str,
        ack: &'a str,
    },
    Disconnected {
        peer: &'a str,
        messages: u64,
        bytes: u64,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    AckReceived {
        message: &'a str,
        ack: &'a str,
        size: usize,
    },
    ShuttingDown,
}

#[derive(Serialize)]
struct Record<'a> {
    #[serde(flatten)]
    event: &'a Event<'a>,
    timestamp: String,
}

impl Event<'_> {
    fn name(&self) -> &'static str {
        match self {
            Event::Listening { .. } => "listening",
            Event::Connected { .. } => "connected",
            Event::MessageReceived { .. } => "message_received",
            Event::AckSent { .. } => "ack_sent",
            Event::Disconnected { .. } => "disconnected",
            Event::AckReceived { .. } => "ack_received",
            Event::ShuttingDown => "shutting_down",
        }
    }

    fn peer(&self) -> &str {
        match self {
            Event::Connected { peer, .. }
            | Event::MessageReceived { peer, .. }
            | Event::AckSent { peer, .. }
            | Event::Disconnected { peer, .. } => *peer,
            _ => "-",
        }
    }

    fn detail(&self) -> String {
        match self {
            Event::Listening { addr } => format!("listening on {addr}"),
            Event::Connected { addr: Some(addr), .. } => format!("client connected from {addr}"),
            Event::Connected { addr: None, .. } => "client connected".to_string(),
            Event::MessageReceived { size, message, .. } => {
                format!("received {size} bytes: {}", payload_preview(message))
            }
            Event::AckSent { ack, .. } => format!("sent {ack:?}"),
            Event::Disconnected {
                messages,
                bytes,
                error: None,
                ..
            } => format!("disconnected after {messages} messages ({bytes} bytes)"),
            Event::Disconnected {
                messages,
                error: Some(error),
                ..
            } => format!("connection failed after {messages} messages: {error}"),
            Event::AckReceived { ack, .. } => format!("server: {ack}"),
            Event::ShuttingDown => "shutting down".to_string(),
        }
    }

    /// Bytes written in raw mode; events without a payload print nothing.
    fn raw(&self) -> Option<Vec<u8>> {
        match self {
            Event::MessageReceived { message, .. } => {
                let mut line = message.to_vec();
                line.push(b'\n');
                Some(line)
            }
            Event::AckReceived { ack, .. } => Some(format!("{ack}\n").into_bytes()),
            _ => None,
        }
    }
}

pub fn emit(event: &Event<'_>, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let record = Record {
                event,
                timestamp: now_unix_seconds(),
            };
            println!(
                "{}",
                serde_json::to_string(&record).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["EVENT", "PEER", "DETAIL"])
                .add_row(vec![
                    event.name().to_string(),
                    event.peer().to_string(),
                    event.detail(),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => match event {
            Event::Listening { .. } | Event::ShuttingDown | Event::AckReceived { .. } => {
                println!("{}", event.detail())
            }
            _ => println!("[{}] {}", event.peer(), event.detail()),
        },
        OutputFormat::Raw => {
            if let Some(bytes) = event.raw() {
                print_raw(&bytes);
            }
        }
    }
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout().lock();
    let _ = out.write_all(data);
    let _ = out.flush();
}

fn serialize_preview<S: Serializer>(message: &&[u8], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&payload_preview(message))
}

fn payload_preview(payload: &[u8]) -> String {
    match std::str::from_utf8(payload) {
        Ok(text) => text.to_string(),
        Err(_) => format!("<binary {} bytes>", payload.len()),
    }
}

fn now_unix_seconds() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().to_string())
        .unwrap_or_else(|_| "0".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn to_json(event: &Event<'_>) -> serde_json::Value {
        serde_json::to_value(Record {
            event,
            timestamp: "0".to_string(),
        })
        .unwrap()
    }

    #[test]
    fn events_are_tagged_in_snake_case() {
        let value = to_json(&Event::AckSent {
            peer: "peer-1",
            ack: "ACK: Received 5 bytes",
        });
        assert_eq!(value["event"], "ack_sent");
        assert_eq!(value["peer"], "peer-1");
        assert_eq!(value["ack"], "ACK: Received 5 bytes");
        assert_eq!(value["timestamp"], "0");

        let value = to_json(&Event::ShuttingDown);
        assert_eq!(value["event"], "shutting_down");
    }

    #[test]
    fn listening_reports_address() {
        let addr: SocketAddr = "127.0.0.1:5000".parse().unwrap();
        let value = to_json(&Event::Listening { addr });
        assert_eq!(value["event"], "listening");
        assert_eq!(value["addr"], "127.0.0.1:5000");
    }

    #[test]
    fn binary_messages_are_summarised() {
        let value = to_json(&Event::MessageReceived {
            peer: "peer-2",
            size: 2,
            message: &[0xff, 0xfe],
        });
        assert_eq!(value["message"], "<binary 2 bytes>");
        assert_eq!(value["size"], 2);
    }

    #[test]
    fn clean_disconnect_omits_error() {
        let value = to_json(&Event::Disconnected {
            peer: "peer-1",
            messages: 3,
            bytes: 12,
            error: None,
        });
        assert!(value.get("error").is_none());
        assert_eq!(value["messages"], 3);
    }

    #[test]
    fn event_names_match_tags() {
        let events = [
            Event::ShuttingDown,
            Event::AckReceived {
                message: "hi",
                ack: "ACK: Received 2 bytes",
                size: 21,
            },
        ];
        for event in &events {
            assert_eq!(to_json(event)["event"], event.name());
        }
    }

    #[test]
    fn raw_prints_only_payloads() {
        let ack = Event::AckReceived {
            message: "hi",
            ack: "ACK: Received 2 bytes",
            size: 21,
        };
        assert_eq!(ack.raw().unwrap(), b"ACK: Received 2 bytes\n");
        assert!(Event::ShuttingDown.raw().is_none());
    }
}
