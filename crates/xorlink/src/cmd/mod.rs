use std::net::IpAddr;
use std::time::Duration;

use clap::{Args, Subcommand};
use xorlink_peer::Key;

use crate::exit::{transform_error, CliError, CliResult};
use crate::output::OutputFormat;

pub mod send;
pub mod serve;
pub mod version;

/// Port used by `serve` when none is given.
pub const DEFAULT_PORT: u16 = 5000;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Accept clients and acknowledge every message they send.
    Serve(ServeArgs),
    /// Connect to a server and send one message, or lines from stdin.
    Send(SendArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Serve(args) => serve::run(args, format),
        Command::Send(args) => send::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct KeyArgs {
    /// Shared obfuscation key. Both sides must use the same one.
    #[arg(long, env = "XORLINK_KEY", hide_env_values = true)]
    pub key: Option<String>,
}

impl KeyArgs {
    pub fn resolve(&self) -> CliResult<Key> {
        match &self.key {
            None => Ok(Key::default()),
            Some(key) => Key::try_from(key.as_str()).map_err(|err| transform_error("--key", err)),
        }
    }
}

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Port to listen on (0 picks a free port).
    #[arg(default_value_t = DEFAULT_PORT, env = "XORLINK_PORT")]
    pub port: u16,
    /// Address to bind.
    #[arg(long, default_value = "0.0.0.0", env = "XORLINK_BIND")]
    pub bind: IpAddr,
    #[command(flatten)]
    pub key: KeyArgs,
    /// Drop connections that send nothing for this long (e.g. 30s, 500ms).
    #[arg(long, value_name = "DURATION")]
    pub read_timeout: Option<String>,
}

#[derive(Args, Debug)]
pub struct SendArgs {
    /// Server host name or address.
    pub host: String,
    /// Server port.
    #[arg(value_parser = clap::value_parser!(u16).range(1..))]
    pub port: u16,
    /// Message to send. Reads lines from stdin when omitted.
    pub message: Option<String>,
    #[command(flatten)]
    pub key: KeyArgs,
    /// Give up on a send or acknowledgement after this long (e.g. 5s, 500ms).
    #[arg(long, value_name = "DURATION")]
    pub timeout: Option<String>,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

/// Parse `500ms`, `5s` or bare seconds.
pub fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::usage("duration must not be empty"));
    }

    let (number, millis) = if let Some(num) = input.strip_suffix("ms") {
        (num, true)
    } else if let Some(num) = input.strip_suffix('s') {
        (num, false)
    } else {
        (input, false)
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::usage(format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::usage("duration must be greater than zero"));
    }

    Ok(if millis {
        Duration::from_millis(value)
    } else {
        Duration::from_secs(value)
    })
}

/// Parse an optional duration argument.
pub fn parse_optional_duration(input: Option<&str>) -> CliResult<Option<Duration>> {
    input.map(parse_duration).transpose()
}
