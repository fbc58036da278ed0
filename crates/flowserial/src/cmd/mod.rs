use std::time::Duration;

use clap::{Args, Subcommand};
use flowserial_transport::SerialConfig;

use crate::exit::{CliError, CliResult, USAGE};
use crate::output::OutputFormat;

pub mod ports;
pub mod read;
pub mod serve;
pub mod version;
pub mod write;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Read bytes from the peer's register.
    Read(ReadArgs),
    /// Write bytes into the peer's register.
    Write(WriteArgs),
    /// Expose a local register and answer the peer until interrupted.
    Serve(ServeArgs),
    /// List serial ports found on this system.
    Ports(PortsArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Read(args) => read::run(args, format),
        Command::Write(args) => write::run(args),
        Command::Serve(args) => serve::run(args, format),
        Command::Ports(args) => ports::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct DeviceArgs {
    /// Serial device, e.g. /dev/ttyACM0 or COM3.
    #[arg(env = "FLOWSERIAL_PORT")]
    pub port: String,
    /// Baud rate.
    #[arg(long, env = "FLOWSERIAL_BAUD", default_value_t = SerialConfig::DEFAULT_BAUD_RATE)]
    pub baud: u32,
}

impl DeviceArgs {
    pub fn serial_config(&self) -> SerialConfig {
        SerialConfig::new(self.port.as_str(), self.baud)
    }
}

#[derive(Args, Debug)]
pub struct ReadArgs {
    #[command(flatten)]
    pub device: DeviceArgs,
    /// Start address in the peer's register (decimal or 0x-prefixed hex).
    #[arg(long, short = 'a', value_parser = parse_address)]
    pub address: u8,
    /// Number of bytes to read.
    #[arg(long, short = 'n', value_parser = clap::value_parser!(u8).range(1..))]
    pub count: u8,
    /// Time to wait for each answer (e.g. 500ms, 2s).
    #[arg(long)]
    pub timeout: Option<String>,
    /// Number of requests sent before giving up.
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    pub attempts: Option<u32>,
}

/// One `--data` value decoded to bytes. Spelled as an alias so clap parses a
/// single hex string instead of collecting repeated values.
pub type HexBytes = Vec<u8>;

#[derive(Args, Debug)]
pub struct WriteArgs {
    #[command(flatten)]
    pub device: DeviceArgs,
    /// Start address in the peer's register (decimal or 0x-prefixed hex).
    #[arg(long, short = 'a', value_parser = parse_address)]
    pub address: u8,
    /// Bytes to write as hex, e.g. "01ff" or "01 ff".
    #[arg(long, short = 'd', value_parser = parse_hex)]
    pub data: HexBytes,
}

#[derive(Args, Debug)]
pub struct ServeArgs {
    #[command(flatten)]
    pub device: DeviceArgs,
    /// Size of the local register in bytes.
    #[arg(long, default_value_t = 256, value_parser = clap::value_parser!(u16).range(1..=256))]
    pub size: u16,
    /// Exit after processing N frames.
    #[arg(long)]
    pub count: Option<usize>,
}

#[derive(Args, Debug, Default)]
pub struct PortsArgs {}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

fn parse_address(input: &str) -> Result<u8, String> {
    let input = input.trim();
    let parsed = match input
        .strip_prefix("0x")
        .or_else(|| input.strip_prefix("0X"))
    {
        Some(hex) => u8::from_str_radix(hex, 16),
        None => input.parse::<u8>(),
    };
    parsed.map_err(|_| format!("address must be 0..=255 (or 0x00..=0xFF), got {input:?}"))
}

fn parse_hex(input: &str) -> Result<HexBytes, String> {
    let digits: String = input
        .chars()
        .filter(|c| !c.is_whitespace() && *c != ':')
        .collect();
    let digits = digits
        .strip_prefix("0x")
        .or_else(|| digits.strip_prefix("0X"))
        .unwrap_or(&digits);

    if digits.is_empty() {
        return Err("data must not be empty".to_string());
    }
    if !digits.is_ascii() {
        return Err(format!("invalid hex data {input:?}"));
    }
    if digits.len() % 2 != 0 {
        return Err(format!("hex data needs an even number of digits, got {}", digits.len()));
    }

    (0..digits.len())
        .step_by(2)
        .map(|i| {
            u8::from_str_radix(&digits[i..i + 2], 16)
                .map_err(|_| format!("invalid hex byte {:?}", &digits[i..i + 2]))
        })
        .collect()
}

pub fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, unit) = if let Some(num) = input.strip_suffix("ms") {
        (num, "ms")
    } else if let Some(num) = input.strip_suffix('s') {
        (num, "s")
    } else {
        (input, "ms")
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    Ok(match unit {
        "s" => Duration::from_secs(value),
        _ => Duration::from_millis(value),
    })
}
