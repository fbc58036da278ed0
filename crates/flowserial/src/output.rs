use std::io::{IsTerminal, Write};
use std::time::{SystemTime, UNIX_EPOCH};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use flowserial_transport::PortSummary;
use serde::Serialize;

/// Bytes per row in table and pretty dumps.
const ROW_WIDTH: usize = 16;

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
            Self::Table
        } else {
            Self::Json
        }
    }
}

#[derive(Serialize)]
struct RegisterOutput<'a> {
    event: &'a str,
    address: u8,
    length: usize,
    hex: String,
    bytes: &'a [u8],
    timestamp: String,
}

/// Print a run of register bytes that starts at `address`.
///
/// `event` names what produced them, e.g. `"read"` or `"register"`.
pub fn print_bytes(event: &str, address: u8, data: &[u8], format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out = RegisterOutput {
                event,
                address,
                length: data.len(),
                hex: hex_string(data),
                bytes: data,
                timestamp: now_unix_seconds(),
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["ADDRESS", "BYTES"]);
            for (row, offset) in data.chunks(ROW_WIDTH).zip((0..).step_by(ROW_WIDTH)) {
                table.add_row(vec![
                    format!("0x{:02X}", usize::from(address) + offset),
                    hex_string(row),
                ]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!("{event} address=0x{address:02X} length={}", data.len());
            for (row, offset) in data.chunks(ROW_WIDTH).zip((0..).step_by(ROW_WIDTH)) {
                println!("  {:04X}  {}", usize::from(address) + offset, hex_string(row));
            }
        }
        OutputFormat::Raw => print_raw(data),
    }
}

#[derive(Serialize)]
struct PortOutput<'a> {
    name: &'a str,
    kind: &'a str,
    vid: Option<String>,
    pid: Option<String>,
    product: Option<&'a str>,
}

impl<'a> From<&'a PortSummary> for PortOutput<'a> {
    fn from(port: &'a PortSummary) -> Self {
        Self {
            name: &port.name,
            kind: port.kind,
            vid: port.vid.map(|v| format!("{v:04x}")),
            pid: port.pid.map(|p| format!("{p:04x}")),
            product: port.product.as_deref(),
        }
    }
}

pub fn print_ports(ports: &[PortSummary], format: OutputFormat) {
    let rows: Vec<PortOutput<'_>> = ports.iter().map(PortOutput::from).collect();
    match format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string(&rows).unwrap_or_else(|_| "[]".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["PORT", "KIND", "VID:PID", "PRODUCT"]);
            for row in &rows {
                table.add_row(vec![
                    row.name.to_string(),
                    row.kind.to_string(),
                    usb_id(row),
                    row.product.unwrap_or("").to_string(),
                ]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty | OutputFormat::Raw => {
            for row in &rows {
                println!("{} ({}) {}", row.name, row.kind, usb_id(row));
            }
        }
    }
}

fn usb_id(row: &PortOutput<'_>) -> String {
    match (&row.vid, &row.pid) {
        (Some(vid), Some(pid)) => format!("{vid}:{pid}"),
        _ => String::new(),
    }
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}

pub fn hex_string(data: &[u8]) -> String {
    data.iter()
        .map(|b| format!("{b:02x}"))
        .collect::<Vec<_>>()
        .join(" ")
}

fn now_unix_seconds() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().to_string())
        .unwrap_or_else(|_| "0".to_string())
}
