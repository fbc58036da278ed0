use std::time::Duration;

use serialport::{ClearBuffer, DataBits, FlowControl, Parity, SerialPort, SerialPortType, StopBits};
use tracing::{debug, info};

use crate::error::{Result, TransportError};
use crate::traits::{StreamSink, StreamSource};

/// Receiving half of an open serial device.
pub type SerialSource = StreamSource<Box<dyn SerialPort>>;

/// Sending half of an open serial device.
pub type SerialSink = StreamSink<Box<dyn SerialPort>>;

/// Settings used to open a serial (or USB CDC) device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerialConfig {
    /// Device path, e.g. `/dev/ttyACM0` or `COM3`.
    pub path: String,
    pub baud_rate: u32,
    /// Read timeout of the device; bounds how long one poll blocks.
    pub poll_timeout: Duration,
}

impl SerialConfig {
    /// Default baud rate for FlowSerial links.
    pub const DEFAULT_BAUD_RATE: u32 = 115_200;
    /// Default device read timeout.
    pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_millis(50);

    pub fn new(path: impl Into<String>, baud_rate: u32) -> Self {
        Self {
            path: path.into(),
            baud_rate,
            poll_timeout: Self::DEFAULT_POLL_TIMEOUT,
        }
    }
}

/// Open a serial device in raw 8N1 mode without flow control.
///
/// Returns independent receive and send halves so the receive loop can block
/// on one thread while other threads transmit.
pub fn open(config: &SerialConfig) -> Result<(SerialSource, SerialSink)> {
    let port = serialport::new(config.path.as_str(), config.baud_rate)
        .data_bits(DataBits::Eight)
        .parity(Parity::None)
        .stop_bits(StopBits::One)
        .flow_control(FlowControl::None)
        .timeout(config.poll_timeout)
        .open()
        .map_err(|e| TransportError::Open {
            path: config.path.clone(),
            source: e.into(),
        })?;

    // Bytes queued before we opened belong to nobody.
    port.clear(ClearBuffer::All)?;
    let reader = port.try_clone()?;

    info!(path = %config.path, baud = config.baud_rate, "opened serial device");
    Ok((StreamSource::new(reader), StreamSink::new(port)))
}

/// Summary of a serial device found on the system.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortSummary {
    pub name: String,
    pub kind: &'static str,
    pub vid: Option<u16>,
    pub pid: Option<u16>,
    pub product: Option<String>,
}

/// Enumerate serial devices.
pub fn available_ports() -> Result<Vec<PortSummary>> {
    let ports = serialport::available_ports()?;
    debug!(count = ports.len(), "enumerated serial ports");
    Ok(ports
        .into_iter()
        .map(|port| match port.port_type {
            SerialPortType::UsbPort(usb) => PortSummary {
                name: port.port_name,
                kind: "usb",
                vid: Some(usb.vid),
                pid: Some(usb.pid),
                product: usb.product,
            },
            other => PortSummary {
                name: port.port_name,
                kind: port_kind(&other),
                vid: None,
                pid: None,
                product: None,
            },
        })
        .collect())
}

fn port_kind(port_type: &SerialPortType) -> &'static str {
    match port_type {
        SerialPortType::UsbPort(_) => "usb",
        SerialPortType::PciPort => "pci",
        SerialPortType::BluetoothPort => "bluetooth",
        SerialPortType::Unknown => "unknown",
    }
}
