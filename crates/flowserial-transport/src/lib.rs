//! Byte transport capabilities for FlowSerial.
//!
//! The protocol engine never touches a device directly. It is handed two
//! narrow capabilities:
//! - [`ByteSink`]: deliver raw outgoing bytes to the transport
//! - [`ByteSource`]: produce raw incoming bytes for the engine
//!
//! Provided implementations:
//! - serial / USB CDC devices via the `serialport` crate (feature `serial`)
//! - an in-memory duplex link for wiring two engines together in one process
//! - generic adapters over any `Read` / `Write` stream

pub mod error;
pub mod memory;
pub mod traits;

#[cfg(feature = "serial")]
pub mod serial;

pub use error::{Result, TransportError};
pub use memory::{MemoryEndpoint, MemorySink, MemorySource};
pub use traits::{ByteSink, ByteSource, StreamSink, StreamSource};

#[cfg(feature = "serial")]
pub use serial::{PortSummary, SerialConfig, SerialSink, SerialSource};
