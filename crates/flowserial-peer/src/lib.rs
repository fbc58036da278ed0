//! FlowSerial peer: a symmetric register read/write endpoint.
//!
//! Each side of a link owns a [`Socket`] holding a local register the other
//! side may read and write by address. A [`Link`] binds the socket to a
//! device and runs the thread that feeds it incoming bytes.
//!
//! ```no_run
//! use flowserial_peer::{Link, Socket};
//! use flowserial_transport::SerialConfig;
//!
//! # fn main() -> flowserial_peer::Result<()> {
//! let mut link = Link::new(Socket::new(64));
//! link.connect(&SerialConfig::new("/dev/ttyACM0", 115_200))?;
//! link.start_update_thread()?;
//!
//! link.socket().write_to_peer(0, &[1, 2, 3])?;
//! let mut out = [0u8; 3];
//! link.socket().read(0, &mut out)?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod link;
mod register;
pub mod socket;

pub use config::{SocketConfig, WritePolicy};
pub use error::{ConnectionError, Result};
pub use link::Link;
pub use socket::{RegisterGuard, Socket};
