//! Symmetric register read/write protocol over serial and USB links.
//!
//! Two peers each expose a byte register. Either side can write into the
//! other's register or ask for a slice of it back, using small checksummed
//! frames over a plain byte stream.
//!
//! # Crate Structure
//!
//! - [`transport`]: byte sources and sinks (serial devices, in-memory link)
//! - [`frame`]: wire format, checksum and the byte-wise frame parser
//! - [`peer`]: register, request/response coordination and the update
//!   thread (behind `peer` feature)

/// Re-export transport types.
pub mod transport {
    pub use flowserial_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use flowserial_frame::*;
}

/// Re-export peer types (requires `peer` feature).
#[cfg(feature = "peer")]
pub mod peer {
    pub use flowserial_peer::*;
}
