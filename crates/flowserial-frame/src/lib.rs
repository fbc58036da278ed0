//! FlowSerial wire codec.
//!
//! Every message is framed as:
//! - a start byte (0xAA) for stream synchronization
//! - an instruction byte (read, write, return requested data)
//! - a one-byte register start address
//! - a one-byte length
//! - the payload (write and return frames only)
//! - a 16-bit little-endian checksum over instruction through payload
//!
//! Frames are parsed incrementally by [`Parser`], one byte at a time.

pub mod codec;
pub mod error;
pub mod parser;

pub use codec::{
    checksum, decode_frame, encode_frame, Checksum, Frame, FrameConfig, Instruction,
    BUFFER_CAPACITY, CHECKSUM_SIZE, HEADER_SIZE, MAX_PAYLOAD, START_BYTE,
};
pub use error::{FrameError, Result};
pub use parser::{Parser, State, Step};
