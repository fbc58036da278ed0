/// Errors that can occur during frame encoding/decoding.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FrameError {
    /// The payload does not fit the one-byte length field or the configured maximum.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// The instruction byte is not a known instruction code.
    #[error("unknown instruction code 0x{0:02X}")]
    UnknownInstruction(u8),

    /// The checksum carried by the frame does not match the computed one.
    #[error("checksum mismatch (computed 0x{expected:04X}, received 0x{received:04X})")]
    ChecksumMismatch { expected: u16, received: u16 },

    /// A frame's length field disagrees with its payload.
    #[error("declared length {declared} does not match payload length {actual}")]
    LengthMismatch { declared: usize, actual: usize },

    /// The declared length exceeds the receive buffer.
    #[error("declared length {declared} exceeds buffer capacity {capacity}")]
    LengthExceedsCapacity { declared: usize, capacity: usize },
}

pub type Result<T> = std::result::Result<T, FrameError>;
