use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{FrameError, Result};
use crate::parser::{Parser, Step};

/// Frame synchronization byte.
pub const START_BYTE: u8 = 0xAA;

/// Start byte + instruction + start address + length.
pub const HEADER_SIZE: usize = 4;

/// Checksum low byte + high byte.
pub const CHECKSUM_SIZE: usize = 2;

/// Size of the receive scratch buffer and of the inbox.
pub const BUFFER_CAPACITY: usize = 256;

/// Largest payload a frame can carry; the length field is a single byte.
pub const MAX_PAYLOAD: usize = u8::MAX as usize;

/// Frame operation code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Instruction {
    /// Peer requests `length` bytes of our register starting at `start_address`.
    Read = 0x00,
    /// Peer supplies bytes to store in our register starting at `start_address`.
    Write = 0x01,
    /// Peer answers a read we issued earlier.
    ReturnRequestedData = 0x02,
}

impl Instruction {
    /// Wire code of this instruction.
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Whether frames with this instruction carry `length` payload bytes.
    pub fn has_payload(self) -> bool {
        !matches!(self, Instruction::Read)
    }

    /// Human-readable name.
    pub fn name(self) -> &'static str {
        match self {
            Instruction::Read => "read",
            Instruction::Write => "write",
            Instruction::ReturnRequestedData => "return_requested_data",
        }
    }
}

impl TryFrom<u8> for Instruction {
    type Error = FrameError;

    fn try_from(code: u8) -> Result<Self> {
        match code {
            0x00 => Ok(Instruction::Read),
            0x01 => Ok(Instruction::Write),
            0x02 => Ok(Instruction::ReturnRequestedData),
            other => Err(FrameError::UnknownInstruction(other)),
        }
    }
}

/// Running 16-bit frame checksum.
///
/// Wrapping sum of every byte from the instruction through the last payload
/// byte. The start byte and the checksum bytes are not covered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Checksum(u16);

impl Checksum {
    pub fn new() -> Self {
        Self(0)
    }

    pub fn update(&mut self, byte: u8) {
        self.0 = self.0.wrapping_add(u16::from(byte));
    }

    pub fn update_slice(&mut self, bytes: &[u8]) {
        for &byte in bytes {
            self.update(byte);
        }
    }

    pub fn value(self) -> u16 {
        self.0
    }
}

/// Checksum of a frame with the given fields.
pub fn checksum(instruction: Instruction, start_address: u8, length: u8, payload: &[u8]) -> u16 {
    let mut sum = Checksum::new();
    sum.update(instruction.code());
    sum.update(start_address);
    sum.update(length);
    sum.update_slice(payload);
    sum.value()
}

/// One complete protocol message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub instruction: Instruction,
    pub start_address: u8,
    /// Number of bytes requested (`Read`) or carried (`Write`, `ReturnRequestedData`).
    pub length: usize,
    /// Empty for `Read`.
    pub payload: Bytes,
    pub checksum: u16,
}

impl Frame {
    /// A request for `length` bytes of the peer's register.
    pub fn read_request(start_address: u8, length: usize) -> Result<Self> {
        let wire_len = length_byte(length)?;
        Ok(Self {
            instruction: Instruction::Read,
            start_address,
            length,
            payload: Bytes::new(),
            checksum: checksum(Instruction::Read, start_address, wire_len, &[]),
        })
    }

    /// Bytes to store in the peer's register.
    pub fn write(start_address: u8, payload: impl Into<Bytes>) -> Result<Self> {
        Self::with_payload(Instruction::Write, start_address, payload.into())
    }

    /// Answer to a read request received from the peer.
    pub fn return_data(start_address: u8, payload: impl Into<Bytes>) -> Result<Self> {
        Self::with_payload(Instruction::ReturnRequestedData, start_address, payload.into())
    }

    fn with_payload(instruction: Instruction, start_address: u8, payload: Bytes) -> Result<Self> {
        let wire_len = length_byte(payload.len())?;
        Ok(Self {
            instruction,
            start_address,
            length: payload.len(),
            checksum: checksum(instruction, start_address, wire_len, &payload),
            payload,
        })
    }

    /// The total wire size of this frame.
    pub fn wire_size(&self) -> usize {
        HEADER_SIZE + self.payload.len() + CHECKSUM_SIZE
    }

    /// Encode into a fresh buffer.
    pub fn to_bytes(&self) -> Result<Bytes> {
        let mut buf = BytesMut::with_capacity(self.wire_size());
        encode_frame(self, &mut buf)?;
        Ok(buf.freeze())
    }
}

fn length_byte(length: usize) -> Result<u8> {
    u8::try_from(length).map_err(|_| FrameError::PayloadTooLarge {
        size: length,
        max: MAX_PAYLOAD,
    })
}

/// Encode a frame into the wire format.
///
/// Wire format:
/// ```text
/// ┌───────┬─────────────┬─────────┬────────┬──────────────────┬──────────┬──────────┐
/// │ Start │ Instruction │ Address │ Length │ Payload          │ Sum low  │ Sum high │
/// │ 0xAA  │ (1B)        │ (1B)    │ (1B)   │ (Length bytes,   │ (1B)     │ (1B)     │
/// │       │             │         │        │  absent for Read)│          │          │
/// └───────┴─────────────┴─────────┴────────┴──────────────────┴──────────┴──────────┘
/// ```
///
/// The checksum is always recomputed, so the emitted frame is valid even if
/// `frame.checksum` was tampered with.
pub fn encode_frame(frame: &Frame, dst: &mut BytesMut) -> Result<()> {
    let payload: &[u8] = if frame.instruction.has_payload() {
        &frame.payload
    } else {
        &[]
    };
    if frame.instruction.has_payload() && frame.length != payload.len() {
        return Err(FrameError::LengthMismatch {
            declared: frame.length,
            actual: payload.len(),
        });
    }
    let wire_len = length_byte(frame.length)?;

    dst.reserve(HEADER_SIZE + payload.len() + CHECKSUM_SIZE);
    dst.put_u8(START_BYTE);
    dst.put_u8(frame.instruction.code());
    dst.put_u8(frame.start_address);
    dst.put_u8(wire_len);
    dst.put_slice(payload);
    dst.put_u16_le(checksum(
        frame.instruction,
        frame.start_address,
        wire_len,
        payload,
    ));
    Ok(())
}

/// Decode the first frame in a buffer.
///
/// Bytes before the start byte are skipped. Returns `Ok(None)` if the buffer
/// doesn't contain a complete frame yet; nothing is consumed in that case.
/// On success or on a rejected frame, consumes the bytes up to the end of
/// that frame.
pub fn decode_frame(src: &mut BytesMut, config: &FrameConfig) -> Result<Option<Frame>> {
    let mut parser = Parser::with_config(config);
    let mut outcome = None;
    for (index, &byte) in src.iter().enumerate() {
        let step = parser.feed(byte);
        if !matches!(step, Step::Pending) {
            outcome = Some((index + 1, step));
            break;
        }
    }

    let Some((consumed, step)) = outcome else {
        return Ok(None); // Need more data
    };
    src.advance(consumed);
    match step {
        Step::Complete(frame) => Ok(Some(frame)),
        Step::Rejected(err) => Err(err),
        Step::Pending => Ok(None),
    }
}

/// Configuration for the frame codec.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameConfig {
    /// Maximum declared length accepted by the parser. Default: [`MAX_PAYLOAD`].
    pub max_payload_size: usize,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_payload_size: MAX_PAYLOAD,
        }
    }
}
