//! Byte-wise FlowSerial frame parser.
//!
//! Bytes may arrive one at a time or in bursts; the parser keeps all
//! in-progress state between calls, so feeding a stream byte by byte or in
//! any chunking produces the same frames.

use bytes::Bytes;
use tracing::trace;

use crate::codec::{Checksum, Frame, FrameConfig, Instruction, BUFFER_CAPACITY, START_BYTE};
use crate::error::FrameError;

/// Parser position within a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum State {
    /// Scanning for the start byte.
    #[default]
    Idle,
    /// Start byte seen; next byte is the instruction.
    StartByteReceived,
    /// Instruction seen; next byte is the start address.
    InstructionReceived,
    /// Start address seen; next byte is the length.
    AddressReceived,
    /// Collecting payload bytes into the scratch buffer.
    ReceivingPayload,
    /// Header and payload complete; next byte is the checksum low byte.
    ArgumentsReceived,
    /// Checksum low byte seen; next byte is the checksum high byte.
    LsbChecksumReceived,
    /// Both checksum bytes seen; verification pending.
    MsbChecksumReceived,
    /// Checksum verified; frame ready for dispatch.
    ChecksumOk,
}

/// Outcome of feeding one byte.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// More bytes needed.
    Pending,
    /// A validated frame just completed. The parser is back to idle.
    Complete(Frame),
    /// The frame in progress was discarded. The parser is back to idle.
    Rejected(FrameError),
}

/// Incremental frame parser.
#[derive(Debug, Clone)]
pub struct Parser {
    state: State,
    instruction: Instruction,
    start_address: u8,
    n_bytes: usize,
    argument_bytes_received: usize,
    checksum: Checksum,
    checksum_received: u16,
    buffer: Vec<u8>,
    capacity: usize,
}

impl Default for Parser {
    fn default() -> Self {
        Self::new()
    }
}

impl Parser {
    /// Create a parser with the default configuration.
    pub fn new() -> Self {
        Self::with_config(&FrameConfig::default())
    }

    /// Create a parser that rejects declared lengths above `config.max_payload_size`.
    pub fn with_config(config: &FrameConfig) -> Self {
        Self {
            state: State::Idle,
            instruction: Instruction::Read,
            start_address: 0,
            n_bytes: 0,
            argument_bytes_received: 0,
            checksum: Checksum::new(),
            checksum_received: 0,
            buffer: Vec::with_capacity(BUFFER_CAPACITY),
            capacity: config.max_payload_size,
        }
    }

    /// Current state.
    pub fn state(&self) -> State {
        self.state
    }

    /// Whether the parser is between frames.
    pub fn is_idle(&self) -> bool {
        self.state == State::Idle
    }

    /// Drop any frame in progress.
    pub fn reset(&mut self) {
        self.state = State::Idle;
        self.start_address = 0;
        self.n_bytes = 0;
        self.argument_bytes_received = 0;
        self.checksum = Checksum::new();
        self.checksum_received = 0;
        self.buffer.clear();
    }

    /// Feed a single byte.
    pub fn feed(&mut self, byte: u8) -> Step {
        match self.state {
            State::Idle => {
                // Anything but the start byte is line noise.
                if byte == START_BYTE {
                    self.reset();
                    self.state = State::StartByteReceived;
                }
                Step::Pending
            }
            State::StartByteReceived => match Instruction::try_from(byte) {
                Ok(instruction) => {
                    self.instruction = instruction;
                    self.checksum.update(byte);
                    self.state = State::InstructionReceived;
                    Step::Pending
                }
                Err(err) => self.reject(err),
            },
            State::InstructionReceived => {
                self.start_address = byte;
                self.checksum.update(byte);
                self.state = State::AddressReceived;
                Step::Pending
            }
            State::AddressReceived => {
                let declared = usize::from(byte);
                if declared > self.capacity {
                    return self.reject(FrameError::LengthExceedsCapacity {
                        declared,
                        capacity: self.capacity,
                    });
                }
                self.n_bytes = declared;
                self.checksum.update(byte);
                self.state = if !self.instruction.has_payload() || declared == 0 {
                    State::ArgumentsReceived
                } else {
                    State::ReceivingPayload
                };
                Step::Pending
            }
            State::ReceivingPayload => {
                if self.argument_bytes_received >= self.n_bytes {
                    return self.reject(FrameError::LengthExceedsCapacity {
                        declared: self.n_bytes,
                        capacity: self.capacity,
                    });
                }
                self.buffer.push(byte);
                self.argument_bytes_received += 1;
                self.checksum.update(byte);
                if self.argument_bytes_received == self.n_bytes {
                    self.state = State::ArgumentsReceived;
                }
                Step::Pending
            }
            State::ArgumentsReceived => {
                self.checksum_received = u16::from(byte);
                self.state = State::LsbChecksumReceived;
                Step::Pending
            }
            State::LsbChecksumReceived => {
                self.checksum_received |= u16::from(byte) << 8;
                self.state = State::MsbChecksumReceived;
                self.verify()
            }
            // Transient states; `verify` always leaves the parser idle.
            State::MsbChecksumReceived | State::ChecksumOk => {
                self.reset();
                self.feed(byte)
            }
        }
    }

    fn verify(&mut self) -> Step {
        let expected = self.checksum.value();
        if expected != self.checksum_received {
            return self.reject(FrameError::ChecksumMismatch {
                expected,
                received: self.checksum_received,
            });
        }
        self.state = State::ChecksumOk;

        let payload = if self.instruction.has_payload() {
            Bytes::copy_from_slice(&self.buffer)
        } else {
            Bytes::new()
        };
        let frame = Frame {
            instruction: self.instruction,
            start_address: self.start_address,
            length: self.n_bytes,
            payload,
            checksum: self.checksum_received,
        };
        self.reset();
        Step::Complete(frame)
    }

    fn reject(&mut self, err: FrameError) -> Step {
        trace!(state = ?self.state, error = %err, "parser reset");
        self.reset();
        Step::Rejected(err)
    }
}
