use std::time::Duration;

use flowserial_frame::FrameError;
use flowserial_transport::TransportError;

/// Errors surfaced by a FlowSerial connection.
///
/// Corrupted or malformed incoming frames are never reported here; the parser
/// drops them and the requester's retry loop recovers.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    /// The transport failed to establish the channel.
    #[error("could not open device: {0}")]
    CouldNotOpen(TransportError),

    /// Reading raw bytes from the transport failed.
    #[error("could not read from device: {0}")]
    Read(TransportError),

    /// Writing raw bytes to the transport failed.
    #[error("could not write to device: {0}")]
    Write(TransportError),

    /// `read` exhausted all attempts without a response.
    #[error("timeout reached waiting for reading of device ({attempts} attempts of {per_attempt:?})")]
    Timeout { attempts: u32, per_attempt: Duration },

    /// The link was stopped while waiting for a response.
    #[error("connection closed")]
    Closed,

    /// No transport is attached to send through.
    #[error("not connected to a device")]
    NotConnected,

    /// The operation needs the transport source, which the update thread owns.
    #[error("update thread is running")]
    UpdateThreadRunning,

    /// The outgoing frame could not be built.
    #[error("frame error: {0}")]
    Frame(#[from] FrameError),

    /// The update thread could not be started.
    #[error("failed to spawn update thread: {0}")]
    Spawn(std::io::Error),

    /// The update thread panicked.
    #[error("update thread panicked")]
    ThreadPanicked,
}

pub type Result<T> = std::result::Result<T, ConnectionError>;
