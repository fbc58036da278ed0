/// Errors that can occur in byte transport operations.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Failed to open the device at the specified path.
    #[error("failed to open {path}: {source}")]
    Open {
        path: String,
        source: std::io::Error,
    },

    /// Reading from the device failed.
    #[error("transport read error: {0}")]
    Read(std::io::Error),

    /// Writing to the device failed.
    #[error("transport write error: {0}")]
    Write(std::io::Error),

    /// The serial driver reported an error outside of plain I/O.
    #[cfg(feature = "serial")]
    #[error("serial port error: {0}")]
    Serial(#[from] serialport::Error),

    /// The other end of the link is gone.
    #[error("transport closed")]
    Closed,
}

pub type Result<T> = std::result::Result<T, TransportError>;
