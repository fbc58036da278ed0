use std::io::{self, ErrorKind, Read, Write};
use std::thread;
use std::time::Duration;

use tracing::trace;

use crate::error::{Result, TransportError};

/// Pause before retrying a stream that reported `WouldBlock`.
pub const WOULD_BLOCK_BACKOFF: Duration = Duration::from_millis(1);

/// Consecutive `WouldBlock` results tolerated before a send fails.
pub const WOULD_BLOCK_RETRIES: u32 = 200;

/// Delivers raw outgoing bytes to the transport.
///
/// Implementations must push the whole slice or fail; there are no partial sends.
pub trait ByteSink: Send {
    fn send_bytes(&mut self, bytes: &[u8]) -> Result<()>;
}

/// Produces raw incoming bytes from the transport.
///
/// `read_available` may block for a bounded poll window. `Ok(0)` means nothing
/// arrived in that window and the caller should simply try again.
pub trait ByteSource: Send {
    fn read_available(&mut self, buf: &mut [u8]) -> Result<usize>;
}

impl<S: ByteSink + ?Sized> ByteSink for Box<S> {
    fn send_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        (**self).send_bytes(bytes)
    }
}

impl<S: ByteSource + ?Sized> ByteSource for Box<S> {
    fn read_available(&mut self, buf: &mut [u8]) -> Result<usize> {
        (**self).read_available(buf)
    }
}

/// Sends bytes over any `Write` stream.
pub struct StreamSink<T> {
    inner: T,
}

impl<T: Write + Send> StreamSink<T> {
    pub fn new(inner: T) -> Self {
        Self { inner }
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Consume the sink and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }

    fn flush(&mut self) -> Result<()> {
        let mut stalls = 0u32;
        loop {
            match self.inner.flush() {
                Ok(()) => return Ok(()),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::WouldBlock => back_off(&mut stalls, err)?,
                Err(err) => return Err(TransportError::Write(err)),
            }
        }
    }
}

/// Sleep briefly after a `WouldBlock`, or give up once the stream has
/// stalled [`WOULD_BLOCK_RETRIES`] times in a row.
fn back_off(stalls: &mut u32, err: io::Error) -> Result<()> {
    *stalls += 1;
    if *stalls > WOULD_BLOCK_RETRIES {
        return Err(TransportError::Write(err));
    }
    trace!(stalls = *stalls, "stream not ready for writing");
    thread::sleep(WOULD_BLOCK_BACKOFF);
    Ok(())
}

impl<T: Write + Send> ByteSink for StreamSink<T> {
    fn send_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        let mut offset = 0usize;
        let mut stalls = 0u32;
        while offset < bytes.len() {
            match self.inner.write(&bytes[offset..]) {
                Ok(0) => return Err(TransportError::Closed),
                Ok(n) => {
                    offset += n;
                    stalls = 0;
                }
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::WouldBlock => back_off(&mut stalls, err)?,
                Err(err) => return Err(TransportError::Write(err)),
            }
        }

        self.flush()
    }
}

/// Reads bytes from any `Read` stream.
///
/// End of stream is reported as [`TransportError::Closed`]; a read timeout is
/// reported as `Ok(0)` so the stream's own timeout becomes the poll window.
pub struct StreamSource<T> {
    inner: T,
}

impl<T: Read + Send> StreamSource<T> {
    pub fn new(inner: T) -> Self {
        Self { inner }
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Consume the source and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }
}

impl<T: Read + Send> ByteSource for StreamSource<T> {
    fn read_available(&mut self, buf: &mut [u8]) -> Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        loop {
            match self.inner.read(buf) {
                Ok(0) => return Err(TransportError::Closed),
                Ok(n) => return Ok(n),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err)
                    if err.kind() == ErrorKind::WouldBlock || err.kind() == ErrorKind::TimedOut =>
                {
                    return Ok(0)
                }
                Err(err) => return Err(TransportError::Read(err)),
            }
        }
    }
}
