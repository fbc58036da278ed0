//! In-memory duplex link.
//!
//! Two endpoints joined by a pair of byte pipes. Whatever one endpoint's sink
//! sends, the other endpoint's source reads, in order. Used to wire two
//! protocol engines together without hardware, and by tests that script a
//! fake peer.

use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::error::{Result, TransportError};
use crate::traits::{ByteSink, ByteSource};

/// Default time a [`MemorySource`] waits for bytes before returning `Ok(0)`.
pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_millis(20);

#[derive(Default)]
struct PipeState {
    bytes: VecDeque<u8>,
    closed: bool,
}

#[derive(Default)]
struct Pipe {
    state: Mutex<PipeState>,
    ready: Condvar,
}

impl Pipe {
    fn lock(&self) -> MutexGuard<'_, PipeState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn close(&self) {
        self.lock().closed = true;
        self.ready.notify_all();
    }
}

/// One side of a [`pair`].
pub struct MemoryEndpoint {
    source: MemorySource,
    sink: MemorySink,
}

impl MemoryEndpoint {
    /// Split into the receiving and sending halves.
    pub fn split(self) -> (MemorySource, MemorySink) {
        (self.source, self.sink)
    }
}

/// Create two connected endpoints.
pub fn pair() -> (MemoryEndpoint, MemoryEndpoint) {
    let a_to_b = Arc::new(Pipe::default());
    let b_to_a = Arc::new(Pipe::default());

    let a = MemoryEndpoint {
        source: MemorySource::new(Arc::clone(&b_to_a)),
        sink: MemorySink {
            pipe: Arc::clone(&a_to_b),
        },
    };
    let b = MemoryEndpoint {
        source: MemorySource::new(a_to_b),
        sink: MemorySink { pipe: b_to_a },
    };
    (a, b)
}

/// Sending half of a memory endpoint. Cloning shares the same pipe.
#[derive(Clone)]
pub struct MemorySink {
    pipe: Arc<Pipe>,
}

impl MemorySink {
    /// Close the pipe. The reader drains what is queued, then sees `Closed`.
    pub fn close(&self) {
        self.pipe.close();
    }
}

impl ByteSink for MemorySink {
    fn send_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        let mut state = self.pipe.lock();
        if state.closed {
            return Err(TransportError::Closed);
        }
        state.bytes.extend(bytes.iter().copied());
        drop(state);
        self.pipe.ready.notify_all();
        Ok(())
    }
}

/// Receiving half of a memory endpoint.
pub struct MemorySource {
    pipe: Arc<Pipe>,
    poll_timeout: Duration,
}

impl MemorySource {
    fn new(pipe: Arc<Pipe>) -> Self {
        Self {
            pipe,
            poll_timeout: DEFAULT_POLL_TIMEOUT,
        }
    }

    /// Override how long a single read waits for data.
    pub fn with_poll_timeout(mut self, poll_timeout: Duration) -> Self {
        self.poll_timeout = poll_timeout;
        self
    }

    /// Close the pipe this source reads from.
    pub fn close(&self) {
        self.pipe.close();
    }
}

impl ByteSource for MemorySource {
    fn read_available(&mut self, buf: &mut [u8]) -> Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        let state = self.pipe.lock();
        let (mut state, _) = self
            .pipe
            .ready
            .wait_timeout_while(state, self.poll_timeout, |s| s.bytes.is_empty() && !s.closed)
            .unwrap_or_else(PoisonError::into_inner);

        if state.bytes.is_empty() {
            return if state.closed {
                Err(TransportError::Closed)
            } else {
                Ok(0)
            };
        }

        let n = buf.len().min(state.bytes.len());
        for (slot, byte) in buf.iter_mut().zip(state.bytes.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }
}
