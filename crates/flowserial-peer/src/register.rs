//! Local register and inbox storage.
//!
//! Both live inside the socket's engine and are only touched with the engine
//! lock held.

use flowserial_frame::BUFFER_CAPACITY;
use tracing::debug;

use crate::config::WritePolicy;

/// Fixed-length byte array the peer may read and write by address.
#[derive(Debug, Clone)]
pub(crate) struct Register {
    bytes: Vec<u8>,
}

impl Register {
    pub(crate) fn new(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    pub(crate) fn as_slice(&self) -> &[u8] {
        &self.bytes
    }

    pub(crate) fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.bytes
    }

    pub(crate) fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Store `data` at `start`. Returns how many bytes were written.
    pub(crate) fn apply_write(&mut self, start: u8, data: &[u8], policy: WritePolicy) -> usize {
        let start = usize::from(start);
        let end = start.saturating_add(data.len());
        if end > self.bytes.len() {
            debug!(
                start,
                len = data.len(),
                register_len = self.bytes.len(),
                ?policy,
                "write runs past end of register"
            );
            if policy == WritePolicy::Reject {
                return 0;
            }
        }
        let fits = self.bytes.len().saturating_sub(start).min(data.len());
        if fits > 0 {
            self.bytes[start..start + fits].copy_from_slice(&data[..fits]);
        }
        fits
    }

    /// The in-range part of `[start, start + len)`. Empty if `start` is past the end.
    pub(crate) fn read_range(&self, start: u8, len: usize) -> &[u8] {
        let start = usize::from(start).min(self.bytes.len());
        let end = start.saturating_add(len).min(self.bytes.len());
        &self.bytes[start..end]
    }
}

/// Most recent `ReturnRequestedData` payload.
#[derive(Debug, Clone)]
pub(crate) struct Inbox {
    data: [u8; BUFFER_CAPACITY],
    len: usize,
    /// Bumped on every arrival so waiters can tell a fresh answer from an old one.
    generation: u64,
}

impl Inbox {
    pub(crate) fn new() -> Self {
        Self {
            data: [0; BUFFER_CAPACITY],
            len: 0,
            generation: 0,
        }
    }

    /// Replace the contents; earlier data is never merged.
    pub(crate) fn store(&mut self, payload: &[u8]) {
        let len = payload.len().min(BUFFER_CAPACITY);
        self.data[..len].copy_from_slice(&payload[..len]);
        self.len = len;
        self.generation = self.generation.wrapping_add(1);
    }

    pub(crate) fn available(&self) -> usize {
        self.len
    }

    pub(crate) fn generation(&self) -> u64 {
        self.generation
    }

    /// Copy up to `available()` bytes into `dest`. Returns the number copied.
    pub(crate) fn copy_to(&self, dest: &mut [u8]) -> usize {
        let n = self.len.min(dest.len());
        dest[..n].copy_from_slice(&self.data[..n]);
        n
    }

    /// Forget the contents without touching the bytes.
    pub(crate) fn clear(&mut self) {
        self.len = 0;
    }
}
