//! Transport adapter: binds a [`Socket`] to a byte source and sink and runs
//! the background update thread.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use flowserial_transport::{ByteSink, ByteSource};
use tracing::{debug, error, info, warn};

use crate::error::{ConnectionError, Result};
use crate::socket::Socket;

const READ_CHUNK: usize = 256;
const THREAD_NAME: &str = "flowserial-update";

type WorkerOutput = (Box<dyn ByteSource>, Result<()>);

struct UpdateWorker {
    running: Arc<AtomicBool>,
    handle: JoinHandle<WorkerOutput>,
}

/// A [`Socket`] attached to a device.
///
/// Incoming bytes are pumped either by the update thread
/// ([`Link::start_update_thread`]) or by calling [`Link::poll`] by hand.
/// Requests go through [`Link::socket`], which may be cloned freely.
///
/// Dropping the link stops the update thread and releases the device.
pub struct Link {
    socket: Socket,
    source: Option<Box<dyn ByteSource>>,
    worker: Option<UpdateWorker>,
}

impl Link {
    /// A link with no device attached yet.
    pub fn new(socket: Socket) -> Self {
        Self {
            socket,
            source: None,
            worker: None,
        }
    }

    /// Attach a device given as a source/sink pair. Any previous device is closed.
    pub fn open(
        &mut self,
        source: impl ByteSource + 'static,
        sink: impl ByteSink + 'static,
    ) -> Result<()> {
        if let Err(err) = self.close() {
            warn!(error = %err, "previous device reported an error while closing");
        }
        self.socket.attach(sink);
        self.source = Some(Box::new(source));
        Ok(())
    }

    /// Open the serial device described by `config`, replacing any previous one.
    #[cfg(feature = "serial")]
    pub fn connect(&mut self, config: &flowserial_transport::SerialConfig) -> Result<()> {
        if let Err(err) = self.close() {
            warn!(error = %err, "previous device reported an error while closing");
        }
        let (source, sink) =
            flowserial_transport::serial::open(config).map_err(ConnectionError::CouldNotOpen)?;
        self.open(source, sink)
    }

    /// Stop the update thread and release the device.
    ///
    /// Pending [`Socket::read`] calls fail with [`ConnectionError::Closed`].
    /// Returns the error that ended the update thread, if any.
    pub fn close(&mut self) -> Result<()> {
        let stopped = self.stop_update_thread();
        let had_device = self.source.take().is_some();
        self.socket.detach();
        if had_device {
            info!("device closed");
        }
        stopped
    }

    /// Start pumping incoming bytes on a background thread.
    pub fn start_update_thread(&mut self) -> Result<()> {
        if self.worker.is_some() {
            return Err(ConnectionError::UpdateThreadRunning);
        }
        let source = self.source.take().ok_or(ConnectionError::NotConnected)?;

        // Reopen before the thread exists so its failure can't be overwritten.
        self.socket.mark_open();
        let running = Arc::new(AtomicBool::new(true));
        let socket = self.socket.clone();
        let flag = Arc::clone(&running);
        let handle = thread::Builder::new()
            .name(THREAD_NAME.into())
            .spawn(move || pump(socket, source, flag))
            .map_err(|err| {
                self.socket.mark_closed();
                ConnectionError::Spawn(err)
            })?;

        self.worker = Some(UpdateWorker { running, handle });
        debug!("update thread started");
        Ok(())
    }

    /// Stop the update thread and wait for it to exit.
    ///
    /// Pending [`Socket::read`] calls fail with [`ConnectionError::Closed`].
    /// Returns the transport error that ended the thread early, if any. The
    /// device stays attached and can be polled or handed to a new thread;
    /// reads issued afterwards are answered once the device is polled.
    pub fn stop_update_thread(&mut self) -> Result<()> {
        let Some(worker) = self.worker.take() else {
            return Ok(());
        };
        worker.running.store(false, Ordering::Release);
        self.socket.interrupt();

        let (source, outcome) = worker
            .handle
            .join()
            .map_err(|_| ConnectionError::ThreadPanicked)?;
        self.source = Some(source);
        debug!("update thread stopped");
        outcome
    }

    /// Whether a device is attached and, if the update thread runs, it is still alive.
    pub fn is_open(&self) -> bool {
        match &self.worker {
            Some(worker) => !worker.handle.is_finished(),
            None => self.source.is_some(),
        }
    }

    /// Read whatever the device has within one poll window and feed it to the socket.
    ///
    /// Returns `true` if a complete frame was processed. Only usable while the
    /// update thread is stopped.
    pub fn poll(&mut self) -> Result<bool> {
        if self.worker.is_some() {
            return Err(ConnectionError::UpdateThreadRunning);
        }
        let source = self.source.as_mut().ok_or(ConnectionError::NotConnected)?;

        let mut buf = [0u8; READ_CHUNK];
        let n = source.read_available(&mut buf).map_err(ConnectionError::Read)?;
        if n == 0 {
            return Ok(false);
        }
        self.socket.update(&buf[..n])
    }

    pub fn socket(&self) -> &Socket {
        &self.socket
    }
}

impl Drop for Link {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            debug!(error = %err, "error while dropping link");
        }
    }
}

impl std::fmt::Debug for Link {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Link")
            .field("socket", &self.socket)
            .field("update_thread", &self.worker.is_some())
            .field("open", &self.is_open())
            .finish()
    }
}

fn pump(socket: Socket, mut source: Box<dyn ByteSource>, running: Arc<AtomicBool>) -> WorkerOutput {
    let mut buf = [0u8; READ_CHUNK];
    while running.load(Ordering::Acquire) {
        let outcome = match source.read_available(&mut buf) {
            Ok(0) => continue,
            Ok(n) => socket.update(&buf[..n]).map(|_| ()),
            Err(err) => Err(ConnectionError::Read(err)),
        };
        if let Err(err) = outcome {
            error!(error = %err, "update thread stopped on transport failure");
            socket.mark_closed();
            return (source, Err(err));
        }
    }
    (source, Ok(()))
}
