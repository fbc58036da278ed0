use std::ops::{Deref, DerefMut};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};

use bytes::Bytes;
use flowserial_frame::{Frame, Instruction, Parser, State, Step};
use flowserial_transport::ByteSink;
use tracing::{debug, warn};

use crate::config::SocketConfig;
use crate::error::{ConnectionError, Result};
use crate::register::{Inbox, Register};

/// A FlowSerial endpoint: owns the local register, parses incoming bytes,
/// answers the peer, and issues requests of its own.
///
/// Cloning yields another handle to the same endpoint, so one clone can feed
/// incoming bytes on a reader thread while others call [`Socket::read`].
#[derive(Clone)]
pub struct Socket {
    shared: Arc<Shared>,
}

struct Shared {
    engine: Mutex<Engine>,
    response: Condvar,
    sink: Mutex<Option<Box<dyn ByteSink>>>,
    /// Serializes `read` calls; the protocol has one request in flight at most.
    request: Mutex<()>,
    config: SocketConfig,
}

struct Engine {
    parser: Parser,
    register: Register,
    inbox: Inbox,
    closed: bool,
    /// Bumped whenever pending reads must be abandoned.
    interrupts: u64,
}

impl Engine {
    /// Whether a read that began at interrupt count `epoch` must give up.
    fn halted(&self, epoch: u64) -> bool {
        self.closed || self.interrupts != epoch
    }

    /// Apply a validated frame. Returns an encoded reply if one must be sent.
    fn dispatch(&mut self, frame: &Frame, config: &SocketConfig) -> Option<Bytes> {
        debug!(
            instruction = frame.instruction.name(),
            address = frame.start_address,
            length = frame.length,
            "frame received"
        );
        match frame.instruction {
            Instruction::Write => {
                self.register
                    .apply_write(frame.start_address, &frame.payload, config.write_policy);
                None
            }
            Instruction::Read => {
                let data = self.register.read_range(frame.start_address, frame.length);
                match Frame::return_data(frame.start_address, Bytes::copy_from_slice(data))
                    .and_then(|reply| reply.to_bytes())
                {
                    Ok(wire) => Some(wire),
                    Err(err) => {
                        warn!(error = %err, "could not build reply to read request");
                        None
                    }
                }
            }
            Instruction::ReturnRequestedData => {
                self.inbox.store(&frame.payload);
                None
            }
        }
    }
}

impl Socket {
    /// Create a socket with a zeroed register of `register_len` bytes.
    pub fn new(register_len: usize) -> Self {
        Self::with_config(vec![0; register_len], SocketConfig::default())
    }

    /// Create a socket around caller-provided register contents.
    ///
    /// The register keeps this length for the life of the socket.
    pub fn with_config(register: Vec<u8>, config: SocketConfig) -> Self {
        let engine = Engine {
            parser: Parser::with_config(&config.frame),
            register: Register::new(register),
            inbox: Inbox::new(),
            closed: false,
            interrupts: 0,
        };
        Self {
            shared: Arc::new(Shared {
                engine: Mutex::new(engine),
                response: Condvar::new(),
                sink: Mutex::new(None),
                request: Mutex::new(()),
                config,
            }),
        }
    }

    /// Route outgoing bytes to `sink`, replacing any previous one.
    pub fn attach(&self, sink: impl ByteSink + 'static) {
        *self.lock_sink() = Some(Box::new(sink));
        self.lock_engine().closed = false;
    }

    /// Stop sending and fail any pending or future [`Socket::read`] with
    /// [`ConnectionError::Closed`] until a sink is attached again.
    pub fn detach(&self) {
        self.lock_sink().take();
        self.mark_closed();
    }

    pub(crate) fn mark_closed(&self) {
        {
            let mut engine = self.lock_engine();
            engine.closed = true;
            engine.interrupts = engine.interrupts.wrapping_add(1);
        }
        self.shared.response.notify_all();
    }

    /// Fail reads that are already waiting with [`ConnectionError::Closed`]
    /// while leaving the socket usable for later ones.
    pub(crate) fn interrupt(&self) {
        {
            let mut engine = self.lock_engine();
            engine.interrupts = engine.interrupts.wrapping_add(1);
        }
        self.shared.response.notify_all();
    }

    pub(crate) fn mark_open(&self) {
        self.lock_engine().closed = false;
    }

    /// Feed received bytes, in order.
    ///
    /// Returns `true` if at least one complete, valid frame was dispatched.
    /// Corrupt or malformed frames are dropped silently. An error means a
    /// reply to the peer's read request could not be sent.
    pub fn update(&self, data: &[u8]) -> Result<bool> {
        let mut replies = Vec::new();
        let mut dispatched = false;
        let mut answered = false;
        {
            let mut engine = self.lock_engine();
            for &byte in data {
                match engine.parser.feed(byte) {
                    Step::Pending => {}
                    Step::Rejected(err) => debug!(error = %err, "discarding frame"),
                    Step::Complete(frame) => {
                        dispatched = true;
                        answered |= frame.instruction == Instruction::ReturnRequestedData;
                        if let Some(reply) = engine.dispatch(&frame, &self.shared.config) {
                            replies.push(reply);
                        }
                    }
                }
            }
        }

        if answered {
            self.shared.response.notify_all();
        }
        for reply in replies {
            self.transmit(&reply)?;
        }
        Ok(dispatched)
    }

    /// Ask the peer for `n_bytes` of its register starting at `start_address`.
    ///
    /// Does not wait. The answer lands in the inbox; see [`Socket::available`].
    pub fn send_read_request(&self, start_address: u8, n_bytes: usize) -> Result<()> {
        let wire = Frame::read_request(start_address, n_bytes)?.to_bytes()?;
        self.transmit(&wire)
    }

    /// Store `data` in the peer's register starting at `start_address`.
    ///
    /// Fire and forget; the protocol has no acknowledgement.
    pub fn write_to_peer(&self, start_address: u8, data: &[u8]) -> Result<()> {
        let wire = Frame::write(start_address, Bytes::copy_from_slice(data))?.to_bytes()?;
        self.transmit(&wire)
    }

    /// Read `out.len()` bytes of the peer's register starting at `start_address`.
    ///
    /// Sends a read request and blocks until the answer arrives or the
    /// per-attempt timeout elapses, retrying up to the configured number of
    /// attempts (3 x 500 ms by default). Another thread must be feeding
    /// incoming bytes through [`Socket::update`] meanwhile. Concurrent calls
    /// are served one after the other.
    ///
    /// Returns the number of bytes copied into `out`, which is less than
    /// `out.len()` if the peer answered with fewer bytes.
    pub fn read(&self, start_address: u8, out: &mut [u8]) -> Result<usize> {
        let config = &self.shared.config;
        if out.len() > config.frame.max_payload_size {
            return Err(flowserial_frame::FrameError::PayloadTooLarge {
                size: out.len(),
                max: config.frame.max_payload_size,
            }
            .into());
        }

        let _in_flight = self
            .shared
            .request
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let attempts = config.read_attempts.max(1);
        let epoch = self.lock_engine().interrupts;

        for attempt in 1..=attempts {
            let seen = {
                let engine = self.lock_engine();
                if engine.halted(epoch) {
                    return Err(ConnectionError::Closed);
                }
                engine.inbox.generation()
            };

            self.send_read_request(start_address, out.len())?;

            let engine = self.lock_engine();
            let (engine, _) = self
                .shared
                .response
                .wait_timeout_while(engine, config.read_timeout, |e| {
                    e.inbox.generation() == seen && !e.halted(epoch)
                })
                .unwrap_or_else(PoisonError::into_inner);

            if engine.inbox.generation() != seen {
                return Ok(engine.inbox.copy_to(out));
            }
            if engine.halted(epoch) {
                return Err(ConnectionError::Closed);
            }
            warn!(
                attempt,
                attempts,
                address = start_address,
                "no answer to read request"
            );
        }

        Err(ConnectionError::Timeout {
            attempts,
            per_attempt: config.read_timeout,
        })
    }

    /// Number of bytes in the inbox.
    pub fn available(&self) -> usize {
        self.lock_engine().inbox.available()
    }

    /// Copy up to [`Socket::available`] bytes of the inbox into `dest`
    /// without clearing it. Returns the number copied.
    pub fn get_returned_data(&self, dest: &mut [u8]) -> usize {
        self.lock_engine().inbox.copy_to(dest)
    }

    /// Mark the inbox empty.
    pub fn clear_returned_data(&self) {
        self.lock_engine().inbox.clear();
    }

    /// Direct access to the local register.
    ///
    /// Incoming frames are not processed while the guard is alive, so keep it short.
    pub fn register(&self) -> RegisterGuard<'_> {
        RegisterGuard {
            engine: self.lock_engine(),
        }
    }

    /// Length of the local register.
    pub fn register_len(&self) -> usize {
        self.lock_engine().register.len()
    }

    /// Copy local register bytes starting at `start` into `dest`.
    /// Returns the number copied, which stops at the end of the register.
    pub fn read_register(&self, start: usize, dest: &mut [u8]) -> usize {
        let engine = self.lock_engine();
        let src = engine.register.as_slice();
        let start = start.min(src.len());
        let n = (src.len() - start).min(dest.len());
        dest[..n].copy_from_slice(&src[start..start + n]);
        n
    }

    /// Overwrite local register bytes starting at `start`.
    /// Bytes past the end of the register are dropped; returns the number stored.
    pub fn write_register(&self, start: usize, data: &[u8]) -> usize {
        let mut engine = self.lock_engine();
        let dst = engine.register.as_mut_slice();
        let start = start.min(dst.len());
        let n = (dst.len() - start).min(data.len());
        dst[start..start + n].copy_from_slice(&data[..n]);
        n
    }

    /// Parser position, mainly for diagnostics.
    pub fn parser_state(&self) -> State {
        self.lock_engine().parser.state()
    }

    pub fn config(&self) -> &SocketConfig {
        &self.shared.config
    }

    fn transmit(&self, bytes: &[u8]) -> Result<()> {
        let mut sink = self.lock_sink();
        match sink.as_mut() {
            Some(sink) => sink.send_bytes(bytes).map_err(ConnectionError::Write),
            None => Err(ConnectionError::NotConnected),
        }
    }

    fn lock_engine(&self) -> MutexGuard<'_, Engine> {
        self.shared
            .engine
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_sink(&self) -> MutexGuard<'_, Option<Box<dyn ByteSink>>> {
        self.shared
            .sink
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for Socket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let engine = self.lock_engine();
        f.debug_struct("Socket")
            .field("register_len", &engine.register.len())
            .field("inbox", &engine.inbox.available())
            .field("parser_state", &engine.parser.state())
            .field("closed", &engine.closed)
            .finish()
    }
}

/// Locked view of the register. Derefs to `[u8]`.
pub struct RegisterGuard<'a> {
    engine: MutexGuard<'a, Engine>,
}

impl Deref for RegisterGuard<'_> {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        self.engine.register.as_slice()
    }
}

impl DerefMut for RegisterGuard<'_> {
    fn deref_mut(&mut self) -> &mut [u8] {
        self.engine.register.as_mut_slice()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};
    use std::thread;
    use std::time::{Duration, Instant};

    use bytes::BytesMut;
    use flowserial_frame::{decode_frame, FrameConfig, FrameError};
    use flowserial_transport::TransportError;

    use super::*;
    use crate::config::WritePolicy;

    #[derive(Clone, Default)]
    struct RecordingSink {
        sent: Arc<Mutex<Vec<u8>>>,
    }

    impl RecordingSink {
        fn frames(&self) -> Vec<Frame> {
            let mut wire = BytesMut::from(self.sent.lock().unwrap().as_slice());
            let mut frames = Vec::new();
            while let Some(frame) = decode_frame(&mut wire, &FrameConfig::default()).unwrap() {
                frames.push(frame);
            }
            frames
        }
    }

    impl ByteSink for RecordingSink {
        fn send_bytes(&mut self, bytes: &[u8]) -> flowserial_transport::Result<()> {
            self.sent.lock().unwrap().extend_from_slice(bytes);
            Ok(())
        }
    }

    struct FailingSink;

    impl ByteSink for FailingSink {
        fn send_bytes(&mut self, _bytes: &[u8]) -> flowserial_transport::Result<()> {
            Err(TransportError::Write(std::io::Error::from(
                std::io::ErrorKind::BrokenPipe,
            )))
        }
    }

    fn wire(frame: Frame) -> Vec<u8> {
        frame.to_bytes().unwrap().to_vec()
    }

    fn attached(register_len: usize) -> (Socket, RecordingSink) {
        let socket = Socket::new(register_len);
        let sink = RecordingSink::default();
        socket.attach(sink.clone());
        (socket, sink)
    }

    #[test]
    fn write_frame_updates_only_addressed_bytes() {
        let (socket, sink) = attached(16);
        let dispatched = socket
            .update(&wire(Frame::write(5, vec![9, 9]).unwrap()))
            .unwrap();

        assert!(dispatched);
        let reg = socket.register();
        assert_eq!(&reg[5..7], &[9, 9]);
        assert!(reg[..5].iter().chain(&reg[7..]).all(|&b| b == 0));
        drop(reg);
        assert!(sink.frames().is_empty());
    }

    #[test]
    fn read_frame_is_answered_once_with_register_slice() {
        let (socket, sink) = attached(8);
        socket.register().copy_from_slice(&[10, 11, 12, 13, 14, 15, 16, 17]);

        assert!(socket
            .update(&wire(Frame::read_request(2, 3).unwrap()))
            .unwrap());

        let frames = sink.frames();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].instruction, Instruction::ReturnRequestedData);
        assert_eq!(frames[0].start_address, 2);
        assert_eq!(frames[0].payload.as_ref(), &[12, 13, 14]);
    }

    #[test]
    fn read_past_register_end_answers_in_range_prefix() {
        let (socket, sink) = attached(4);
        socket.register().copy_from_slice(&[1, 2, 3, 4]);

        socket
            .update(&wire(Frame::read_request(2, 10).unwrap()))
            .unwrap();

        let frames = sink.frames();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].payload.as_ref(), &[3, 4]);
    }

    #[test]
    fn returned_data_fills_inbox() {
        let (socket, _sink) = attached(4);
        socket
            .update(&wire(Frame::return_data(0, vec![1, 2, 3]).unwrap()))
            .unwrap();

        assert_eq!(socket.available(), 3);
        let mut out = [0u8; 8];
        assert_eq!(socket.get_returned_data(&mut out), 3);
        assert_eq!(&out[..3], &[1, 2, 3]);
        // Reading does not consume.
        assert_eq!(socket.available(), 3);

        socket.clear_returned_data();
        assert_eq!(socket.available(), 0);
    }

    #[test]
    fn new_returned_data_replaces_old() {
        let (socket, _sink) = attached(4);
        socket
            .update(&wire(Frame::return_data(0, vec![1, 2, 3, 4]).unwrap()))
            .unwrap();
        socket
            .update(&wire(Frame::return_data(0, vec![8]).unwrap()))
            .unwrap();

        assert_eq!(socket.available(), 1);
        let mut out = [0u8; 4];
        socket.get_returned_data(&mut out);
        assert_eq!(out[0], 8);
    }

    #[test]
    fn corrupted_write_is_dropped_silently() {
        let clean = wire(Frame::write(5, vec![9, 9]).unwrap());
        for index in 1..clean.len() - 2 {
            for bit in 0..8 {
                let (socket, sink) = attached(16);
                let mut bytes = clean.clone();
                bytes[index] ^= 1 << bit;

                assert!(!socket.update(&bytes).unwrap());
                assert!(socket.register().iter().all(|&b| b == 0));
                assert_eq!(socket.available(), 0);
                assert!(sink.frames().is_empty());
            }
        }
    }

    #[test]
    fn byte_at_a_time_matches_single_batch() {
        let mut stream = Vec::new();
        stream.extend(wire(Frame::write(0, vec![1, 2, 3]).unwrap()));
        stream.extend([0x00, 0x42]);
        stream.extend(wire(Frame::return_data(0, vec![7, 7]).unwrap()));
        stream.extend(wire(Frame::write(6, vec![5]).unwrap()));

        let (batched, _) = attached(8);
        batched.update(&stream).unwrap();

        let (trickled, _) = attached(8);
        for byte in &stream {
            trickled.update(std::slice::from_ref(byte)).unwrap();
        }

        assert_eq!(&*batched.register(), &*trickled.register());
        assert_eq!(batched.available(), trickled.available());
        let (mut a, mut b) = ([0u8; 4], [0u8; 4]);
        batched.get_returned_data(&mut a);
        trickled.get_returned_data(&mut b);
        assert_eq!(a, b);
    }

    #[test]
    fn inbox_accessors_leave_parser_alone() {
        let (socket, _sink) = attached(8);
        let bytes = wire(Frame::write(1, vec![4, 4]).unwrap());

        socket.update(&bytes[..3]).unwrap();
        let state = socket.parser_state();
        assert_eq!(state, State::AddressReceived);

        socket.available();
        socket.get_returned_data(&mut [0u8; 4]);
        socket.clear_returned_data();
        assert_eq!(socket.parser_state(), state);

        assert!(socket.update(&bytes[3..]).unwrap());
        assert_eq!(&socket.register()[1..3], &[4, 4]);
    }

    #[test]
    fn reject_policy_drops_out_of_range_write() {
        let config = SocketConfig {
            write_policy: WritePolicy::Reject,
            ..SocketConfig::default()
        };
        let socket = Socket::with_config(vec![0; 4], config);
        assert!(socket
            .update(&wire(Frame::write(3, vec![1, 2]).unwrap()))
            .unwrap());
        assert_eq!(&*socket.register(), &[0, 0, 0, 0]);
    }

    #[test]
    fn clamp_policy_keeps_in_range_prefix() {
        let socket = Socket::new(4);
        socket
            .update(&wire(Frame::write(3, vec![1, 2]).unwrap()))
            .unwrap();
        assert_eq!(&*socket.register(), &[0, 0, 0, 1]);
    }

    #[test]
    fn local_register_access_is_bounded() {
        let socket = Socket::new(4);
        assert_eq!(socket.write_register(2, &[1, 2, 3]), 2);
        assert_eq!(&*socket.register(), &[0, 0, 1, 2]);

        let mut out = [9u8; 4];
        assert_eq!(socket.read_register(1, &mut out), 3);
        assert_eq!(out, [0, 1, 2, 9]);
        assert_eq!(socket.read_register(10, &mut out), 0);
        assert_eq!(socket.register_len(), 4);
    }

    #[test]
    fn send_without_sink_fails() {
        let socket = Socket::new(4);
        assert!(matches!(
            socket.write_to_peer(0, &[1]),
            Err(ConnectionError::NotConnected)
        ));
        assert!(matches!(
            socket.send_read_request(0, 1),
            Err(ConnectionError::NotConnected)
        ));
    }

    #[test]
    fn sink_failure_surfaces_as_write_error() {
        let socket = Socket::new(4);
        socket.attach(FailingSink);
        assert!(matches!(
            socket.write_to_peer(0, &[1]),
            Err(ConnectionError::Write(TransportError::Write(_)))
        ));
        // Replying to the peer's read hits the same sink.
        assert!(matches!(
            socket.update(&wire(Frame::read_request(0, 1).unwrap())),
            Err(ConnectionError::Write(_))
        ));
    }

    #[test]
    fn outgoing_frames_are_well_formed() {
        let (socket, sink) = attached(4);
        socket.send_read_request(3, 2).unwrap();
        socket.write_to_peer(1, &[6, 7]).unwrap();

        let frames = sink.frames();
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0], Frame::read_request(3, 2).unwrap());
        assert_eq!(frames[1], Frame::write(1, vec![6, 7]).unwrap());
    }

    #[test]
    fn oversized_requests_rejected() {
        let (socket, _sink) = attached(4);
        assert!(matches!(
            socket.write_to_peer(0, &[0u8; 300]),
            Err(ConnectionError::Frame(FrameError::PayloadTooLarge { .. }))
        ));
        let mut out = vec![0u8; 300];
        assert!(matches!(
            socket.read(0, &mut out),
            Err(ConnectionError::Frame(FrameError::PayloadTooLarge { .. }))
        ));
    }

    #[test]
    fn read_times_out_after_three_attempts() {
        let (socket, sink) = attached(4);
        let start = Instant::now();
        let mut out = [0u8; 2];

        let err = socket.read(0, &mut out).unwrap_err();
        let elapsed = start.elapsed();

        assert!(matches!(err, ConnectionError::Timeout { attempts: 3, .. }));
        assert!(elapsed >= Duration::from_millis(1500), "{elapsed:?}");
        assert!(elapsed < Duration::from_millis(2500), "{elapsed:?}");

        let frames = sink.frames();
        assert_eq!(frames.len(), 3);
        assert!(frames.iter().all(|f| f.instruction == Instruction::Read));
    }

    #[test]
    fn read_returns_answer_fed_by_another_thread() {
        let socket = Socket::new(4);
        let sink = RecordingSink::default();
        socket.attach(sink.clone());

        let feeder = {
            let socket = socket.clone();
            let sink = sink.clone();
            thread::spawn(move || {
                // Answer as soon as the request shows up.
                while sink.frames().is_empty() {
                    thread::sleep(Duration::from_millis(1));
                }
                socket
                    .update(&wire(Frame::return_data(1, vec![5, 6]).unwrap()))
                    .unwrap();
            })
        };

        let mut out = [0u8; 2];
        assert_eq!(socket.read(1, &mut out).unwrap(), 2);
        assert_eq!(out, [5, 6]);
        feeder.join().unwrap();
    }

    #[test]
    fn detach_unblocks_pending_read() {
        let config = SocketConfig {
            read_timeout: Duration::from_secs(5),
            ..SocketConfig::default()
        };
        let socket = Socket::with_config(vec![0; 4], config);
        socket.attach(RecordingSink::default());

        let closer = {
            let socket = socket.clone();
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(50));
                socket.detach();
            })
        };

        let start = Instant::now();
        let mut out = [0u8; 1];
        assert!(matches!(
            socket.read(0, &mut out),
            Err(ConnectionError::Closed)
        ));
        assert!(start.elapsed() < Duration::from_secs(5));
        closer.join().unwrap();

        // Closed until a sink is attached again.
        assert!(matches!(
            socket.read(0, &mut out),
            Err(ConnectionError::Closed)
        ));
    }

    #[test]
    fn interrupt_fails_pending_read_only() {
        let config = SocketConfig {
            read_timeout: Duration::from_secs(5),
            ..SocketConfig::default()
        };
        let socket = Socket::with_config(vec![0; 4], config);
        let sink = RecordingSink::default();
        socket.attach(sink.clone());

        let reader = {
            let socket = socket.clone();
            thread::spawn(move || socket.read(0, &mut [0u8; 1]))
        };
        while sink.frames().is_empty() {
            thread::sleep(Duration::from_millis(1));
        }
        socket.interrupt();
        assert!(matches!(
            reader.join().unwrap(),
            Err(ConnectionError::Closed)
        ));

        // The next read goes through once an answer is fed.
        let feeder = {
            let socket = socket.clone();
            let sink = sink.clone();
            thread::spawn(move || {
                while sink.frames().len() < 2 {
                    thread::sleep(Duration::from_millis(1));
                }
                socket
                    .update(&wire(Frame::return_data(0, vec![6]).unwrap()))
                    .unwrap();
            })
        };
        let mut out = [0u8; 1];
        assert_eq!(socket.read(0, &mut out).unwrap(), 1);
        assert_eq!(out, [6]);
        feeder.join().unwrap();
    }

    #[test]
    fn concurrent_reads_are_serialized() {
        let socket = Socket::new(4);
        let sink = RecordingSink::default();
        socket.attach(sink.clone());

        let responder = {
            let socket = socket.clone();
            let sink = sink.clone();
            thread::spawn(move || {
                let mut answered = 0usize;
                while answered < 2 {
                    let requests = sink.frames().len();
                    if requests > answered {
                        let value = requests as u8;
                        socket
                            .update(&wire(Frame::return_data(0, vec![value]).unwrap()))
                            .unwrap();
                        answered = requests;
                    }
                    thread::sleep(Duration::from_millis(1));
                }
            })
        };

        let readers: Vec<_> = (0..2)
            .map(|_| {
                let socket = socket.clone();
                thread::spawn(move || {
                    let mut out = [0u8; 1];
                    socket.read(0, &mut out).map(|_| out[0])
                })
            })
            .collect();

        let mut values: Vec<u8> = readers
            .into_iter()
            .map(|r| r.join().unwrap().unwrap())
            .collect();
        values.sort_unstable();
        assert_eq!(values, vec![1, 2]);
        responder.join().unwrap();
    }
}
