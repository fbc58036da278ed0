use std::thread;
use std::time::{Duration, Instant};

use bytes::BytesMut;
use flowserial_frame::{decode_frame, Frame, FrameConfig, Instruction};
use flowserial_peer::{ConnectionError, Link, Socket, SocketConfig};
use flowserial_transport::memory::{self, MemoryEndpoint};
use flowserial_transport::{ByteSink, ByteSource};

fn link_on(endpoint: MemoryEndpoint, register: Vec<u8>) -> Link {
    let (source, sink) = endpoint.split();
    let mut link = Link::new(Socket::with_config(register, SocketConfig::default()));
    link.open(source, sink).unwrap();
    link.start_update_thread().unwrap();
    link
}

#[test]
fn two_peers_read_and_write_each_other() {
    let (a, b) = memory::pair();
    let alice = link_on(a, vec![0; 8]);
    let bob = link_on(b, vec![10, 20, 30, 40, 50, 60, 70, 80]);

    let mut out = [0u8; 3];
    assert_eq!(alice.socket().read(2, &mut out).unwrap(), 3);
    assert_eq!(out, [30, 40, 50]);

    alice.socket().write_to_peer(6, &[1, 2]).unwrap();
    // Writes are fire and forget; read back to know it landed.
    let mut back = [0u8; 2];
    alice.socket().read(6, &mut back).unwrap();
    assert_eq!(back, [1, 2]);
    assert_eq!(&bob.socket().register()[6..], &[1, 2]);

    // The protocol is symmetric.
    alice.socket().write_register(0, &[99]);
    let mut one = [0u8; 1];
    bob.socket().read(0, &mut one).unwrap();
    assert_eq!(one, [99]);
}

#[test]
fn read_succeeds_when_peer_answers_second_attempt() {
    let (near, far) = memory::pair();
    let link = link_on(near, vec![0; 4]);

    let fake_peer = thread::spawn(move || {
        let (mut source, mut sink) = far.split();
        let mut wire = BytesMut::new();
        let mut requests = 0;
        let mut buf = [0u8; 64];
        while requests < 2 {
            let n = source.read_available(&mut buf).unwrap();
            wire.extend_from_slice(&buf[..n]);
            while let Some(frame) = decode_frame(&mut wire, &FrameConfig::default()).unwrap() {
                assert_eq!(frame.instruction, Instruction::Read);
                requests += 1;
                if requests == 2 {
                    let reply = Frame::return_data(frame.start_address, vec![7, 8]).unwrap();
                    sink.send_bytes(&reply.to_bytes().unwrap()).unwrap();
                }
            }
        }
        requests
    });

    let start = Instant::now();
    let mut out = [0u8; 2];
    assert_eq!(link.socket().read(1, &mut out).unwrap(), 2);
    assert_eq!(out, [7, 8]);
    assert!(start.elapsed() >= SocketConfig::DEFAULT_READ_TIMEOUT);
    assert_eq!(fake_peer.join().unwrap(), 2);
}

#[test]
fn read_times_out_against_silent_peer() {
    let (near, _far) = memory::pair();
    let link = link_on(near, vec![0; 4]);

    let mut out = [0u8; 1];
    let err = link.socket().read(0, &mut out).unwrap_err();
    assert!(matches!(
        err,
        ConnectionError::Timeout {
            attempts: 3,
            per_attempt,
        } if per_attempt == Duration::from_millis(500)
    ));
}

#[test]
fn stopping_update_thread_unblocks_pending_read() {
    let (near, _far) = memory::pair();
    let mut link = link_on(near, vec![0; 4]);
    let socket = link.socket().clone();

    let reader = thread::spawn(move || {
        let mut out = [0u8; 1];
        socket.read(0, &mut out)
    });

    thread::sleep(Duration::from_millis(100));
    let start = Instant::now();
    link.stop_update_thread().unwrap();
    let result = reader.join().unwrap();

    assert!(matches!(result, Err(ConnectionError::Closed)));
    assert!(start.elapsed() < Duration::from_millis(500));
}

#[test]
fn transport_failure_surfaces_from_stop() {
    let (near, far) = memory::pair();
    let mut link = link_on(near, vec![0; 4]);

    let (_far_source, far_sink) = far.split();
    far_sink.close();

    let deadline = Instant::now() + Duration::from_secs(2);
    while link.is_open() && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(5));
    }
    assert!(!link.is_open());

    // Requests fail fast once the link is down.
    let mut out = [0u8; 1];
    assert!(matches!(
        link.socket().read(0, &mut out),
        Err(ConnectionError::Closed)
    ));
    assert!(matches!(
        link.stop_update_thread(),
        Err(ConnectionError::Read(_))
    ));
}

#[test]
fn garbage_between_frames_is_ignored() {
    let (near, far) = memory::pair();
    let link = link_on(near, vec![0; 4]);
    let (_far_source, mut far_sink) = far.split();

    let mut corrupt = Frame::write(0, vec![1, 1]).unwrap().to_bytes().unwrap().to_vec();
    corrupt[4] ^= 0x10;
    far_sink.send_bytes(&[0x13, 0x37]).unwrap();
    far_sink.send_bytes(&corrupt).unwrap();
    far_sink
        .send_bytes(&Frame::write(2, vec![5, 6]).unwrap().to_bytes().unwrap())
        .unwrap();

    let deadline = Instant::now() + Duration::from_secs(2);
    while link.socket().register()[2] == 0 && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(5));
    }
    assert_eq!(&*link.socket().register(), &[0, 0, 5, 6]);
}

#[test]
fn reads_resume_by_polling_after_thread_stops() {
    let (a, b) = memory::pair();
    let mut alice = link_on(a, vec![0; 4]);
    let _bob = link_on(b, vec![4, 3, 2, 1]);

    alice.stop_update_thread().unwrap();
    assert!(alice.is_open());

    let socket = alice.socket().clone();
    let reader = thread::spawn(move || {
        let mut out = [0u8; 2];
        socket.read(1, &mut out).map(|n| (n, out))
    });

    let deadline = Instant::now() + Duration::from_secs(3);
    while !reader.is_finished() && Instant::now() < deadline {
        alice.poll().unwrap();
    }
    assert_eq!(reader.join().unwrap().unwrap(), (2, [3, 2]));
}

#[test]
fn dropping_link_fails_pending_read() {
    let (near, _far) = memory::pair();
    let (source, sink) = near.split();
    let config = SocketConfig {
        read_timeout: Duration::from_secs(5),
        ..SocketConfig::default()
    };
    let mut link = Link::new(Socket::with_config(vec![0; 4], config));
    link.open(source, sink).unwrap();
    link.start_update_thread().unwrap();
    let socket = link.socket().clone();

    let reader = thread::spawn(move || {
        let mut out = [0u8; 1];
        socket.read(0, &mut out)
    });

    thread::sleep(Duration::from_millis(100));
    let start = Instant::now();
    drop(link);
    let result = reader.join().unwrap();

    assert!(matches!(result, Err(ConnectionError::Closed)));
    assert!(start.elapsed() < Duration::from_secs(1));
}
