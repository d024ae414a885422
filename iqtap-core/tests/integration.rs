//! Integration tests: sink and transport lifecycle over real TCP on
//! localhost, in both roles.

use std::io::Read;
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::thread;
use std::time::Duration;

use iqtap_core::frame::encode_frame;
use iqtap_core::{
    IqtapError, MEAN_VECTOR_LEN, Milestones, PREAMBLE_LEN, Role, SENTINEL, Sample, Sink,
    SinkConfig, Tap, TransportConfig, TransportManager, WorkStatus, WriteStatus,
};

const WAIT: Duration = Duration::from_secs(5);

// ── Helpers ──────────────────────────────────────────────────────

fn server_sink() -> Sink {
    let mut sink = Sink::new(SinkConfig {
        host: "127.0.0.1".into(),
        port: 0,
        role: Role::Server,
        ..Default::default()
    })
    .unwrap();
    sink.start().unwrap();
    sink
}

fn listen_addr(sink: &Sink) -> SocketAddr {
    sink.transport().local_addr().expect("listener bound")
}

fn connect(addr: SocketAddr) -> TcpStream {
    let stream = TcpStream::connect(addr).unwrap();
    stream.set_read_timeout(Some(WAIT)).unwrap();
    stream
}

/// One complete frame with an empty channel table.
fn empty_frame() -> Vec<Sample> {
    let mean: Vec<Sample> = (0..MEAN_VECTOR_LEN)
        .map(|i| Sample::new(i as f32 * 0.5, 1.0))
        .collect();
    let mut out = Vec::new();
    encode_frame(&mut out, PREAMBLE_LEN as usize, Sample::new(2.4e9, 0.0), &mean, &[]).unwrap();
    out
}

/// Preamble plus frequency: enough to fire `FREQUENCY_CAPTURED`.
fn frequency_batch() -> Vec<Sample> {
    let mut batch = vec![SENTINEL; PREAMBLE_LEN as usize];
    batch.push(Sample::new(868.0, 0.0));
    batch
}

fn read_floats(stream: &mut TcpStream, count: usize) -> Vec<f32> {
    let mut buf = vec![0u8; count * 4];
    stream.read_exact(&mut buf).unwrap();
    buf.chunks_exact(4)
        .map(|c| f32::from_ne_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}

// ── Server role ──────────────────────────────────────────────────

#[test]
fn test_server_streams_real_components() {
    let mut sink = server_sink();
    let mut client = connect(listen_addr(&sink));
    assert!(sink.transport().wait_for_connection(WAIT));

    let batch = frequency_batch();
    assert_eq!(sink.work(&batch), WorkStatus::Consumed(batch.len()));
    assert!(sink.last_milestones().contains(Milestones::FREQUENCY_CAPTURED));

    let received = read_floats(&mut client, batch.len());
    let expected: Vec<f32> = batch.iter().map(|s| s.re).collect();
    assert_eq!(received, expected);

    sink.stop();
}

#[test]
fn test_server_silent_between_milestones() {
    let mut sink = server_sink();
    let mut client = connect(listen_addr(&sink));
    assert!(sink.transport().wait_for_connection(WAIT));

    let noise = vec![Sample::new(0.1, 0.2); 1024];
    sink.work(&noise);
    assert_eq!(sink.stats().bytes_sent, 0);

    client
        .set_read_timeout(Some(Duration::from_millis(100)))
        .unwrap();
    let mut byte = [0u8; 1];
    assert!(client.read(&mut byte).is_err());
}

#[test]
fn test_server_reconnect_resumes_writes() {
    let mut manager = TransportManager::new(TransportConfig {
        role: Role::Server,
        host: "127.0.0.1".into(),
        port: 0,
    })
    .unwrap();
    manager.start().unwrap();
    let addr = manager.local_addr().unwrap();

    let first = connect(addr);
    assert!(manager.wait_for_connection(WAIT));
    drop(first);

    // The first write after the close may still be buffered; keep going
    // until the reset surfaces.
    let payload = vec![0x5au8; 64 * 1024];
    let mut disconnected = false;
    for _ in 0..100 {
        match manager.write(&payload) {
            WriteStatus::Disconnected { .. } => {
                disconnected = true;
                break;
            }
            WriteStatus::Sent(_) => thread::sleep(Duration::from_millis(10)),
            other => panic!("unexpected status {other:?}"),
        }
    }
    assert!(disconnected, "reset never observed");
    assert!(!manager.is_connected());

    let mut second = connect(addr);
    assert!(manager.wait_for_connection(WAIT));
    assert_eq!(manager.write(b"resume"), WriteStatus::Sent(6));

    let mut buf = [0u8; 6];
    second.read_exact(&mut buf).unwrap();
    assert_eq!(&buf, b"resume");

    manager.stop();
    manager.stop();
}

#[test]
fn test_bind_conflict_is_a_startup_error() {
    let taken = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = taken.local_addr().unwrap().port();

    let mut sink = Sink::new(SinkConfig {
        host: "127.0.0.1".into(),
        port,
        role: Role::Server,
        ..Default::default()
    })
    .unwrap();
    assert!(matches!(sink.start(), Err(IqtapError::Bind { .. })));
}

// ── Client role ──────────────────────────────────────────────────

#[test]
fn test_client_done_when_server_closes() {
    let server = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = server.local_addr().unwrap().port();

    let mut sink = Sink::new(SinkConfig {
        host: "127.0.0.1".into(),
        port,
        role: Role::Client,
        ..Default::default()
    })
    .unwrap();
    sink.start().unwrap();
    assert!(sink.transport().is_connected());

    let (accepted, _) = server.accept().unwrap();
    drop(accepted);

    let frame = empty_frame();
    let mut done = false;
    for _ in 0..100 {
        if sink.work(&frame) == WorkStatus::Done {
            done = true;
            break;
        }
        thread::sleep(Duration::from_millis(10));
    }
    assert!(done, "sink never reported end of stream");
    assert_eq!(sink.work(&frame), WorkStatus::Done);
    assert!(sink.stats().disconnects >= 1);
}

#[test]
fn test_client_receives_frame_flushes() {
    let server = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = server.local_addr().unwrap().port();

    let mut sink = Sink::new(SinkConfig {
        host: "127.0.0.1".into(),
        port,
        role: Role::Client,
        ..Default::default()
    })
    .unwrap();
    sink.start().unwrap();
    let (mut peer, _) = server.accept().unwrap();
    peer.set_read_timeout(Some(WAIT)).unwrap();

    let frame = empty_frame();
    let reader = thread::spawn(move || read_floats(&mut peer, frame_len()));
    sink.work(&frame);

    let received = reader.join().unwrap();
    assert_eq!(received.len(), frame.len());
    assert_eq!(received[0], 1.0);
    assert_eq!(sink.extractor().frames_completed(), 1);
}

fn frame_len() -> usize {
    PREAMBLE_LEN as usize + 1 + MEAN_VECTOR_LEN + 1
}

// ── Lifecycle ────────────────────────────────────────────────────

#[test]
fn test_stop_twice_then_drop() {
    let mut sink = server_sink();
    let client = connect(listen_addr(&sink));
    assert!(sink.transport().wait_for_connection(WAIT));

    sink.stop();
    sink.stop();
    assert!(sink.transport().phase().is_disconnected());
    assert!(sink.transport().local_addr().is_none());
    drop(client);
    drop(sink);
}

#[test]
fn test_tap_passes_stream_through() {
    let frame = empty_frame();
    let mut tap = Tap::new();
    let mut out = vec![Sample::default(); frame.len()];

    assert_eq!(tap.work(&frame, &mut out), frame.len());
    assert_eq!(out, frame);
    assert!(tap.take_milestones().contains(Milestones::EMPTY_FRAME));
    assert!(tap.take_milestones().is_empty());
    assert_eq!(tap.extractor().frames_completed(), 1);
}
