//! Protocol-conformance tests driving a [`Receiver`] with a hand-scripted
//! peer.
//!
//! Instead of a full Sender, each test speaks raw segments through a bare
//! socket so it can force exact arrival orders, replays, and teardown timing
//! and assert on every acknowledgment value the receiver produces.

use std::net::SocketAddr;
use std::time::Duration;

use rft_over_udp::receiver::{Receiver, ReceiverConfig};
use rft_over_udp::segment::{Segment, SegmentKind};
use rft_over_udp::socket::Socket;
use rft_over_udp::stats::ReceiverStats;
use tokio::task::JoinHandle;

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

struct Session {
    peer: Socket,
    receiver_addr: SocketAddr,
    receiver_task: JoinHandle<Result<ReceiverStats, rft_over_udp::TransferError>>,
    out_path: std::path::PathBuf,
    _dir: tempfile::TempDir,
}

/// Start a receiver with the given grace interval and a raw peer socket.
async fn start_session(grace: Duration) -> Session {
    let dir = tempfile::tempdir().expect("tempdir");
    let out_path = dir.path().join("out.bin");

    let recv_socket = Socket::bind("127.0.0.1:0".parse().unwrap())
        .await
        .expect("bind receiver");
    let peer = Socket::bind("127.0.0.1:0".parse().unwrap())
        .await
        .expect("bind peer");
    let receiver_addr = recv_socket.local_addr;

    let receiver = Receiver::new(
        recv_socket,
        peer.local_addr,
        ReceiverConfig {
            output: out_path.clone(),
            log_path: dir.path().join("receiver_log.txt"),
            grace,
        },
    )
    .expect("receiver setup");

    Session {
        peer,
        receiver_addr,
        receiver_task: tokio::spawn(receiver.run()),
        out_path,
        _dir: dir,
    }
}

impl Session {
    async fn send(&self, segment: Segment) {
        self.peer
            .send_to(&segment, self.receiver_addr)
            .await
            .expect("send segment");
    }

    /// Wait for the next ACK from the receiver and return its value.
    async fn expect_ack(&self) -> u16 {
        let (segment, _) = tokio::time::timeout(Duration::from_secs(2), self.peer.recv_from())
            .await
            .expect("timed out waiting for ACK")
            .expect("recv ACK");
        assert_eq!(segment.kind, SegmentKind::Ack);
        segment.seq
    }

    /// Wait for the receiver to close and return its stats.
    async fn finish(self) -> (ReceiverStats, Vec<u8>) {
        let stats = tokio::time::timeout(Duration::from_secs(5), self.receiver_task)
            .await
            .expect("receiver did not close")
            .expect("receiver task panicked")
            .expect("receiver failed");
        let output = std::fs::read(&self.out_path).expect("read output");
        (stats, output)
    }
}

// ---------------------------------------------------------------------------
// Test 1: duplicate FIN inside the grace window is re-acknowledged
// ---------------------------------------------------------------------------

#[tokio::test]
async fn duplicate_fin_within_grace_is_reacked() {
    let session = start_session(Duration::from_millis(600)).await;

    session.send(Segment::control(SegmentKind::Syn, 100)).await;
    assert_eq!(session.expect_ack().await, 101);

    session.send(Segment::data(101, b"hello".to_vec())).await;
    assert_eq!(session.expect_ack().await, 106);

    session.send(Segment::control(SegmentKind::Fin, 106)).await;
    assert_eq!(session.expect_ack().await, 107);

    // The FIN-ACK "was lost": the peer retransmits FIN inside the grace
    // window and must get the same acknowledgment again.
    session.send(Segment::control(SegmentKind::Fin, 106)).await;
    assert_eq!(session.expect_ack().await, 107);

    let (stats, output) = session.finish().await;
    assert_eq!(output, b"hello");
    assert!(stats.duplicate_acks_sent >= 1);
}

// ---------------------------------------------------------------------------
// Test 2: receiver closes once the grace window lapses
// ---------------------------------------------------------------------------

#[tokio::test]
async fn receiver_closes_after_grace_expires() {
    let session = start_session(Duration::from_millis(200)).await;

    session.send(Segment::control(SegmentKind::Syn, 0)).await;
    assert_eq!(session.expect_ack().await, 1);
    session.send(Segment::control(SegmentKind::Fin, 1)).await;
    assert_eq!(session.expect_ack().await, 2);

    // No further traffic: run() must return shortly after the grace lapses
    // rather than waiting for more FINs forever.
    let (_, output) = session.finish().await;
    assert!(output.is_empty());
}

// ---------------------------------------------------------------------------
// Test 3: replayed DATA counts one duplicate and writes no extra bytes
// ---------------------------------------------------------------------------

#[tokio::test]
async fn replayed_data_counts_once_and_writes_once() {
    let session = start_session(Duration::from_millis(200)).await;

    session.send(Segment::control(SegmentKind::Syn, 0)).await;
    assert_eq!(session.expect_ack().await, 1);

    session.send(Segment::data(1, b"abc".to_vec())).await;
    assert_eq!(session.expect_ack().await, 4);

    // Exact replay: cumulative ACK is unchanged and the bytes are not
    // appended a second time.
    session.send(Segment::data(1, b"abc".to_vec())).await;
    assert_eq!(session.expect_ack().await, 4);

    session.send(Segment::control(SegmentKind::Fin, 4)).await;
    assert_eq!(session.expect_ack().await, 5);

    let (stats, output) = session.finish().await;
    assert_eq!(output, b"abc");
    assert_eq!(stats.original_segments_received, 1);
    assert_eq!(stats.duplicate_data_segments, 1);
}

// ---------------------------------------------------------------------------
// Test 4: duplicate SYN is answered idempotently
// ---------------------------------------------------------------------------

#[tokio::test]
async fn duplicate_syn_is_reacked_without_resetting() {
    let session = start_session(Duration::from_millis(200)).await;

    session.send(Segment::control(SegmentKind::Syn, 500)).await;
    assert_eq!(session.expect_ack().await, 501);

    session.send(Segment::data(501, b"xy".to_vec())).await;
    assert_eq!(session.expect_ack().await, 503);

    // The handshake ACK "was lost": a replayed SYN gets the same reply but
    // must not disturb the advanced cursor.
    session.send(Segment::control(SegmentKind::Syn, 500)).await;
    assert_eq!(session.expect_ack().await, 501);

    session.send(Segment::data(503, b"z".to_vec())).await;
    assert_eq!(session.expect_ack().await, 504);

    session.send(Segment::control(SegmentKind::Fin, 504)).await;
    assert_eq!(session.expect_ack().await, 505);

    let (_, output) = session.finish().await;
    assert_eq!(output, b"xyz");
}

// ---------------------------------------------------------------------------
// Test 5: out-of-order arrival across the sequence wrap point
// ---------------------------------------------------------------------------

#[tokio::test]
async fn out_of_order_arrival_reassembles_across_wraparound() {
    let session = start_session(Duration::from_millis(200)).await;

    // ISN close to the top of the space so the stream wraps mid-transfer.
    session.send(Segment::control(SegmentKind::Syn, 65000)).await;
    assert_eq!(session.expect_ack().await, 65001);

    let a = vec![1u8; 1000]; // seq 65001
    let b = vec![2u8; 1000]; // seq   465 (65001 + 1000 mod 65536)
    let c = vec![3u8; 1000]; // seq  1465

    // Last chunk first: buffered, cumulative ACK stays at the cursor.
    session.send(Segment::data(1465, c.clone())).await;
    assert_eq!(session.expect_ack().await, 65001);

    // First chunk: delivered, but the middle is still missing.
    session.send(Segment::data(65001, a.clone())).await;
    assert_eq!(session.expect_ack().await, 465);

    // Middle chunk: flushes itself and the buffered tail in one step.
    session.send(Segment::data(465, b.clone())).await;
    assert_eq!(session.expect_ack().await, 2465);

    session.send(Segment::control(SegmentKind::Fin, 2465)).await;
    assert_eq!(session.expect_ack().await, 2466);

    let (stats, output) = session.finish().await;
    let mut expected = a;
    expected.extend(b);
    expected.extend(c);
    assert_eq!(output, expected);
    assert_eq!(stats.original_segments_received, 3);
    assert_eq!(stats.duplicate_data_segments, 0);
}
