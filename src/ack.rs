//! Sender-side acknowledgment listening and tracking.
//!
//! Two pieces cooperate here:
//!
//! - [`AckListener`] — a background task that drains inbound datagrams for
//!   the whole connection lifetime, applies the reverse-direction loss gate,
//!   logs each surviving or dropped ACK, and forwards survivors over an
//!   unbounded channel.
//! - [`AckTracker`] — the acknowledgment state consulted by the sender's
//!   main loop: last observed value, consecutive-duplicate run, and
//!   per-value byte accounting.
//!
//! All mutable state is owned by exactly one task.  The listener owns
//! nothing but its drop counter; the tracker lives in the main loop and is
//! fed exclusively by draining the channel, so no field is ever shared
//! mutably across tasks.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::event_log::{Direction, EventLog};
use crate::loss::LossGate;
use crate::segment::SegmentKind;
use crate::seq;
use crate::socket::{Socket, SocketError};
use crate::stats::SenderStats;

// ---------------------------------------------------------------------------
// AckTracker
// ---------------------------------------------------------------------------

/// Acknowledgment state owned by the sender's main loop.
#[derive(Debug, Default)]
pub struct AckTracker {
    /// Most recent acknowledgment value that was equal to or ahead of every
    /// value seen before it.  `None` until the first ACK survives the gate.
    last_ack: Option<u16>,
    /// How many times `last_ack` has repeated exactly since it was last
    /// advanced or consumed by a fast retransmit.
    dup_run: u32,
    /// Every acknowledgment value ever observed, for duplicate accounting.
    seen: HashSet<u16>,
    /// Payload bytes each pending acknowledgment value stands for, recorded
    /// when the corresponding DATA segment is actually transmitted.
    pending_bytes: HashMap<u16, usize>,
}

impl AckTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that an actually-transmitted DATA segment ends at `end_seq`
    /// and carried `len` payload bytes.
    pub fn record_sent(&mut self, end_seq: u16, len: usize) {
        self.pending_bytes.insert(end_seq, len);
    }

    /// Fold one surviving acknowledgment into the tracked state, updating
    /// the duplicate and acked-byte counters in `stats`.
    pub fn observe(&mut self, ack: u16, stats: &mut SenderStats) {
        if self.seen.insert(ack) {
            let bytes = self.pending_bytes.get(&ack).copied().unwrap_or(0);
            stats.original_data_acked += bytes as u64;
        } else {
            stats.duplicate_acks_received += 1;
        }

        match self.last_ack {
            None => self.last_ack = Some(ack),
            Some(prev) if prev == ack => self.dup_run += 1,
            Some(prev) if seq::is_ahead(prev, ack) => {
                self.dup_run = 0;
                self.last_ack = Some(ack);
            }
            // Behind the tracked value: a stale straggler, ignore.
            Some(_) => {}
        }
    }

    /// Latest tracked acknowledgment value.
    pub fn last_ack(&self) -> Option<u16> {
        self.last_ack
    }

    /// `true` once the tracked value has reached or passed `target`.
    pub fn reached(&self, target: u16) -> bool {
        matches!(self.last_ack, Some(a) if a == target || seq::is_ahead(target, a))
    }

    /// Consume a pending fast-retransmit trigger.
    ///
    /// Returns `true` when three or more consecutive duplicates have
    /// accumulated, and resets the run so one loss event triggers one
    /// retransmission burst rather than a storm.
    pub fn take_triple_duplicate(&mut self) -> bool {
        if self.dup_run >= 3 {
            self.dup_run = 0;
            true
        } else {
            false
        }
    }
}

// ---------------------------------------------------------------------------
// AckListener
// ---------------------------------------------------------------------------

/// Handle to the background acknowledgment listener task.
pub struct AckListener {
    handle: JoinHandle<u64>,
    shutdown: watch::Sender<bool>,
}

impl AckListener {
    /// Spawn the listener on `socket`.
    ///
    /// Returns the channel of surviving acknowledgment values together with
    /// the handle used to stop the task at teardown.
    pub fn spawn(
        socket: Arc<Socket>,
        gate: LossGate,
        log: Arc<EventLog>,
    ) -> (mpsc::UnboundedReceiver<u16>, AckListener) {
        let (tx, rx) = mpsc::unbounded_channel();
        let (shutdown, stop_rx) = watch::channel(false);
        let handle = tokio::spawn(listen(socket, gate, log, tx, stop_rx));
        (rx, AckListener { handle, shutdown })
    }

    /// Signal the task to stop and wait for it to finish.
    ///
    /// Returns the number of acknowledgments the reverse loss gate dropped.
    pub async fn stop(self) -> u64 {
        let _ = self.shutdown.send(true);
        self.handle.await.unwrap_or(0)
    }
}

/// Listener body: drain inbound ACKs until told to stop.
async fn listen(
    socket: Arc<Socket>,
    mut gate: LossGate,
    log: Arc<EventLog>,
    tx: mpsc::UnboundedSender<u16>,
    mut stop_rx: watch::Receiver<bool>,
) -> u64 {
    let mut dropped = 0u64;
    loop {
        tokio::select! {
            _ = stop_rx.changed() => break,
            result = socket.recv_from() => match result {
                Ok((segment, _)) if segment.kind == SegmentKind::Ack => {
                    if gate.should_drop() {
                        dropped += 1;
                        let _ = log.event(Direction::Dropped, SegmentKind::Ack, segment.seq, 0);
                        log::debug!("reverse gate dropped ACK {}", segment.seq);
                    } else {
                        let _ = log.event(Direction::Received, SegmentKind::Ack, segment.seq, 0);
                        if tx.send(segment.seq).is_err() {
                            break; // main loop gone
                        }
                    }
                }
                Ok((segment, _)) => {
                    log::debug!("listener ignoring stray {} segment", segment.kind);
                }
                Err(SocketError::Decode(e)) => {
                    log::debug!("listener ignoring undecodable datagram: {e}");
                }
                Err(e) => {
                    // A receive failing after the shutdown signal is the
                    // normal way the task learns the socket went away.
                    if !*stop_rx.borrow() {
                        log::warn!("ack listener socket error: {e}");
                    }
                    break;
                }
            }
        }
    }
    dropped
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
