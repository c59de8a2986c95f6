//! Send-side connection driver: handshake, windowed Go-Back-N transmission,
//! and teardown.
//!
//! The sender runs two concurrent activities over one shared socket: this
//! module's main loop and the [`crate::ack`] listener task.  The listener is
//! the only reader of the socket's inbound side; the main loop is the only
//! writer of acknowledgment state, fed by draining the listener's channel
//! inside a deadline-bounded wait.
//!
//! # Window and recovery
//!
//! The file is transmitted in windows of at most `max_window` bytes, sliced
//! into segments of at most [`MAX_PAYLOAD`] bytes.  Every segment records the
//! file offset its sequence number stands for, so any acknowledgment value
//! can be mapped back to a resume point.  After each window the sender waits
//! for an acknowledgment:
//!
//! - ACK ahead of the cursor — the receiver flushed buffered out-of-order
//!   data past us; adopt the value and jump forward.
//! - ACK behind the cursor — loss; rewind to the acknowledged value and
//!   resend everything from there (Go-Back-N).
//! - Wait satisfied early by three consecutive duplicate ACKs (fast
//!   retransmit) or by the acknowledgment reaching the just-sent cursor;
//!   otherwise the configured timer bounds it.

use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tokio::sync::mpsc;
use tokio::time::{timeout_at, Instant};

use crate::ack::{AckListener, AckTracker};
use crate::event_log::{Direction, EventLog};
use crate::loss::LossGate;
use crate::segment::{Segment, SegmentKind, MAX_PAYLOAD};
use crate::seq;
use crate::socket::Socket;
use crate::state::ConnectionState;
use crate::stats::SenderStats;
use crate::TransferError;

/// FIN retransmission attempts before the sender closes regardless.
const MAX_FIN_ATTEMPTS: u32 = 10;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Send-side configuration beyond the socket and peer address.
pub struct SenderConfig {
    /// Transmission window budget in bytes (a positive multiple of 1000).
    pub max_window: usize,
    /// Retransmission timer: the bound on every acknowledgment wait.
    pub timer: Duration,
    /// Loss gate applied to every outbound SYN/DATA/FIN.
    pub forward_loss: LossGate,
    /// Loss gate applied to every inbound acknowledgment.
    pub reverse_loss: LossGate,
    /// Protocol event log file.
    pub log_path: PathBuf,
}

// ---------------------------------------------------------------------------
// Sender
// ---------------------------------------------------------------------------

/// Initiates the connection, pushes the file through the window machinery,
/// and tears the connection down.
pub struct Sender {
    socket: Arc<Socket>,
    peer: SocketAddr,
    state: ConnectionState,
    /// Next sequence number to place on the wire.
    cursor: u16,
    file: Vec<u8>,
    /// Sequence value → file offset it stands for, recorded for every
    /// segment the window machinery produces (dropped ones included — loss
    /// must stay invisible to the bookkeeping).
    offset_index: HashMap<u16, usize>,
    /// Highest file offset any segment has reached; rewind fallback when an
    /// acknowledgment has no exact index entry.
    max_offset: usize,
    /// Start sequences that have actually been transmitted at least once.
    transmitted: HashSet<u16>,
    tracker: AckTracker,
    stats: SenderStats,
    forward_loss: LossGate,
    timer: Duration,
    max_window: usize,
    log: Arc<EventLog>,
    ack_rx: mpsc::UnboundedReceiver<u16>,
    listener: Option<AckListener>,
}

impl Sender {
    /// Create the event log, spawn the acknowledgment listener, and pick a
    /// random initial sequence number.
    ///
    /// Must be called within a tokio runtime.
    pub fn new(
        socket: Socket,
        peer: SocketAddr,
        file: Vec<u8>,
        cfg: SenderConfig,
    ) -> Result<Self, TransferError> {
        let socket = Arc::new(socket);
        let log = Arc::new(EventLog::create(&cfg.log_path)?);
        let (ack_rx, listener) =
            AckListener::spawn(Arc::clone(&socket), cfg.reverse_loss, Arc::clone(&log));

        Ok(Self {
            socket,
            peer,
            state: ConnectionState::Closed,
            cursor: rand::rng().random::<u16>(),
            file,
            offset_index: HashMap::new(),
            max_offset: 0,
            transmitted: HashSet::new(),
            tracker: AckTracker::new(),
            stats: SenderStats::default(),
            forward_loss: cfg.forward_loss,
            timer: cfg.timer,
            max_window: cfg.max_window,
            log,
            ack_rx,
            listener: Some(listener),
        })
    }

    /// Drive the whole connection: handshake, transfer, teardown.
    ///
    /// Returns the final counters after the summary block is written.
    pub async fn run(mut self) -> Result<SenderStats, TransferError> {
        self.handshake().await?;
        self.transmit_file().await?;
        self.teardown().await?;

        if let Some(listener) = self.listener.take() {
            self.stats.ack_segments_dropped = listener.stop().await;
        }
        // Acknowledgments that arrived after the last wait still count.
        while let Ok(ack) = self.ack_rx.try_recv() {
            self.tracker.observe(ack, &mut self.stats);
        }

        self.stats.write_summary(&self.log)?;
        self.log.flush()?;
        Ok(self.stats)
    }

    // -----------------------------------------------------------------------
    // Handshake
    // -----------------------------------------------------------------------

    /// Send SYN until its acknowledgment arrives.  Retries are unbounded:
    /// with any loss probability below 1 the handshake completes eventually.
    async fn handshake(&mut self) -> Result<(), TransferError> {
        self.state = ConnectionState::SynSent;
        self.log.mark_start();

        let isn = self.cursor;
        let expected = seq::advance(isn, 1);
        log::info!("connecting to {} with isn {isn}", self.peer);

        while !self.tracker.reached(expected) {
            if self.forward_loss.should_drop() {
                self.log.event(Direction::Dropped, SegmentKind::Syn, isn, 0)?;
            } else {
                self.socket
                    .send_to(&Segment::control(SegmentKind::Syn, isn), self.peer)
                    .await?;
                self.log.event(Direction::Sent, SegmentKind::Syn, isn, 0)?;
            }
            self.wait_for_ack(expected).await;
        }

        self.cursor = expected;
        self.state = ConnectionState::Established;
        log::info!("connection established");
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Windowed transmission
    // -----------------------------------------------------------------------

    /// Transmit the file in `max_window`-byte windows with Go-Back-N
    /// recovery until every byte is acknowledged past.
    async fn transmit_file(&mut self) -> Result<(), TransferError> {
        debug_assert_eq!(self.state, ConnectionState::Established);
        let len = self.file.len();
        let mut offset = 0usize;

        while offset < len {
            // Fill one window.
            let mut budget = 0usize;
            while budget < self.max_window && offset < len {
                let seg_len = MAX_PAYLOAD.min(len - offset);
                budget += seg_len;

                self.offset_index.insert(self.cursor, offset);
                if self.forward_loss.should_drop() {
                    self.stats.data_segments_dropped += 1;
                    self.log
                        .event(Direction::Dropped, SegmentKind::Data, self.cursor, seg_len)?;
                } else {
                    self.send_data(offset, seg_len).await?;
                }

                self.cursor = seq::advance(self.cursor, seg_len);
                offset += seg_len;
                if offset > self.max_offset {
                    self.max_offset = offset;
                }
            }

            // Window exhausted: wait, then advance or go back.
            let Some(ack) = self.wait_for_ack(self.cursor).await else {
                continue;
            };

            if seq::is_ahead(self.cursor, ack) {
                // Receiver flushed buffered data past us; jump forward.
                self.cursor = ack;
                offset = self.resume_offset(ack);
                log::debug!("ack {ack} ahead of cursor, resuming at offset {offset}");
            } else if seq::is_ahead(ack, self.cursor) {
                // Acknowledgment lags: go back to it and resend onward.
                self.cursor = ack;
                offset = self.resume_offset(ack);
                log::debug!("going back to seq {ack} (offset {offset})");
            }
        }
        Ok(())
    }

    /// Transmit one DATA segment and do the per-send bookkeeping.
    async fn send_data(&mut self, offset: usize, len: usize) -> Result<(), TransferError> {
        let payload = self.file[offset..offset + len].to_vec();
        let segment = Segment::data(self.cursor, payload);
        self.socket.send_to(&segment, self.peer).await?;

        self.tracker.record_sent(seq::advance(self.cursor, len), len);
        if self.transmitted.insert(self.cursor) {
            self.stats.original_data_sent += len as u64;
            self.stats.original_segments_sent += 1;
        } else {
            self.stats.retransmitted_segments += 1;
        }

        self.log
            .event(Direction::Sent, SegmentKind::Data, self.cursor, len)?;
        Ok(())
    }

    /// File offset to resume from after adopting acknowledgment `ack`.
    fn resume_offset(&self, ack: u16) -> usize {
        resume_offset(&self.offset_index, ack, self.max_offset)
    }

    // -----------------------------------------------------------------------
    // Teardown
    // -----------------------------------------------------------------------

    /// Send FIN until acknowledged, bounded by [`MAX_FIN_ATTEMPTS`]; close
    /// regardless once the attempts run out.
    async fn teardown(&mut self) -> Result<(), TransferError> {
        debug_assert_eq!(self.state, ConnectionState::Established);
        self.state = ConnectionState::FinWait;
        let fin_seq = self.cursor;
        let expected = seq::advance(fin_seq, 1);

        let mut attempts = MAX_FIN_ATTEMPTS;
        while attempts > 0 && !self.tracker.reached(expected) {
            if self.forward_loss.should_drop() {
                self.log.event(Direction::Dropped, SegmentKind::Fin, fin_seq, 0)?;
            } else {
                self.socket
                    .send_to(&Segment::control(SegmentKind::Fin, fin_seq), self.peer)
                    .await?;
                self.log.event(Direction::Sent, SegmentKind::Fin, fin_seq, 0)?;
            }
            self.wait_for_ack(expected).await;
            attempts -= 1;
        }

        if self.tracker.reached(expected) {
            log::info!("teardown acknowledged");
        } else {
            log::warn!("FIN unacknowledged after {MAX_FIN_ATTEMPTS} attempts, closing anyway");
        }
        self.state = ConnectionState::Closed;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Acknowledgment wait
    // -----------------------------------------------------------------------

    /// Block until a qualifying acknowledgment or the timer, whichever comes
    /// first, and return the latest tracked value.
    ///
    /// Qualifying means: three consecutive duplicates observed (fast
    /// retransmit), or the tracked acknowledgment reaching or passing
    /// `target`.  On timeout the last tracked value is returned unchanged,
    /// which sends the caller down the Go-Back-N path.
    async fn wait_for_ack(&mut self, target: u16) -> Option<u16> {
        let deadline = Instant::now() + self.timer;
        loop {
            if self.tracker.take_triple_duplicate() {
                log::debug!("triple duplicate ack, fast retransmit");
                return self.tracker.last_ack();
            }
            if self.tracker.reached(target) {
                return self.tracker.last_ack();
            }
            match timeout_at(deadline, self.ack_rx.recv()).await {
                Ok(Some(ack)) => self.tracker.observe(ack, &mut self.stats),
                // Channel closed (listener died) or timer elapsed.
                Ok(None) | Err(_) => return self.tracker.last_ack(),
            }
        }
    }
}

/// Map an acknowledgment value to the file offset recorded for it, falling
/// back to the highest offset reached when no exact entry exists (the
/// acknowledgment naming the end of everything sent so far has no segment
/// starting there).
fn resume_offset(index: &HashMap<u16, usize>, ack: u16, max_offset: usize) -> usize {
    index.get(&ack).copied().unwrap_or(max_offset)
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
