//! Receive-side connection driver and in-order reassembly.
//!
//! The receiver is deliberately single-tasked: one loop blocks on the
//! socket, classifies each arriving segment, and replies with a cumulative
//! acknowledgment naming the next byte it expects.  Because the ACK always
//! carries the *current* expected cursor rather than echoing the segment, a
//! lost acknowledgment is implicitly recovered by the next one's higher
//! value.
//!
//! Reassembly keeps out-of-order payloads in a buffer keyed by start
//! sequence and flushes them to the output file the instant the expected
//! cursor reaches them, so the file on disk is always a correct prefix of
//! the source: no byte is ever written twice, none out of order.

use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use tokio::time::{timeout_at, Instant};

use crate::event_log::{Direction, EventLog};
use crate::segment::{Segment, SegmentKind};
use crate::seq;
use crate::socket::{Socket, SocketError};
use crate::state::ConnectionState;
use crate::stats::ReceiverStats;
use crate::TransferError;

/// How long the receiver keeps re-acknowledging duplicate FINs after the
/// first one, covering the case where its FIN-ACK was itself dropped.
pub const FIN_GRACE: Duration = Duration::from_secs(2);

// ---------------------------------------------------------------------------
// Reassembly
// ---------------------------------------------------------------------------

/// Outcome of feeding one DATA segment to [`Reassembly::on_data`].
#[derive(Debug, PartialEq, Eq)]
pub struct DataOutcome {
    /// `true` the first time this start sequence is seen, `false` on replay.
    pub fresh: bool,
    /// Bytes that became contiguous and must be persisted now, in order.
    pub delivered: Vec<u8>,
}

/// In-order reassembly state for one connection.
///
/// Invariant: every key in the pending buffer is strictly ahead of the
/// expected cursor.  Segments at the cursor are delivered immediately,
/// segments behind it are stale replays and contribute nothing but a
/// duplicate count.
#[derive(Debug)]
pub struct Reassembly {
    expected: u16,
    pending: HashMap<u16, Vec<u8>>,
    seen: HashSet<u16>,
}

impl Reassembly {
    /// Start expecting `expected` as the next in-order sequence number
    /// (`ISN + 1` after the handshake).
    pub fn new(expected: u16) -> Self {
        Self {
            expected,
            pending: HashMap::new(),
            seen: HashSet::new(),
        }
    }

    /// Cumulative acknowledgment value: the next byte expected in order.
    pub fn expected(&self) -> u16 {
        self.expected
    }

    /// Number of out-of-order segments currently buffered.
    pub fn pending_segments(&self) -> usize {
        self.pending.len()
    }

    /// Process one DATA segment.
    ///
    /// An in-order segment is delivered together with every pending segment
    /// it makes contiguous; an ahead-of-cursor segment is buffered
    /// (overwriting a duplicate entry); a behind-cursor segment is ignored.
    pub fn on_data(&mut self, start: u16, payload: &[u8]) -> DataOutcome {
        let fresh = self.seen.insert(start);

        let mut delivered = Vec::new();
        if start == self.expected {
            delivered.extend_from_slice(payload);
            self.expected = seq::advance(self.expected, payload.len());
            // Flush everything the new cursor position makes contiguous.
            while let Some(chunk) = self.pending.remove(&self.expected) {
                self.expected = seq::advance(self.expected, chunk.len());
                delivered.extend_from_slice(&chunk);
            }
        } else if seq::is_ahead(self.expected, start) {
            self.pending.insert(start, payload.to_vec());
        }
        // Behind the cursor: already consumed, nothing to store.

        DataOutcome { fresh, delivered }
    }
}

// ---------------------------------------------------------------------------
// Receiver
// ---------------------------------------------------------------------------

/// Receive-side configuration beyond the socket and peer address.
#[derive(Debug, Clone)]
pub struct ReceiverConfig {
    /// Destination file for the reassembled byte stream.
    pub output: PathBuf,
    /// Protocol event log file.
    pub log_path: PathBuf,
    /// Teardown grace interval; [`FIN_GRACE`] in production.
    pub grace: Duration,
}

/// Terminates the handshake, reassembles the byte stream, and persists it.
pub struct Receiver {
    socket: Socket,
    peer: SocketAddr,
    state: ConnectionState,
    reassembly: Option<Reassembly>,
    out: BufWriter<File>,
    acks_sent: HashSet<u16>,
    stats: ReceiverStats,
    log: EventLog,
    grace: Duration,
}

impl Receiver {
    /// Create the output and log files and a receiver ready to listen.
    ///
    /// Acknowledgments are addressed to `peer` (the sender's endpoint), not
    /// to the source address of arriving datagrams.
    pub fn new(socket: Socket, peer: SocketAddr, cfg: ReceiverConfig) -> Result<Self, TransferError> {
        let out = BufWriter::new(File::create(&cfg.output)?);
        let log = EventLog::create(&cfg.log_path)?;
        Ok(Self {
            socket,
            peer,
            state: ConnectionState::Listen,
            reassembly: None,
            out,
            acks_sent: HashSet::new(),
            stats: ReceiverStats::default(),
            log,
            grace: cfg.grace,
        })
    }

    /// Drive the connection from LISTEN to CLOSED.
    ///
    /// Returns the accumulated counters once the teardown grace period has
    /// elapsed and the output file is flushed.
    pub async fn run(mut self) -> Result<ReceiverStats, TransferError> {
        log::info!("listening on {}", self.socket.local_addr);

        loop {
            let segment = match self.socket.recv_from().await {
                Ok((segment, _)) => segment,
                Err(SocketError::Decode(e)) => {
                    log::debug!("ignoring undecodable datagram: {e}");
                    continue;
                }
                Err(e) => return Err(e.into()),
            };

            match segment.kind {
                SegmentKind::Syn => self.on_syn(segment.seq).await?,
                SegmentKind::Data => self.on_data(segment.seq, &segment.payload).await?,
                SegmentKind::Fin => {
                    self.on_fin(segment.seq).await?;
                    break;
                }
                SegmentKind::Ack => log::debug!("ignoring stray ACK {}", segment.seq),
            }
        }

        self.state = ConnectionState::Closed;
        log::info!("connection closed");
        self.out.flush()?;
        self.stats.write_summary(&self.log)?;
        self.log.flush()?;
        Ok(self.stats)
    }

    /// SYN: establish (first arrival) or re-acknowledge (replay).
    async fn on_syn(&mut self, syn_seq: u16) -> Result<(), TransferError> {
        self.log.mark_start();
        self.log.event(Direction::Received, SegmentKind::Syn, syn_seq, 0)?;

        let expected = seq::advance(syn_seq, 1);
        if self.state == ConnectionState::Listen {
            self.reassembly = Some(Reassembly::new(expected));
            self.state = ConnectionState::Established;
            log::info!("handshake complete, expecting seq {expected}");
        }
        // A duplicate SYN gets the same ACK again and changes nothing else.
        self.send_ack(expected).await
    }

    /// DATA: classify, deliver or buffer, acknowledge cumulatively.
    async fn on_data(&mut self, start: u16, payload: &[u8]) -> Result<(), TransferError> {
        self.log
            .event(Direction::Received, SegmentKind::Data, start, payload.len())?;

        let Some(reassembly) = self.reassembly.as_mut() else {
            log::warn!("DATA seq {start} before any SYN, ignoring");
            return Ok(());
        };

        let outcome = reassembly.on_data(start, payload);
        if outcome.fresh {
            self.stats.original_data_received += payload.len() as u64;
            self.stats.original_segments_received += 1;
        } else {
            self.stats.duplicate_data_segments += 1;
        }

        if !outcome.delivered.is_empty() {
            self.out.write_all(&outcome.delivered)?;
        }

        let ack = reassembly.expected();
        self.send_ack(ack).await
    }

    /// FIN: acknowledge, then absorb retransmitted FINs for the grace
    /// interval before closing.
    async fn on_fin(&mut self, fin_seq: u16) -> Result<(), TransferError> {
        self.log.event(Direction::Received, SegmentKind::Fin, fin_seq, 0)?;
        self.send_ack(seq::advance(fin_seq, 1)).await?;
        self.state = ConnectionState::Closing;
        log::info!("FIN received, absorbing retransmits for {:?}", self.grace);

        let deadline = Instant::now() + self.grace;
        loop {
            let segment = match timeout_at(deadline, self.socket.recv_from()).await {
                Err(_) => break, // grace over
                Ok(Ok((segment, _))) => segment,
                Ok(Err(SocketError::Decode(e))) => {
                    log::debug!("ignoring undecodable datagram: {e}");
                    continue;
                }
                Ok(Err(e)) => return Err(e.into()),
            };

            if segment.kind == SegmentKind::Fin {
                self.log
                    .event(Direction::Received, SegmentKind::Fin, segment.seq, 0)?;
                self.send_ack(seq::advance(segment.seq, 1)).await?;
            }
        }
        Ok(())
    }

    async fn send_ack(&mut self, ack: u16) -> Result<(), TransferError> {
        let segment = Segment::control(SegmentKind::Ack, ack);
        self.socket.send_to(&segment, self.peer).await?;
        if !self.acks_sent.insert(ack) {
            self.stats.duplicate_acks_sent += 1;
        }
        self.log.event(Direction::Sent, SegmentKind::Ack, ack, 0)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
