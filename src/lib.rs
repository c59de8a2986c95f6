//! `rft-over-udp` — reliable, ordered file transfer over a lossy UDP link.
//!
//! # Architecture
//!
//! ```text
//!  ┌──────────┐  SYN / DATA / FIN   ┌──────────┐
//!  │  Sender  │────────────────────▶│ Receiver │──▶ output file
//!  └────┬─────┘                     └─────┬────┘
//!       │                                 │
//!       │        cumulative ACKs          │
//!       │◀────────────────────────────────┘
//!       │
//!  ┌────▼────────────────────────────────┐
//!  │  AckListener (background task)      │
//!  │  reverse loss gate + ACK channel    │
//!  └────┬────────────────────────────────┘
//!       │ raw UDP datagrams
//!  ┌────▼──────┐
//!  │  Socket   │  (thin async wrapper around tokio UdpSocket)
//!  └───────────┘
//! ```
//!
//! Each module has a single responsibility:
//! - [`segment`]   — wire format (serialise / deserialise)
//! - [`seq`]       — 16-bit modular sequence arithmetic
//! - [`loss`]      — Bernoulli packet-loss gate for simulated impairment
//! - [`event_log`] — per-endpoint protocol event log file
//! - [`stats`]     — transfer counters and the trailing log summary
//! - [`state`]     — connection finite-state-machine types
//! - [`sender`]    — handshake, windowed Go-Back-N transmission, teardown
//! - [`ack`]       — sender-side ACK listener task and acknowledgment tracking
//! - [`receiver`]  — in-order reassembly and receive-side connection driver
//! - [`socket`]    — async UDP socket abstraction
//!
//! Both directions are deliberately lossy: every segment leaving the sender
//! passes a forward loss gate, and every acknowledgment is subjected to a
//! reverse gate before the sender's tracker sees it.  A dropped segment is
//! logged and silently absorbed; timeout and duplicate-ACK retransmission are
//! the only recovery mechanisms.

pub mod ack;
pub mod event_log;
pub mod loss;
pub mod receiver;
pub mod segment;
pub mod sender;
pub mod seq;
pub mod socket;
pub mod state;
pub mod stats;

/// Errors that abort a transfer endpoint.
///
/// Simulated loss is *not* an error; it surfaces only through the event log
/// and the retransmission machinery.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    /// Unrecoverable socket fault (bind, send, or receive failed).
    #[error("transport fault: {0}")]
    Socket(#[from] socket::SocketError),
    /// File or log I/O failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
