//! Connection finite-state-machine (FSM) types.
//!
//! The protocol uses a reduced TCP-like state diagram: one file per
//! connection means neither side ever re-opens, so the full RFC 793 set
//! collapses to a single path per endpoint.
//!
//! ```text
//!  sender:    CLOSED ──SYN──▶ SYN_SENT ──ACK──▶ ESTABLISHED ──FIN──▶ FIN_WAIT ──ACK──▶ CLOSED
//!  receiver:  LISTEN ──SYN──▶ ESTABLISHED ──FIN──▶ CLOSING ──grace──▶ CLOSED
//! ```
//!
//! Transitions are driven in [`crate::sender`] and [`crate::receiver`]; this
//! module only names the states.

/// All possible states of the connection FSM.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// No connection exists; the sender's initial and both sides' final state.
    #[default]
    Closed,
    /// SYN sent; waiting for its acknowledgment (sender only).
    SynSent,
    /// Waiting for a SYN (receiver's initial state).
    Listen,
    /// Handshake complete; data transfer in progress.
    Established,
    /// FIN sent; waiting for its acknowledgment (sender only).
    FinWait,
    /// FIN acknowledged; absorbing retransmitted FINs for the grace period
    /// (receiver only).
    Closing,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:?}")
    }
}
