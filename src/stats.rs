//! Transfer statistics counters.
//!
//! Counters increment monotonically over the connection lifetime and are
//! emitted exactly once, as the trailing summary block of the endpoint's
//! event log, after teardown.

use std::io;

use crate::event_log::EventLog;

/// Send-side counters.
///
/// A segment counts as *original* the first time its start sequence is
/// actually transmitted and as a *retransmission* on every later
/// transmission of that sequence; gated-out segments touch only the drop
/// counter.  An acknowledgment value counts as a *duplicate* from its second
/// observation onward.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SenderStats {
    pub original_data_sent: u64,
    pub original_data_acked: u64,
    pub original_segments_sent: u64,
    pub retransmitted_segments: u64,
    pub duplicate_acks_received: u64,
    pub data_segments_dropped: u64,
    pub ack_segments_dropped: u64,
}

impl SenderStats {
    /// Write the sender summary block to `log`.
    pub fn write_summary(&self, log: &EventLog) -> io::Result<()> {
        log.summary(&[
            ("Original data sent", self.original_data_sent),
            ("Original data acked", self.original_data_acked),
            ("Original segments sent", self.original_segments_sent),
            ("Retransmitted segments", self.retransmitted_segments),
            ("Dup acks received", self.duplicate_acks_received),
            ("Data segments dropped", self.data_segments_dropped),
            ("Ack segments dropped", self.ack_segments_dropped),
        ])
    }
}

/// Receive-side counters.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReceiverStats {
    pub original_data_received: u64,
    pub original_segments_received: u64,
    pub duplicate_data_segments: u64,
    pub duplicate_acks_sent: u64,
}

impl ReceiverStats {
    /// Write the receiver summary block to `log`.
    pub fn write_summary(&self, log: &EventLog) -> io::Result<()> {
        log.summary(&[
            ("Original data received", self.original_data_received),
            ("Original segments received", self.original_segments_received),
            ("Dup data segments received", self.duplicate_data_segments),
            ("Dup ack segments sent", self.duplicate_acks_sent),
        ])
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sender_summary_labels_and_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.txt");
        let log = EventLog::create(&path).unwrap();
        let stats = SenderStats {
            original_data_sent: 5000,
            original_data_acked: 5000,
            original_segments_sent: 5,
            retransmitted_segments: 2,
            duplicate_acks_received: 3,
            data_segments_dropped: 1,
            ack_segments_dropped: 1,
        };
        stats.write_summary(&log).unwrap();
        log.flush().unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            lines,
            vec![
                "Original data sent: 5000",
                "Original data acked: 5000",
                "Original segments sent: 5",
                "Retransmitted segments: 2",
                "Dup acks received: 3",
                "Data segments dropped: 1",
                "Ack segments dropped: 1",
            ]
        );
    }

    #[test]
    fn receiver_summary_labels_and_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.txt");
        let log = EventLog::create(&path).unwrap();
        let stats = ReceiverStats {
            original_data_received: 3000,
            original_segments_received: 3,
            duplicate_data_segments: 1,
            duplicate_acks_sent: 2,
        };
        stats.write_summary(&log).unwrap();
        log.flush().unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            lines,
            vec![
                "Original data received: 3000",
                "Original segments received: 3",
                "Dup data segments received: 1",
                "Dup ack segments sent: 2",
            ]
        );
    }
}
