//! Per-endpoint protocol event log.
//!
//! Each endpoint appends one line per protocol-visible event — including
//! simulated drops — to its own log file, followed at connection end by a
//! block of summary counter lines.  The file is truncated and recreated at
//! each run.
//!
//! Line format: `<dir> <secs>.<millis> <TYPE> <seqNo> <length>`, where `dir`
//! is `snd`, `rcv`, or `drp` and the timestamp is elapsed time since the
//! connection start mark.
//!
//! The log is internally synchronised so the sender's main loop and its ACK
//! listener task can share one handle behind an `Arc`.

use std::fmt;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::sync::{Mutex, OnceLock};

use tokio::time::Instant;

use crate::segment::SegmentKind;

/// Which way a logged segment went, from the logging endpoint's view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Segment handed to the transport.
    Sent,
    /// Segment delivered by the transport and kept.
    Received,
    /// Segment discarded by a loss gate; never reached the wire (forward
    /// direction) or the tracker (reverse direction).
    Dropped,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self {
            Self::Sent => "snd",
            Self::Received => "rcv",
            Self::Dropped => "drp",
        };
        f.write_str(tag)
    }
}

/// Append-only chronological event record plus the final counter summary.
#[derive(Debug)]
pub struct EventLog {
    out: Mutex<BufWriter<File>>,
    started: OnceLock<Instant>,
}

impl EventLog {
    /// Create (truncating) the log file at `path`.
    pub fn create(path: &Path) -> io::Result<Self> {
        let file = File::create(path)?;
        Ok(Self {
            out: Mutex::new(BufWriter::new(file)),
            started: OnceLock::new(),
        })
    }

    /// Anchor the elapsed-time clock at "now".
    ///
    /// The first call wins; repeats (a retransmitted SYN, say) are ignored so
    /// timestamps stay monotonic from the original connection start.
    pub fn mark_start(&self) {
        let _ = self.started.set(Instant::now());
    }

    /// Append one event line.
    pub fn event(
        &self,
        dir: Direction,
        kind: SegmentKind,
        seq: u16,
        len: usize,
    ) -> io::Result<()> {
        let elapsed = self
            .started
            .get()
            .map(|start| start.elapsed())
            .unwrap_or_default();
        let ms = elapsed.as_millis();
        let mut out = self.lock()?;
        writeln!(out, "{dir} {}.{:03} {kind} {seq} {len}", ms / 1000, ms % 1000)
    }

    /// Append the trailing summary block, one `label: value` line each.
    pub fn summary(&self, lines: &[(&str, u64)]) -> io::Result<()> {
        let mut out = self.lock()?;
        for (label, value) in lines {
            writeln!(out, "{label}: {value}")?;
        }
        Ok(())
    }

    /// Flush buffered lines to disk.
    pub fn flush(&self) -> io::Result<()> {
        self.lock()?.flush()
    }

    fn lock(&self) -> io::Result<std::sync::MutexGuard<'_, BufWriter<File>>> {
        self.out
            .lock()
            .map_err(|_| io::Error::other("event log writer poisoned"))
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lines_follow_the_event_format() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.txt");
        let log = EventLog::create(&path).unwrap();
        log.mark_start();
        log.event(Direction::Sent, SegmentKind::Syn, 4321, 0).unwrap();
        log.event(Direction::Dropped, SegmentKind::Data, 4322, 1000)
            .unwrap();
        log.event(Direction::Received, SegmentKind::Ack, 5322, 0)
            .unwrap();
        log.flush().unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);

        let fields: Vec<&str> = lines[0].split_whitespace().collect();
        assert_eq!(fields[0], "snd");
        assert!(fields[1].contains('.'), "timestamp must be secs.millis");
        assert_eq!(fields[2], "SYN");
        assert_eq!(fields[3], "4321");
        assert_eq!(fields[4], "0");

        assert!(lines[1].starts_with("drp"));
        assert!(lines[1].ends_with("DATA 4322 1000"));
        assert!(lines[2].starts_with("rcv"));
    }

    #[test]
    fn millis_field_is_zero_padded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.txt");
        let log = EventLog::create(&path).unwrap();
        log.mark_start();
        log.event(Direction::Sent, SegmentKind::Ack, 1, 0).unwrap();
        log.flush().unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let stamp = text.split_whitespace().nth(1).unwrap();
        let (_, millis) = stamp.split_once('.').unwrap();
        assert_eq!(millis.len(), 3, "millis must be three digits, got {stamp}");
    }

    #[test]
    fn summary_block_follows_events() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.txt");
        let log = EventLog::create(&path).unwrap();
        log.mark_start();
        log.event(Direction::Sent, SegmentKind::Fin, 9, 0).unwrap();
        log.summary(&[("Original data sent", 4000), ("Retransmitted segments", 2)])
            .unwrap();
        log.flush().unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[1], "Original data sent: 4000");
        assert_eq!(lines[2], "Retransmitted segments: 2");
    }

    #[test]
    fn create_truncates_a_previous_run() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.txt");
        std::fs::write(&path, "stale contents\n").unwrap();
        let log = EventLog::create(&path).unwrap();
        log.flush().unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "");
    }
}
