//! Wire-format definitions for protocol segments.
//!
//! Every datagram exchanged between peers is a [`Segment`].  This module is
//! responsible for:
//! - Defining the on-wire binary layout (type, sequence number, payload).
//! - Serialising a [`Segment`] into a byte buffer ready for transmission.
//! - Deserialising a raw byte slice back into a [`Segment`], returning errors
//!   for malformed or truncated input.
//!
//! No I/O happens here — this is pure data transformation.
//!
//! # Wire format
//!
//! All multi-byte integers are **big-endian**.
//!
//! ```text
//!  0               1               2               3
//!  0 1 2 3 4 5 6 7 0 1 2 3 4 5 6 7 0 1 2 3 4 5 6 7 0 1 2 3 4 5 6 7
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |             Type              |        Sequence Number        |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                        Payload (DATA only) ...                |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! ```
//!
//! Total header size: [`HEADER_LEN`] = 4 bytes (type 2 + seqNo 2).  Only DATA
//! segments carry a payload, at most [`MAX_PAYLOAD`] bytes of it.

use std::fmt;

use thiserror::Error;

/// Byte length of the fixed-size header on the wire.
pub const HEADER_LEN: usize = 4;

/// Maximum payload bytes a DATA segment may carry.
pub const MAX_PAYLOAD: usize = 1000;

// Byte offsets of each field within the serialised header.
const OFF_KIND: usize = 0;
const OFF_SEQ: usize = 2;

/// Segment type discriminant as it appears on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SegmentKind {
    /// Carries file bytes; the only kind with a payload.
    Data = 0,
    /// Cumulative acknowledgment; `seq` names the next byte expected.
    Ack = 1,
    /// Handshake initiation.
    Syn = 2,
    /// Teardown initiation.
    Fin = 3,
}

impl SegmentKind {
    fn from_wire(value: u16) -> Option<Self> {
        match value {
            0 => Some(Self::Data),
            1 => Some(Self::Ack),
            2 => Some(Self::Syn),
            3 => Some(Self::Fin),
            _ => None,
        }
    }
}

impl fmt::Display for SegmentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Data => "DATA",
            Self::Ack => "ACK",
            Self::Syn => "SYN",
            Self::Fin => "FIN",
        };
        f.write_str(name)
    }
}

/// A complete protocol datagram: type, sequence number, payload bytes.
///
/// For DATA segments `seq` identifies the position of the first payload byte
/// in the modular sequence space; the receiver's next-expected value after
/// consuming the segment is `seq + payload.len() mod 65536`.  For ACKs `seq`
/// is the cumulative next-expected value; for SYN and FIN it is the sequence
/// number the control segment itself consumes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub kind: SegmentKind,
    pub seq: u16,
    pub payload: Vec<u8>,
}

impl Segment {
    /// Build a payload-free control segment (ACK, SYN, or FIN).
    pub fn control(kind: SegmentKind, seq: u16) -> Self {
        Self {
            kind,
            seq,
            payload: Vec::new(),
        }
    }

    /// Build a DATA segment carrying `payload`.
    ///
    /// Panics in debug mode if the payload exceeds [`MAX_PAYLOAD`]; the
    /// sender's segmentation never produces one.
    pub fn data(seq: u16, payload: Vec<u8>) -> Self {
        debug_assert!(payload.len() <= MAX_PAYLOAD);
        Self {
            kind: SegmentKind::Data,
            seq,
            payload,
        }
    }

    /// Serialise this segment into a newly allocated byte vector.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = vec![0u8; HEADER_LEN + self.payload.len()];
        buf[OFF_KIND..OFF_KIND + 2].copy_from_slice(&(self.kind as u16).to_be_bytes());
        buf[OFF_SEQ..OFF_SEQ + 2].copy_from_slice(&self.seq.to_be_bytes());
        buf[HEADER_LEN..].copy_from_slice(&self.payload);
        buf
    }

    /// Parse a [`Segment`] from a raw byte slice.
    ///
    /// Returns [`Err`] if:
    /// - `buf` is shorter than [`HEADER_LEN`],
    /// - the type field names no known segment kind, or
    /// - the payload exceeds [`MAX_PAYLOAD`] bytes.
    pub fn decode(buf: &[u8]) -> Result<Self, SegmentError> {
        if buf.len() < HEADER_LEN {
            return Err(SegmentError::BufferTooShort);
        }

        let kind_raw = u16::from_be_bytes([buf[OFF_KIND], buf[OFF_KIND + 1]]);
        let kind = SegmentKind::from_wire(kind_raw).ok_or(SegmentError::UnknownKind(kind_raw))?;
        let seq = u16::from_be_bytes([buf[OFF_SEQ], buf[OFF_SEQ + 1]]);

        let payload = buf[HEADER_LEN..].to_vec();
        if payload.len() > MAX_PAYLOAD {
            return Err(SegmentError::PayloadTooLong(payload.len()));
        }

        Ok(Self { kind, seq, payload })
    }
}

/// Errors that can arise when parsing a raw datagram.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SegmentError {
    /// Buffer shorter than the fixed header size.
    #[error("buffer too short to contain a header")]
    BufferTooShort,
    /// The type field holds a value outside the known segment kinds.
    #[error("unknown segment type {0}")]
    UnknownKind(u16),
    /// Payload longer than [`MAX_PAYLOAD`] bytes.
    #[error("payload of {0} bytes exceeds the {MAX_PAYLOAD}-byte maximum")]
    PayloadTooLong(usize),
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
