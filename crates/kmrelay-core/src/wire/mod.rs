//! Wire module containing the report decoder, the command encoder, and the
//! command sequence counter.
//!
//! All multi-byte integers on this wire are **little-endian**: the relay box
//! firmware runs on a little-endian MCU and marshals its structs verbatim.

pub mod commands;
pub mod report;
pub mod sequence;

use thiserror::Error;

/// Errors produced while decoding bytes received from the relay box.
///
/// Encoding cannot fail: every command payload has a fixed layout and every
/// field is already range-constrained by its Rust type.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum WireError {
    /// A report datagram did not have the exact frame length.
    ///
    /// Zero-length and oversized datagrams both land here; callers discard
    /// the frame and keep receiving.
    #[error("malformed report frame: expected {expected} bytes, got {actual}")]
    MalformedFrame { expected: usize, actual: usize },

    /// A command acknowledgement was shorter than the echoed header.
    #[error("truncated acknowledgement: need {needed} bytes, got {available}")]
    TruncatedAck { needed: usize, available: usize },

    /// A command acknowledgement did not start with the protocol magic.
    #[error("acknowledgement magic mismatch: got 0x{0:08X}")]
    AckMagicMismatch(u32),

    /// A command acknowledgement echoed a sequence number we never sent.
    #[error("acknowledgement sequence mismatch: sent {sent}, device echoed {echoed}")]
    AckSequenceMismatch { sent: u32, echoed: u32 },
}
