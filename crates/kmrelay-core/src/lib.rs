//! # kmrelay-core
//!
//! Wire contract for the kmrelay input relay box: the binary layouts that
//! travel between the driver and the device, and nothing else.
//!
//! The relay box speaks two fixed, device-defined formats over UDP:
//!
//! - **Report frames** (device → driver): while *monitor* mode is active the
//!   box streams one 16-byte [`CompositeReport`] datagram per input state
//!   change, describing the mouse and keyboard state it is relaying.
//! - **Command frames** (driver → device): every command is a 12-byte header
//!   (magic, sequence number, opcode) followed by a fixed-layout payload; the
//!   box acknowledges by echoing the header back.
//!
//! This crate is pure data: no sockets, no threads, no OS dependencies. The
//! `kmrelay-client` crate owns all I/O and uses these types at its edges.

pub mod wire;

// Re-export the whole wire surface at the crate root so callers can write
// `kmrelay_core::CompositeReport` instead of the full module path.
pub use wire::commands::{
    decode_ack, encode_command, Command, KeyboardReport, MouseAction, ACK_LEN,
    COMMAND_HEADER_LEN, KEYBOARD_REPORT_LEN, MOUSE_ACTION_LEN, MOUSE_POINT_SLOTS,
};
pub use wire::report::{
    decode_report, encode_report, CompositeReport, FieldSpec, KeyboardModifiers, MouseButtons,
    REPORT_FRAME_LEN, REPORT_KEY_SLOTS, REPORT_LAYOUT,
};
pub use wire::sequence::SequenceCounter;
pub use wire::WireError;
