//! Command frames sent to the relay box over the control channel.
//!
//! Wire format:
//!
//! ```text
//! [magic:4][seq:4][opcode:4][payload:N]
//! ```
//!
//! Header size: 12 bytes, all fields little-endian. The box acknowledges
//! every command by echoing the 12-byte header unchanged; [`decode_ack`]
//! checks that echo against the sequence number that was sent.
//!
//! Payload layouts are fixed per opcode and mirror the firmware's marshalled
//! structs byte for byte, so the whole control contract stays in this file.

use crate::wire::report::{KeyboardModifiers, MouseButtons, REPORT_KEY_SLOTS};
use crate::wire::WireError;

/// Protocol magic opening every command and acknowledgement (`"PRMK"` on the
/// wire once little-endian encoded).
pub const COMMAND_MAGIC: u32 = 0x4B4D_5250;

/// Size of the fixed command header.
pub const COMMAND_HEADER_LEN: usize = 12;

/// Size of a device acknowledgement (the echoed header).
pub const ACK_LEN: usize = COMMAND_HEADER_LEN;

/// Encoded size of a [`MouseAction`] payload.
pub const MOUSE_ACTION_LEN: usize = 56;

/// Number of interpolation point slots in a [`MouseAction`].
pub const MOUSE_POINT_SLOTS: usize = 10;

/// Encoded size of a [`KeyboardReport`] payload.
pub const KEYBOARD_REPORT_LEN: usize = 8;

mod opcode {
    pub const MONITOR: u32 = 0x01;
    pub const MOUSE: u32 = 0x02;
    pub const KEYBOARD: u32 = 0x03;
}

/// One mouse command payload: buttons to hold plus relative motion.
///
/// Layout (little-endian): buttons at 0, X at 4, Y at 8, wheel at 12, then
/// ten i32 interpolation points at 16. The button bitmap is widened to 32
/// bits on the wire; only the low byte carries [`MouseButtons`] flags.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MouseAction {
    /// Buttons held for the duration of this action.
    pub buttons: MouseButtons,
    /// Relative X movement. Always relative, positive or negative.
    pub x: i32,
    /// Relative Y movement. Always relative, positive or negative.
    pub y: i32,
    /// Wheel scroll, positive or negative.
    pub wheel: i32,
    /// Curve points for the firmware's interpolated move opcodes; the slots'
    /// meaning depends on which movement variant the firmware executes.
    pub points: [i32; MOUSE_POINT_SLOTS],
}

impl MouseAction {
    /// Encodes this action into its fixed 56-byte payload.
    pub fn encode(&self) -> [u8; MOUSE_ACTION_LEN] {
        let mut buf = [0u8; MOUSE_ACTION_LEN];
        buf[0..4].copy_from_slice(&i32::from(self.buttons.0).to_le_bytes());
        buf[4..8].copy_from_slice(&self.x.to_le_bytes());
        buf[8..12].copy_from_slice(&self.y.to_le_bytes());
        buf[12..16].copy_from_slice(&self.wheel.to_le_bytes());
        for (slot, point) in self.points.iter().enumerate() {
            let at = 16 + slot * 4;
            buf[at..at + 4].copy_from_slice(&point.to_le_bytes());
        }
        buf
    }
}

/// One keyboard command payload: the full key state to relay.
///
/// Same shape as the keyboard half of a report frame: modifier bitmap, one
/// reserved byte, six key usage slots.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct KeyboardReport {
    /// Modifiers held for the duration of this state.
    pub modifiers: KeyboardModifiers,
    /// Held key usage codes; unused slots are zero.
    pub keys: [u8; REPORT_KEY_SLOTS],
}

impl KeyboardReport {
    /// Encodes this report into its fixed 8-byte payload.
    pub fn encode(&self) -> [u8; KEYBOARD_REPORT_LEN] {
        let mut buf = [0u8; KEYBOARD_REPORT_LEN];
        buf[0] = self.modifiers.0;
        // buf[1] reserved
        buf[2..2 + REPORT_KEY_SLOTS].copy_from_slice(&self.keys);
        buf
    }
}

/// A command the driver can send to the box.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Toggle monitor mode. A nonzero `listen_port` tells the box where to
    /// stream report frames; zero disables monitoring.
    Monitor { listen_port: u16 },
    /// Relay a mouse action.
    Mouse(MouseAction),
    /// Relay a keyboard state.
    Keyboard(KeyboardReport),
}

impl Command {
    fn opcode(&self) -> u32 {
        match self {
            Command::Monitor { .. } => opcode::MONITOR,
            Command::Mouse(_) => opcode::MOUSE,
            Command::Keyboard(_) => opcode::KEYBOARD,
        }
    }
}

/// Encodes a command into a full datagram: header plus payload.
///
/// Pass a pre-incremented sequence number from a
/// [`crate::SequenceCounter`]; the device echoes it in the acknowledgement
/// and [`decode_ack`] matches on it.
pub fn encode_command(seq: u32, command: &Command) -> Vec<u8> {
    let mut buf = Vec::with_capacity(COMMAND_HEADER_LEN + MOUSE_ACTION_LEN);
    buf.extend_from_slice(&COMMAND_MAGIC.to_le_bytes());
    buf.extend_from_slice(&seq.to_le_bytes());
    buf.extend_from_slice(&command.opcode().to_le_bytes());

    match command {
        Command::Monitor { listen_port } => buf.extend_from_slice(&listen_port.to_le_bytes()),
        Command::Mouse(action) => buf.extend_from_slice(&action.encode()),
        Command::Keyboard(report) => buf.extend_from_slice(&report.encode()),
    }
    buf
}

/// Validates a device acknowledgement against the sequence number sent.
///
/// # Errors
///
/// [`WireError::TruncatedAck`] if fewer than [`ACK_LEN`] bytes arrived,
/// [`WireError::AckMagicMismatch`] if the echo does not open with the
/// protocol magic, and [`WireError::AckSequenceMismatch`] if the echoed
/// sequence number is not the one sent.
pub fn decode_ack(bytes: &[u8], sent_seq: u32) -> Result<(), WireError> {
    if bytes.len() < ACK_LEN {
        return Err(WireError::TruncatedAck {
            needed: ACK_LEN,
            available: bytes.len(),
        });
    }

    let magic = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
    if magic != COMMAND_MAGIC {
        return Err(WireError::AckMagicMismatch(magic));
    }

    let echoed = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
    if echoed != sent_seq {
        return Err(WireError::AckSequenceMismatch {
            sent: sent_seq,
            echoed,
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_monitor_command_layout() {
        let bytes = encode_command(7, &Command::Monitor { listen_port: 0x1234 });

        assert_eq!(bytes.len(), COMMAND_HEADER_LEN + 2);
        assert_eq!(&bytes[0..4], &COMMAND_MAGIC.to_le_bytes());
        assert_eq!(&bytes[4..8], &7u32.to_le_bytes());
        assert_eq!(&bytes[8..12], &opcode::MONITOR.to_le_bytes());
        assert_eq!(&bytes[12..14], &[0x34, 0x12], "port must be little-endian");
    }

    #[test]
    fn test_monitor_disable_carries_port_zero() {
        let bytes = encode_command(0, &Command::Monitor { listen_port: 0 });

        assert_eq!(&bytes[12..14], &[0, 0]);
    }

    #[test]
    fn test_mouse_action_field_offsets() {
        let action = MouseAction {
            buttons: MouseButtons(MouseButtons::LEFT | MouseButtons::RIGHT),
            x: -5,
            y: 70000,
            wheel: -1,
            points: {
                let mut points = [0i32; MOUSE_POINT_SLOTS];
                points[0] = 11;
                points[9] = -9;
                points
            },
        };

        let payload = action.encode();

        assert_eq!(&payload[0..4], &3i32.to_le_bytes());
        assert_eq!(&payload[4..8], &(-5i32).to_le_bytes());
        assert_eq!(&payload[8..12], &70000i32.to_le_bytes());
        assert_eq!(&payload[12..16], &(-1i32).to_le_bytes());
        assert_eq!(&payload[16..20], &11i32.to_le_bytes());
        assert_eq!(&payload[52..56], &(-9i32).to_le_bytes());
    }

    #[test]
    fn test_keyboard_report_layout() {
        let report = KeyboardReport {
            modifiers: KeyboardModifiers(KeyboardModifiers::LEFT_CTRL),
            keys: [0x04, 0x05, 0x06, 0, 0, 0],
        };

        let payload = report.encode();

        assert_eq!(payload[0], 0x01);
        assert_eq!(payload[1], 0, "reserved byte must stay zero");
        assert_eq!(&payload[2..8], &[0x04, 0x05, 0x06, 0, 0, 0]);
    }

    #[test]
    fn test_ack_accepts_exact_header_echo() {
        let sent = encode_command(42, &Command::Monitor { listen_port: 0 });

        assert_eq!(decode_ack(&sent[..ACK_LEN], 42), Ok(()));
    }

    #[test]
    fn test_ack_rejects_truncated_echo() {
        let err = decode_ack(&[0u8; 5], 0).unwrap_err();

        assert_eq!(
            err,
            WireError::TruncatedAck {
                needed: ACK_LEN,
                available: 5
            }
        );
    }

    #[test]
    fn test_ack_rejects_foreign_magic() {
        let mut bytes = encode_command(1, &Command::Monitor { listen_port: 0 });
        bytes[0] = 0xFF;

        assert!(matches!(
            decode_ack(&bytes, 1),
            Err(WireError::AckMagicMismatch(_))
        ));
    }

    #[test]
    fn test_ack_rejects_wrong_sequence_echo() {
        let bytes = encode_command(1, &Command::Monitor { listen_port: 0 });

        let err = decode_ack(&bytes, 2).unwrap_err();

        assert_eq!(err, WireError::AckSequenceMismatch { sent: 2, echoed: 1 });
    }
}
