//! Composite report frames streamed by the relay box in monitor mode.
//!
//! Wire format (16 bytes, little-endian, device firmware contract):
//!
//! ```text
//! [report_id:1][buttons:1][x:2][y:2][wheel:2][modifiers:1][reserved:1][keys:6]
//! ```
//!
//! The frame is the box's composite HID state: the first half mirrors a boot
//! mouse report (button bitmap plus signed relative X/Y/wheel), the second
//! half a boot keyboard report (modifier bitmap, one reserved byte, six key
//! usage slots). Field values are trusted once the length matches; the box
//! enforces its own ranges before a frame ever leaves the firmware, and this
//! decoder does not second-guess it.
//!
//! The layout lives in exactly two places that tests pin together: the
//! `offset` constants the decoder reads through, and the public
//! [`REPORT_LAYOUT`] descriptor table documenting the contract.

use crate::wire::WireError;

/// Exact length of one report datagram. Anything else is a malformed frame.
pub const REPORT_FRAME_LEN: usize = 16;

/// Number of simultaneous key usage slots in a report (HID boot keyboard).
pub const REPORT_KEY_SLOTS: usize = 6;

/// Byte offsets of every report field. Single source of truth for the
/// decoder; must stay in lockstep with [`REPORT_LAYOUT`].
mod offset {
    pub const REPORT_ID: usize = 0;
    pub const BUTTONS: usize = 1;
    pub const X: usize = 2;
    pub const Y: usize = 4;
    pub const WHEEL: usize = 6;
    pub const MODIFIERS: usize = 8;
    pub const RESERVED: usize = 9;
    pub const KEYS: usize = 10;
}

/// One entry of the report layout descriptor: field name, byte offset, width.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub offset: usize,
    pub width: usize,
}

/// The full report frame layout as a descriptor table.
///
/// This is the documented form of the device contract. Tests assert that the
/// table is contiguous, covers exactly [`REPORT_FRAME_LEN`] bytes, and agrees
/// with the offsets the decoder actually uses.
pub const REPORT_LAYOUT: &[FieldSpec] = &[
    FieldSpec { name: "report_id", offset: offset::REPORT_ID, width: 1 },
    FieldSpec { name: "buttons", offset: offset::BUTTONS, width: 1 },
    FieldSpec { name: "x", offset: offset::X, width: 2 },
    FieldSpec { name: "y", offset: offset::Y, width: 2 },
    FieldSpec { name: "wheel", offset: offset::WHEEL, width: 2 },
    FieldSpec { name: "modifiers", offset: offset::MODIFIERS, width: 1 },
    FieldSpec { name: "reserved", offset: offset::RESERVED, width: 1 },
    FieldSpec { name: "keys", offset: offset::KEYS, width: REPORT_KEY_SLOTS },
];

/// Mouse button bitmap as relayed by the box.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MouseButtons(pub u8);

impl MouseButtons {
    pub const LEFT: u8 = 1 << 0;
    pub const RIGHT: u8 = 1 << 1;
    pub const MIDDLE: u8 = 1 << 2;

    /// Returns `true` if the left button is held.
    pub fn left(&self) -> bool {
        self.0 & Self::LEFT != 0
    }

    /// Returns `true` if the right button is held.
    pub fn right(&self) -> bool {
        self.0 & Self::RIGHT != 0
    }

    /// Returns `true` if the middle button is held.
    pub fn middle(&self) -> bool {
        self.0 & Self::MIDDLE != 0
    }

    /// Returns `true` if any button bit is set.
    pub fn any(&self) -> bool {
        self.0 != 0
    }
}

/// Keyboard modifier bitmap as relayed by the box.
///
/// Bit assignments follow the HID boot keyboard modifier byte, which is also
/// what the box expects in outbound [`crate::KeyboardReport`] commands.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KeyboardModifiers(pub u8);

impl KeyboardModifiers {
    pub const LEFT_CTRL: u8 = 0x01;
    pub const LEFT_SHIFT: u8 = 0x02;
    pub const LEFT_ALT: u8 = 0x04;
    pub const LEFT_GUI: u8 = 0x08;
    pub const RIGHT_CTRL: u8 = 0x10;
    pub const RIGHT_SHIFT: u8 = 0x20;
    pub const RIGHT_ALT: u8 = 0x40;
    pub const RIGHT_GUI: u8 = 0x80;

    /// Returns `true` if either Ctrl modifier is active.
    pub fn ctrl(&self) -> bool {
        self.0 & (Self::LEFT_CTRL | Self::RIGHT_CTRL) != 0
    }

    /// Returns `true` if either Shift modifier is active.
    pub fn shift(&self) -> bool {
        self.0 & (Self::LEFT_SHIFT | Self::RIGHT_SHIFT) != 0
    }

    /// Returns `true` if either Alt modifier is active.
    pub fn alt(&self) -> bool {
        self.0 & (Self::LEFT_ALT | Self::RIGHT_ALT) != 0
    }

    /// Returns `true` if either GUI (Win/Cmd/Super) modifier is active.
    pub fn gui(&self) -> bool {
        self.0 & (Self::LEFT_GUI | Self::RIGHT_GUI) != 0
    }
}

/// One decoded telemetry frame: the composite mouse + keyboard state the box
/// is currently relaying.
///
/// Reports are plain `Copy` values. The listener hands each report to the
/// user callback for the duration of the invocation and retains nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompositeReport {
    /// Report identifier byte as sent by the firmware.
    pub report_id: u8,
    /// Held mouse buttons.
    pub buttons: MouseButtons,
    /// Relative X movement since the previous report.
    pub x: i16,
    /// Relative Y movement since the previous report.
    pub y: i16,
    /// Wheel movement since the previous report.
    pub wheel: i16,
    /// Active keyboard modifiers.
    pub modifiers: KeyboardModifiers,
    /// Currently held key usage codes; unused slots are zero.
    pub keys: [u8; REPORT_KEY_SLOTS],
}

impl CompositeReport {
    /// Returns `true` if the given nonzero key usage code is currently held.
    pub fn key_down(&self, usage: u8) -> bool {
        usage != 0 && self.keys.contains(&usage)
    }
}

/// Decodes one report frame.
///
/// Pure function of its input: no allocation, no side effects, safe to call
/// concurrently. The only validation is the exact-length check; see the
/// module docs for why field values are trusted.
///
/// # Errors
///
/// [`WireError::MalformedFrame`] if `bytes` is not exactly
/// [`REPORT_FRAME_LEN`] long.
///
/// # Examples
///
/// ```rust
/// use kmrelay_core::{decode_report, REPORT_FRAME_LEN};
///
/// let mut frame = [0u8; REPORT_FRAME_LEN];
/// frame[2..4].copy_from_slice(&(-7i16).to_le_bytes());
/// let report = decode_report(&frame).unwrap();
/// assert_eq!(report.x, -7);
/// ```
pub fn decode_report(bytes: &[u8]) -> Result<CompositeReport, WireError> {
    if bytes.len() != REPORT_FRAME_LEN {
        return Err(WireError::MalformedFrame {
            expected: REPORT_FRAME_LEN,
            actual: bytes.len(),
        });
    }

    let mut keys = [0u8; REPORT_KEY_SLOTS];
    keys.copy_from_slice(&bytes[offset::KEYS..offset::KEYS + REPORT_KEY_SLOTS]);

    Ok(CompositeReport {
        report_id: bytes[offset::REPORT_ID],
        buttons: MouseButtons(bytes[offset::BUTTONS]),
        x: read_i16(bytes, offset::X),
        y: read_i16(bytes, offset::Y),
        wheel: read_i16(bytes, offset::WHEEL),
        modifiers: KeyboardModifiers(bytes[offset::MODIFIERS]),
        keys,
    })
}

/// Encodes a report into its frame bytes.
///
/// The inverse of [`decode_report`]. The driver never sends report frames
/// itself; this exists for test fixtures, diagnostics, and device emulation.
pub fn encode_report(report: &CompositeReport) -> [u8; REPORT_FRAME_LEN] {
    let mut buf = [0u8; REPORT_FRAME_LEN];
    buf[offset::REPORT_ID] = report.report_id;
    buf[offset::BUTTONS] = report.buttons.0;
    buf[offset::X..offset::X + 2].copy_from_slice(&report.x.to_le_bytes());
    buf[offset::Y..offset::Y + 2].copy_from_slice(&report.y.to_le_bytes());
    buf[offset::WHEEL..offset::WHEEL + 2].copy_from_slice(&report.wheel.to_le_bytes());
    buf[offset::MODIFIERS] = report.modifiers.0;
    // offset::RESERVED stays zero
    buf[offset::KEYS..offset::KEYS + REPORT_KEY_SLOTS].copy_from_slice(&report.keys);
    buf
}

fn read_i16(bytes: &[u8], at: usize) -> i16 {
    i16::from_le_bytes([bytes[at], bytes[at + 1]])
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Hand-built reference frame used across the decoder tests.
    fn sample_frame() -> [u8; REPORT_FRAME_LEN] {
        let mut frame = [0u8; REPORT_FRAME_LEN];
        frame[0] = 0x01; // report_id
        frame[1] = MouseButtons::LEFT | MouseButtons::MIDDLE;
        frame[2..4].copy_from_slice(&100i16.to_le_bytes());
        frame[4..6].copy_from_slice(&(-250i16).to_le_bytes());
        frame[6..8].copy_from_slice(&(-1i16).to_le_bytes());
        frame[8] = KeyboardModifiers::LEFT_SHIFT | KeyboardModifiers::RIGHT_GUI;
        frame[10] = 0x04; // 'a'
        frame[11] = 0x05; // 'b'
        frame
    }

    #[test]
    fn test_decode_extracts_every_field() {
        let report = decode_report(&sample_frame()).expect("decode must succeed");

        assert_eq!(report.report_id, 0x01);
        assert!(report.buttons.left());
        assert!(!report.buttons.right());
        assert!(report.buttons.middle());
        assert_eq!(report.x, 100);
        assert_eq!(report.y, -250);
        assert_eq!(report.wheel, -1);
        assert!(report.modifiers.shift());
        assert!(report.modifiers.gui());
        assert!(!report.modifiers.ctrl());
        assert_eq!(report.keys, [0x04, 0x05, 0, 0, 0, 0]);
    }

    #[test]
    fn test_decode_is_deterministic() {
        let frame = sample_frame();

        let first = decode_report(&frame).unwrap();
        let second = decode_report(&frame).unwrap();

        assert_eq!(first, second, "same bytes must decode to equal reports");
    }

    #[test]
    fn test_decode_rejects_every_wrong_length() {
        for len in [0usize, 1, 3, REPORT_FRAME_LEN - 1, REPORT_FRAME_LEN + 1, 1024] {
            let bytes = vec![0u8; len];

            let err = decode_report(&bytes).expect_err("wrong length must fail");

            assert_eq!(
                err,
                WireError::MalformedFrame {
                    expected: REPORT_FRAME_LEN,
                    actual: len
                }
            );
        }
    }

    #[test]
    fn test_decode_sign_extends_motion_fields() {
        let mut frame = [0u8; REPORT_FRAME_LEN];
        frame[2..4].copy_from_slice(&i16::MIN.to_le_bytes());
        frame[4..6].copy_from_slice(&i16::MAX.to_le_bytes());

        let report = decode_report(&frame).unwrap();

        assert_eq!(report.x, i16::MIN);
        assert_eq!(report.y, i16::MAX);
    }

    #[test]
    fn test_encode_decode_roundtrip() {
        let original = CompositeReport {
            report_id: 0x01,
            buttons: MouseButtons(MouseButtons::RIGHT),
            x: -32000,
            y: 17,
            wheel: 3,
            modifiers: KeyboardModifiers(KeyboardModifiers::LEFT_CTRL),
            keys: [0x1D, 0, 0, 0, 0, 0],
        };

        let decoded = decode_report(&encode_report(&original)).unwrap();

        assert_eq!(decoded, original);
    }

    #[test]
    fn test_layout_table_is_contiguous_and_covers_frame() {
        let mut cursor = 0usize;
        for field in REPORT_LAYOUT {
            assert_eq!(
                field.offset, cursor,
                "field `{}` must start where the previous field ended",
                field.name
            );
            cursor += field.width;
        }
        assert_eq!(cursor, REPORT_FRAME_LEN, "layout must cover the whole frame");
    }

    #[test]
    fn test_layout_table_matches_decoder_offsets() {
        let by_name = |name: &str| {
            REPORT_LAYOUT
                .iter()
                .find(|f| f.name == name)
                .unwrap_or_else(|| panic!("layout table is missing `{name}`"))
        };

        assert_eq!(by_name("report_id").offset, offset::REPORT_ID);
        assert_eq!(by_name("buttons").offset, offset::BUTTONS);
        assert_eq!(by_name("x").offset, offset::X);
        assert_eq!(by_name("y").offset, offset::Y);
        assert_eq!(by_name("wheel").offset, offset::WHEEL);
        assert_eq!(by_name("modifiers").offset, offset::MODIFIERS);
        assert_eq!(by_name("keys").offset, offset::KEYS);
        assert_eq!(by_name("keys").width, REPORT_KEY_SLOTS);
    }

    #[test]
    fn test_modifier_predicates_cover_both_sides() {
        let left = KeyboardModifiers(KeyboardModifiers::LEFT_ALT);
        let right = KeyboardModifiers(KeyboardModifiers::RIGHT_ALT);
        let none = KeyboardModifiers::default();

        assert!(left.alt());
        assert!(right.alt());
        assert!(!none.alt());
    }

    #[test]
    fn test_key_down_ignores_empty_slots() {
        let report = decode_report(&[0u8; REPORT_FRAME_LEN]).unwrap();

        // All slots are zero; zero is "no key", never "key 0 held".
        assert!(!report.key_down(0));
        assert!(!report.key_down(0x04));
    }
}
