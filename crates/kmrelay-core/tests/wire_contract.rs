//! Integration tests for the kmrelay-core wire contract.
//!
//! These pin the exact byte layouts through the public API only, the way a
//! device emulator or a firmware engineer would consume the crate. If any of
//! these break, the driver no longer speaks the box's protocol.

use kmrelay_core::{
    decode_ack, decode_report, encode_command, encode_report, Command, CompositeReport,
    KeyboardModifiers, KeyboardReport, MouseAction, MouseButtons, WireError, ACK_LEN,
    COMMAND_HEADER_LEN, REPORT_FRAME_LEN,
};

/// A frame as captured from the wire: left button held, small diagonal move,
/// left shift down, 'a' (usage 0x04) held.
const CAPTURED_REPORT: [u8; REPORT_FRAME_LEN] = [
    0x01, // report_id
    0x01, // buttons: LEFT
    0x05, 0x00, // x = 5
    0xFB, 0xFF, // y = -5
    0x00, 0x00, // wheel = 0
    0x02, // modifiers: LEFT_SHIFT
    0x00, // reserved
    0x04, 0x00, 0x00, 0x00, 0x00, 0x00, // keys
];

#[test]
fn test_captured_report_decodes_to_expected_state() {
    let report = decode_report(&CAPTURED_REPORT).expect("captured frame must decode");

    assert_eq!(
        report,
        CompositeReport {
            report_id: 0x01,
            buttons: MouseButtons(MouseButtons::LEFT),
            x: 5,
            y: -5,
            wheel: 0,
            modifiers: KeyboardModifiers(KeyboardModifiers::LEFT_SHIFT),
            keys: [0x04, 0, 0, 0, 0, 0],
        }
    );
}

#[test]
fn test_encode_report_reproduces_captured_bytes() {
    let report = decode_report(&CAPTURED_REPORT).unwrap();

    assert_eq!(encode_report(&report), CAPTURED_REPORT);
}

#[test]
fn test_truncated_and_padded_captures_are_rejected() {
    let short = &CAPTURED_REPORT[..REPORT_FRAME_LEN - 1];
    let mut long = CAPTURED_REPORT.to_vec();
    long.push(0);

    assert!(matches!(
        decode_report(short),
        Err(WireError::MalformedFrame { actual: 15, .. })
    ));
    assert!(matches!(
        decode_report(&long),
        Err(WireError::MalformedFrame { actual: 17, .. })
    ));
}

#[test]
fn test_monitor_enable_golden_bytes() {
    let bytes = encode_command(3, &Command::Monitor { listen_port: 16897 });

    #[rustfmt::skip]
    let expected: &[u8] = &[
        0x50, 0x52, 0x4D, 0x4B, // magic "PRMK"
        0x03, 0x00, 0x00, 0x00, // seq
        0x01, 0x00, 0x00, 0x00, // opcode MONITOR
        0x01, 0x42,             // port 16897
    ];
    assert_eq!(bytes, expected);
}

#[test]
fn test_command_payload_sizes_match_firmware_structs() {
    let mouse = encode_command(0, &Command::Mouse(MouseAction::default()));
    let keyboard = encode_command(0, &Command::Keyboard(KeyboardReport::default()));

    assert_eq!(mouse.len(), COMMAND_HEADER_LEN + 56);
    assert_eq!(keyboard.len(), COMMAND_HEADER_LEN + 8);
}

#[test]
fn test_device_ack_is_the_echoed_header() {
    let sent = encode_command(9, &Command::Keyboard(KeyboardReport::default()));

    // A real box echoes exactly the header, nothing more.
    let ack = &sent[..ACK_LEN];

    assert_eq!(decode_ack(ack, 9), Ok(()));
    assert_eq!(
        decode_ack(ack, 10),
        Err(WireError::AckSequenceMismatch { sent: 10, echoed: 9 })
    );
}
