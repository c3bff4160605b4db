//! # kmrelay-client
//!
//! Driver for the kmrelay input relay box: a small LAN device that accepts
//! keyboard/mouse commands over UDP and, in *monitor* mode, streams back
//! telemetry frames describing the input state it is relaying.
//!
//! Two halves, paired by port convention:
//!
//! - [`ControlChannel`] sends commands to the device's control port and
//!   waits for each acknowledgement (mouse/keyboard relays, monitor-mode
//!   toggles).
//! - [`ReportListener`] binds `control port + 1`, runs one dedicated receive
//!   thread, decodes each inbound frame into a
//!   [`CompositeReport`](kmrelay_core::CompositeReport), and hands it to a
//!   single registered callback.
//!
//! The listener's lifecycle is deterministic under concurrent misuse:
//! double `start` fails fast, `stop` is idempotent and bounded, and dropping
//! the listener stops it. See the [`listener`] module docs for the state
//! machine and the cancellation mechanism.

pub mod config;
pub mod control;
pub mod listener;
pub mod sync;

pub use config::{ConfigError, DeviceConfig};
pub use control::{report_port, ControlChannel, ControlError, MonitorControl, ACK_TIMEOUT};
pub use listener::{ListenerError, ListenerState, ReportHandler, ReportListener, STOP_TIMEOUT};
pub use sync::CompletionSignal;

// Wire types callers handle directly.
pub use kmrelay_core::{
    CompositeReport, KeyboardModifiers, KeyboardReport, MouseAction, MouseButtons,
};
