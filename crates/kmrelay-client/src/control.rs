//! UDP control channel to the relay box.
//!
//! Every command is one request/acknowledge transaction: send the encoded
//! frame, wait for the device to echo the 12-byte header back, match the
//! sequence number. There is deliberately **no retry**: callers that care
//! about a lost ack decide for themselves, and the report listener treats
//! its monitor toggles as best-effort.
//!
//! The channels are paired by convention, not negotiation: commands go to
//! the device's control port, and report frames come back to a local socket
//! bound on `control port + 1` (see [`report_port`]).

use std::io;
use std::net::{Ipv4Addr, SocketAddr, UdpSocket};
use std::sync::Mutex;
use std::time::Duration;

use kmrelay_core::{
    decode_ack, encode_command, Command, KeyboardReport, MouseAction, SequenceCounter, WireError,
};
use thiserror::Error;
use tracing::{debug, trace};

/// How long one transaction waits for the device's acknowledgement.
pub const ACK_TIMEOUT: Duration = Duration::from_millis(500);

/// Errors from control-channel operations.
#[derive(Debug, Error)]
pub enum ControlError {
    /// The local control socket could not be opened or connected.
    #[error("failed to open control socket for {addr}: {source}")]
    Connect {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },

    /// An I/O error occurred while sending or receiving.
    #[error("control channel I/O error: {0}")]
    Io(#[from] io::Error),

    /// The device did not acknowledge within [`ACK_TIMEOUT`].
    #[error("no acknowledgement from device within {timeout:?}")]
    AckTimeout { timeout: Duration },

    /// The device's acknowledgement did not match what was sent.
    #[error("bad acknowledgement from device: {0}")]
    Ack(#[from] WireError),
}

/// The slice of the control channel the report listener depends on.
///
/// [`port`](Self::port) is the device's control port; the listener derives
/// its own bind port from it. [`enable_monitor`](Self::enable_monitor) must
/// complete (acknowledged or failed) before returning, because the listener
/// sequences its lifecycle around that completion.
#[cfg_attr(test, mockall::automock)]
pub trait MonitorControl: Send + Sync {
    /// The device's control port.
    fn port(&self) -> u16;

    /// Asks the device to start (`true`) or stop (`false`) streaming report
    /// frames to the paired report port.
    fn enable_monitor(&self, enabled: bool) -> Result<(), ControlError>;
}

/// Returns the report listen port paired with `control_port`, which is
/// always `control_port + 1`.
///
/// `None` only for control port 65535, which has no pairable port.
pub fn report_port(control_port: u16) -> Option<u16> {
    control_port.checked_add(1)
}

/// Blocking UDP control client for the relay box.
///
/// Cheap to share behind an [`std::sync::Arc`]; transactions are serialised
/// internally so the listener thread and the caller's thread can both issue
/// commands.
pub struct ControlChannel {
    /// Connected to the device's control address. Guarded so that one
    /// send/receive transaction completes before the next begins.
    socket: Mutex<UdpSocket>,
    device_addr: SocketAddr,
    seq: SequenceCounter,
}

impl ControlChannel {
    /// Opens a control channel to the device.
    ///
    /// Binds an ephemeral local port, connects it to `device_addr`, and arms
    /// the acknowledgement timeout. No traffic is sent yet.
    ///
    /// # Errors
    ///
    /// [`ControlError::Connect`] if the socket cannot be created.
    pub fn connect(device_addr: SocketAddr) -> Result<Self, ControlError> {
        let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0))
            .and_then(|socket| {
                socket.connect(device_addr)?;
                socket.set_read_timeout(Some(ACK_TIMEOUT))?;
                Ok(socket)
            })
            .map_err(|source| ControlError::Connect {
                addr: device_addr,
                source,
            })?;

        debug!(%device_addr, "control channel ready");
        Ok(Self {
            socket: Mutex::new(socket),
            device_addr,
            seq: SequenceCounter::new(),
        })
    }

    /// The device address this channel is connected to.
    pub fn device_addr(&self) -> SocketAddr {
        self.device_addr
    }

    /// Relays a mouse action through the box.
    pub fn send_mouse(&self, action: &MouseAction) -> Result<(), ControlError> {
        self.transact(&Command::Mouse(*action))
    }

    /// Relays a full keyboard state through the box.
    pub fn send_keyboard(&self, report: &KeyboardReport) -> Result<(), ControlError> {
        self.transact(&Command::Keyboard(*report))
    }

    /// One command transaction: send, await the header echo, match it.
    fn transact(&self, command: &Command) -> Result<(), ControlError> {
        let seq = self.seq.next();
        let frame = encode_command(seq, command);

        let socket = self.socket.lock().unwrap_or_else(|e| e.into_inner());
        socket.send(&frame)?;

        let mut buf = [0u8; 64];
        match socket.recv(&mut buf) {
            Ok(len) => {
                decode_ack(&buf[..len], seq)?;
                trace!(seq, ?command, "command acknowledged");
                Ok(())
            }
            Err(err) if matches!(err.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) => {
                Err(ControlError::AckTimeout {
                    timeout: ACK_TIMEOUT,
                })
            }
            Err(err) => Err(ControlError::Io(err)),
        }
    }
}

impl MonitorControl for ControlChannel {
    fn port(&self) -> u16 {
        self.device_addr.port()
    }

    fn enable_monitor(&self, enabled: bool) -> Result<(), ControlError> {
        // Port 0 in the payload means "stop streaming". When enabling, the
        // box is told to stream at the paired report port.
        let listen_port = if enabled {
            report_port(self.port()).unwrap_or(0)
        } else {
            0
        };
        self.transact(&Command::Monitor { listen_port })
    }
}
