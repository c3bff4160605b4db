//! Monitor-mode report listener.
//!
//! While monitoring is active the relay box streams one report datagram per
//! input state change to `control port + 1`. This module owns the whole
//! report path: the bound socket, the dedicated receive thread, frame
//! decoding, and the dispatch into the user's callback.
//!
//! # Lifecycle
//!
//! ```text
//! start()  Idle/Stopped -> Running   bind socket, spawn loop thread
//!   loop   enable monitor (best effort), then receive -> decode -> dispatch
//! stop()   Running -> Stopping       disable monitor, cancel, wake receive
//!   exit   Stopping -> Stopped       socket released, completion signalled
//! ```
//!
//! Exactly one loop thread exists per listener; a second `start` while the
//! loop is active is a usage error, never a silent no-op.
//!
//! # Cancellation
//!
//! The blocking receive is the loop's only suspension point, and a UDP
//! receive has no native cancellation. `stop` therefore unblocks it by
//! sending a zero-length wake datagram to the bound port through a cloned
//! socket handle; a read timeout on the socket backstops a lost wake so the
//! cancel flag is always observed within the poll interval. Stopping never
//! preempts a callback already in flight, it only unblocks the next receive.

use std::io;
use std::net::{Ipv4Addr, UdpSocket};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use kmrelay_core::{decode_report, CompositeReport};
use thiserror::Error;
use tracing::{debug, error, warn};

use crate::control::{report_port, MonitorControl};
use crate::sync::CompletionSignal;

/// Upper bound on how long [`ReportListener::stop`] waits for the loop
/// thread to wind down before detaching it.
pub const STOP_TIMEOUT: Duration = Duration::from_secs(1);

/// Pause after an unexpected receive error before retrying, so a persistent
/// socket fault cannot spin the loop hot.
const RECV_ERROR_BACKOFF: Duration = Duration::from_millis(100);

/// Read timeout on the report socket. Bounds how stale a cancellation
/// request can go unobserved if the wake datagram is lost.
const RECV_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Receive buffer size. Larger than any report frame so oversized datagrams
/// are read whole and rejected by the exact-length decode, instead of
/// surfacing as platform-dependent socket errors.
const RECV_BUFFER_LEN: usize = 2048;

/// Observable lifecycle state of a [`ReportListener`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerState {
    /// Never started.
    Idle,
    /// The loop thread is active.
    Running,
    /// `stop` is in progress; the loop has been asked to exit.
    Stopping,
    /// The loop has exited and the socket is released.
    Stopped,
}

/// Errors surfaced synchronously by [`ReportListener::start`].
///
/// Everything that goes wrong inside the running loop (malformed frames,
/// transient receive errors, callback panics) is handled in the loop and
/// never unwinds into caller code.
#[derive(Debug, Error)]
pub enum ListenerError {
    /// The loop is already active. Usage error; listener state is unchanged.
    #[error("listener is already running")]
    AlreadyRunning,

    /// The control port has no paired report port (control port 65535).
    #[error("control port {control_port} has no paired report port")]
    ReportPortOverflow { control_port: u16 },

    /// The report socket could not be bound; state remains unchanged.
    #[error("failed to bind report socket on port {port}: {source}")]
    Bind {
        port: u16,
        #[source]
        source: io::Error,
    },

    /// The OS refused to spawn the loop thread; state remains unchanged.
    #[error("failed to spawn listener thread: {0}")]
    Spawn(#[source] io::Error),
}

/// Callback invoked on the listener's own thread, once per decoded report.
pub type ReportHandler = Box<dyn FnMut(CompositeReport) + Send + 'static>;

/// State shared between the controller and one loop thread. The cancel flag
/// and the state/condvar pair are the only cross-thread state in the design.
///
/// One `Shared` belongs to exactly one loop generation: every `start`
/// allocates a fresh one. A loop detached by a timed-out `stop` therefore
/// retires its *own* state when it finally exits and can never clobber the
/// state of a successor loop started in the meantime.
struct Shared {
    state: Mutex<ListenerState>,
    exited: Condvar,
    cancel: AtomicBool,
}

/// Controller-side view of the current loop generation, behind one lock so
/// `start` and `stop` are serialised against each other.
struct Inner {
    /// Shared state of the current generation; `None` before the first start.
    shared: Option<Arc<Shared>>,
    thread: Option<JoinHandle<()>>,
    /// Cloned handle of the loop's socket plus its port, kept only to send
    /// the wake datagram from `stop`.
    wake: Option<(UdpSocket, u16)>,
}

/// Everything the loop thread owns. Built in `start`, consumed by the loop.
struct LoopContext {
    socket: UdpSocket,
    control: Arc<dyn MonitorControl>,
    handler: Arc<Mutex<Option<ReportHandler>>>,
    shared: Arc<Shared>,
    completion: Option<Arc<CompletionSignal>>,
}

/// Listens for report frames from the relay box and dispatches them to a
/// single registered handler.
///
/// # Example
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use kmrelay_client::{ControlChannel, ReportListener};
///
/// # fn main() -> anyhow::Result<()> {
/// let control = Arc::new(ControlChannel::connect("192.168.2.188:16896".parse()?)?);
/// let listener = ReportListener::new(control);
/// listener.set_handler(|report| println!("dx={} dy={}", report.x, report.y));
/// listener.start(None)?;
/// // ... later
/// listener.stop();
/// # Ok(())
/// # }
/// ```
pub struct ReportListener {
    control: Arc<dyn MonitorControl>,
    handler: Arc<Mutex<Option<ReportHandler>>>,
    inner: Mutex<Inner>,
}

impl ReportListener {
    /// Creates an idle listener bound to a control channel.
    pub fn new(control: Arc<dyn MonitorControl>) -> Self {
        Self {
            control,
            handler: Arc::new(Mutex::new(None)),
            inner: Mutex::new(Inner {
                shared: None,
                thread: None,
                wake: None,
            }),
        }
    }

    /// Installs the report handler, replacing any previous one.
    ///
    /// May be called at any time, including while the loop is running; the
    /// call blocks until any in-flight callback returns. Do not call from
    /// inside the handler itself.
    pub fn set_handler<F>(&self, handler: F)
    where
        F: FnMut(CompositeReport) + Send + 'static,
    {
        *lock(&self.handler) = Some(Box::new(handler));
    }

    /// Removes the report handler; subsequent frames are decoded and dropped.
    pub fn clear_handler(&self) {
        *lock(&self.handler) = None;
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ListenerState {
        let inner = lock(&self.inner);
        match &inner.shared {
            None => ListenerState::Idle,
            Some(shared) => *lock(&shared.state),
        }
    }

    /// `true` before the first `start` and after the loop has fully exited.
    pub fn stopped(&self) -> bool {
        matches!(
            self.state(),
            ListenerState::Idle | ListenerState::Stopped
        )
    }

    /// Starts listening and asks the device to enable monitor mode.
    ///
    /// Binds the report socket on `control port + 1`, spawns the loop
    /// thread, and returns immediately; the loop runs until [`stop`] or
    /// drop. If `completion` is given it is set exactly once, when the loop
    /// has fully terminated and the socket is released.
    ///
    /// The monitor-enable request itself happens on the loop thread and is
    /// best-effort: if the device never acknowledges it, the loop still
    /// listens (and logs a warning), it just sees no reports until the
    /// device activates monitor mode.
    ///
    /// # Errors
    ///
    /// [`ListenerError::AlreadyRunning`] if the loop is active, and
    /// [`ListenerError::Bind`] if the report port cannot be bound. Both
    /// leave the listener state exactly as it was.
    ///
    /// [`stop`]: Self::stop
    pub fn start(&self, completion: Option<Arc<CompletionSignal>>) -> Result<(), ListenerError> {
        let mut inner = lock(&self.inner);
        if let Some(shared) = &inner.shared {
            match *lock(&shared.state) {
                ListenerState::Running | ListenerState::Stopping => {
                    return Err(ListenerError::AlreadyRunning)
                }
                ListenerState::Idle | ListenerState::Stopped => {}
            }
        }

        let control_port = self.control.port();
        let port = report_port(control_port)
            .ok_or(ListenerError::ReportPortOverflow { control_port })?;

        let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, port))
            .map_err(|source| ListenerError::Bind { port, source })?;
        socket
            .set_read_timeout(Some(RECV_POLL_INTERVAL))
            .map_err(|source| ListenerError::Bind { port, source })?;
        let wake = socket
            .try_clone()
            .map_err(|source| ListenerError::Bind { port, source })?;

        // Fresh generation: its own state, condvar, and cancel flag. A loop
        // from an earlier generation that was detached by a timed-out stop
        // still holds its old `Shared` and cannot touch this one.
        let shared = Arc::new(Shared {
            state: Mutex::new(ListenerState::Running),
            exited: Condvar::new(),
            cancel: AtomicBool::new(false),
        });

        let ctx = LoopContext {
            socket,
            control: Arc::clone(&self.control),
            handler: Arc::clone(&self.handler),
            shared: Arc::clone(&shared),
            completion,
        };
        let thread = thread::Builder::new()
            .name("kmrelay-report-listener".to_string())
            .spawn(move || listener_loop(ctx))
            .map_err(ListenerError::Spawn)?;

        // Everything fallible is done; only now does this generation become
        // the listener's current one.
        inner.shared = Some(shared);
        inner.thread = Some(thread);
        inner.wake = Some((wake, port));

        debug!(port, "report listener started");
        Ok(())
    }

    /// Stops listening and asks the device to disable monitor mode.
    ///
    /// Idempotent and infallible: calling it while already stopped, or
    /// before any `start`, is a no-op. The disable-monitor request is best
    /// effort; a lost acknowledgement is logged, never surfaced.
    ///
    /// Waits at most [`STOP_TIMEOUT`] for the loop thread to exit. A loop
    /// that overruns the bound is detached and the state is marked
    /// [`ListenerState::Stopped`] anyway; until that stray thread dies, a
    /// subsequent `start` may fail to rebind the report port. When the stray
    /// finally exits it retires only its own generation's state, so a loop
    /// started in the meantime is unaffected.
    pub fn stop(&self) {
        let mut inner = lock(&self.inner);
        let shared = match &inner.shared {
            None => return,
            Some(shared) => Arc::clone(shared),
        };
        {
            let mut state = lock(&shared.state);
            match *state {
                ListenerState::Running => *state = ListenerState::Stopping,
                ListenerState::Idle | ListenerState::Stopping | ListenerState::Stopped => return,
            }
        }

        if let Err(err) = self.control.enable_monitor(false) {
            warn!(%err, "disable-monitor request failed during stop");
        }

        shared.cancel.store(true, Ordering::Release);

        let thread = inner.thread.take();
        if let Some((socket, port)) = inner.wake.take() {
            // Unblock the pending receive. The loop treats the zero-length
            // datagram as an undecodable frame and re-checks the cancel flag.
            if let Err(err) = socket.send_to(&[], (Ipv4Addr::LOCALHOST, port)) {
                debug!(%err, "wake datagram failed; read timeout will deliver cancellation");
            }
        }

        let state = lock(&shared.state);
        let (mut state, wait) = shared
            .exited
            .wait_timeout_while(state, STOP_TIMEOUT, |s| *s != ListenerState::Stopped)
            .unwrap_or_else(PoisonError::into_inner);
        let timed_out = wait.timed_out();
        // Forced even on timeout: a slow loop must not hang this caller.
        *state = ListenerState::Stopped;
        drop(state);

        match thread {
            Some(handle) if !timed_out => {
                let _ = handle.join();
            }
            Some(handle) => {
                warn!(timeout = ?STOP_TIMEOUT, "listener thread did not exit in time; detaching");
                drop(handle);
            }
            None => {}
        }
        debug!("report listener stopped");
    }
}

impl Drop for ReportListener {
    /// Equivalent to [`stop`](Self::stop); safe without a prior `start`.
    fn drop(&mut self) {
        self.stop();
    }
}

/// Body of the listener thread.
fn listener_loop(ctx: LoopContext) {
    // Best effort: a failed enable must not wedge the listener. The loop
    // still runs; the caller just sees no reports until the device
    // activates monitor mode.
    if let Err(err) = ctx.control.enable_monitor(true) {
        warn!(%err, "enable-monitor request failed; listening anyway");
    }

    let mut buf = [0u8; RECV_BUFFER_LEN];
    while !ctx.shared.cancel.load(Ordering::Acquire) {
        match ctx.socket.recv_from(&mut buf) {
            Ok((len, peer)) => match decode_report(&buf[..len]) {
                Ok(report) => dispatch(&ctx.handler, report),
                Err(err) => debug!(%err, %peer, "discarding undecodable datagram"),
            },
            Err(err)
                if matches!(err.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) =>
            {
                // Poll-interval wakeup; the loop condition re-checks cancel.
                continue;
            }
            Err(err) => {
                if ctx.shared.cancel.load(Ordering::Acquire) {
                    break;
                }
                warn!(%err, "report receive failed; backing off");
                thread::sleep(RECV_ERROR_BACKOFF);
            }
        }
    }

    // Release the socket before the state flips to Stopped, so a caller
    // observing Stopped can immediately rebind the port.
    drop(ctx.socket);

    {
        let mut state = lock(&ctx.shared.state);
        *state = ListenerState::Stopped;
        ctx.shared.exited.notify_all();
    }
    if let Some(signal) = ctx.completion {
        signal.set();
    }
    debug!("report listener loop exited");
}

/// Invokes the registered handler with one report, isolating panics.
fn dispatch(handler: &Mutex<Option<ReportHandler>>, report: CompositeReport) {
    let mut slot = lock(handler);
    if let Some(callback) = slot.as_mut() {
        if panic::catch_unwind(AssertUnwindSafe(|| callback(report))).is_err() {
            error!("report handler panicked; report dropped");
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
