//! One-shot completion signal shared between the listener and its caller.

use std::sync::{Condvar, Mutex, PoisonError};
use std::time::Duration;

/// A set-once, cross-thread completion flag.
///
/// The caller hands one of these to [`crate::ReportListener::start`]; the
/// listener thread sets it exactly once, after the socket is released and the
/// loop has fully exited. Setting an already-set signal is a no-op, so the
/// signal stays one-shot even if shutdown paths overlap.
#[derive(Debug, Default)]
pub struct CompletionSignal {
    flag: Mutex<bool>,
    cond: Condvar,
}

impl CompletionSignal {
    /// Creates an unset signal.
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks the signal as set and wakes all waiters. Idempotent.
    pub fn set(&self) {
        let mut flag = self.flag.lock().unwrap_or_else(PoisonError::into_inner);
        *flag = true;
        self.cond.notify_all();
    }

    /// Returns `true` once the signal has been set.
    pub fn is_set(&self) -> bool {
        *self.flag.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Blocks until the signal is set.
    pub fn wait(&self) {
        let mut flag = self.flag.lock().unwrap_or_else(PoisonError::into_inner);
        while !*flag {
            flag = self
                .cond
                .wait(flag)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Blocks until the signal is set or `timeout` elapses.
    ///
    /// Returns `true` if the signal was set within the timeout.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let flag = self.flag.lock().unwrap_or_else(PoisonError::into_inner);
        let (flag, _result) = self
            .cond
            .wait_timeout_while(flag, timeout, |set| !*set)
            .unwrap_or_else(PoisonError::into_inner);
        *flag
    }
}
