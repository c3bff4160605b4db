//! Thread-safe sequence counter for command numbering.
//!
//! Every command datagram carries a monotonically increasing `u32`; the box
//! echoes it in the acknowledgement so replies can be matched to requests.
//! The counter is a single atomic, so one `ControlChannel` can be shared by
//! the caller's thread and the listener thread without locking.

use std::sync::atomic::{AtomicU32, Ordering};

/// A monotonically increasing counter for command sequence numbers.
///
/// Starts at 0, increments by 1 per [`next`](Self::next), and wraps at
/// `u32::MAX` without panicking.
///
/// # Examples
///
/// ```rust
/// use kmrelay_core::SequenceCounter;
///
/// let counter = SequenceCounter::new();
/// assert_eq!(counter.next(), 0);
/// assert_eq!(counter.next(), 1);
/// ```
#[derive(Debug, Default)]
pub struct SequenceCounter {
    inner: AtomicU32,
}

impl SequenceCounter {
    /// Creates a new counter starting at 0.
    pub fn new() -> Self {
        Self {
            inner: AtomicU32::new(0),
        }
    }

    /// Returns the next sequence number and atomically advances the counter.
    ///
    /// `Relaxed` ordering suffices: sequence numbers only match replies to
    /// requests, they do not synchronise memory between threads.
    pub fn next(&self) -> u32 {
        self.inner.fetch_add(1, Ordering::Relaxed)
    }

    /// Returns the current value without advancing. Diagnostic use only.
    pub fn current(&self) -> u32 {
        self.inner.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_counter_starts_at_zero_and_increments() {
        let counter = SequenceCounter::new();

        assert_eq!(counter.next(), 0);
        assert_eq!(counter.next(), 1);
        assert_eq!(counter.current(), 2);
    }

    #[test]
    fn test_counter_wraps_at_u32_max() {
        let counter = SequenceCounter {
            inner: AtomicU32::new(u32::MAX),
        };

        assert_eq!(counter.next(), u32::MAX);
        assert_eq!(counter.next(), 0, "counter must wrap to 0 after u32::MAX");
    }

    #[test]
    fn test_counter_values_are_unique_across_threads() {
        let counter = Arc::new(SequenceCounter::new());

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let c = Arc::clone(&counter);
                thread::spawn(move || (0..500).map(|_| c.next()).collect::<Vec<_>>())
            })
            .collect();

        let mut values: Vec<u32> = handles
            .into_iter()
            .flat_map(|h| h.join().expect("thread panicked"))
            .collect();

        values.sort_unstable();
        values.dedup();
        assert_eq!(values.len(), 4 * 500, "no sequence number may repeat");
    }
}
