//! Progress and cancellation state shared between a running operation and
//! whoever reports on it.
//!
//! [`Progress`] is a cheap, cloneable handle. The walker and builder update
//! it; a UI or log reporter polls it from any thread and may request
//! cancellation, which is honoured at the next entry boundary.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Default)]
struct State {
    transferred: AtomicU64,
    expected: AtomicU64,
    activity: Mutex<String>,
    cancelled: AtomicBool,
}

/// Shared progress counters plus the cancellation flag.
#[derive(Debug, Clone, Default)]
pub struct Progress {
    state: Arc<State>,
}

/// Point-in-time copy of a [`Progress`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub transferred: u64,
    pub expected: u64,
    pub activity: String,
    pub cancelled: bool,
}

impl Progress {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear counters, activity text and the cancellation flag.
    ///
    /// Called at the start of every top-level extract or compress call.
    pub fn reset(&self) {
        self.state.transferred.store(0, Ordering::Relaxed);
        self.state.expected.store(0, Ordering::Relaxed);
        self.state.cancelled.store(false, Ordering::SeqCst);
        self.activity_lock().clear();
    }

    /// Start accounting for a new unit of work of `expected` bytes.
    pub fn begin(&self, expected: u64, activity: impl Into<String>) {
        self.state.expected.store(expected, Ordering::Relaxed);
        self.state.transferred.store(0, Ordering::Relaxed);
        self.set_activity(activity);
    }

    pub fn add_transferred(&self, bytes: u64) {
        self.state.transferred.fetch_add(bytes, Ordering::Relaxed);
    }

    pub fn set_transferred(&self, bytes: u64) {
        self.state.transferred.store(bytes, Ordering::Relaxed);
    }

    pub fn set_expected(&self, bytes: u64) {
        self.state.expected.store(bytes, Ordering::Relaxed);
    }

    pub fn set_activity(&self, activity: impl Into<String>) {
        *self.activity_lock() = activity.into();
    }

    pub fn transferred(&self) -> u64 {
        self.state.transferred.load(Ordering::Relaxed)
    }

    pub fn expected(&self) -> u64 {
        self.state.expected.load(Ordering::Relaxed)
    }

    pub fn activity(&self) -> String {
        self.activity_lock().clone()
    }

    /// Request a cooperative stop.
    pub fn cancel(&self) {
        self.state.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.state.cancelled.load(Ordering::SeqCst)
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            transferred: self.transferred(),
            expected: self.expected(),
            activity: self.activity(),
            cancelled: self.is_cancelled(),
        }
    }

    // A panicking reporter must not wedge the worker.
    fn activity_lock(&self) -> MutexGuard<'_, String> {
        self.state
            .activity
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_state() {
        let progress = Progress::new();
        let reporter = progress.clone();

        progress.begin(10, "Extracting: a.txt");
        progress.add_transferred(4);
        reporter.cancel();

        let snapshot = progress.snapshot();
        assert_eq!(snapshot.transferred, 4);
        assert_eq!(snapshot.expected, 10);
        assert_eq!(snapshot.activity, "Extracting: a.txt");
        assert!(snapshot.cancelled);
    }

    #[test]
    fn reset_clears_everything() {
        let progress = Progress::new();
        progress.begin(3, "busy");
        progress.add_transferred(3);
        progress.cancel();

        progress.reset();

        assert_eq!(
            progress.snapshot(),
            Snapshot {
                transferred: 0,
                expected: 0,
                activity: String::new(),
                cancelled: false,
            }
        );
    }

    #[test]
    fn begin_restarts_transfer_count() {
        let progress = Progress::new();
        progress.begin(5, "first");
        progress.add_transferred(5);
        progress.begin(7, "second");
        assert_eq!(progress.transferred(), 0);
        assert_eq!(progress.expected(), 7);
    }
}
