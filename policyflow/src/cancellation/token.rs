//! Cancellation token for cooperative cancellation.

use parking_lot::{Condvar, Mutex, RwLock};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// A token for cooperative cancellation.
///
/// Outer code (a caller, or an outer policy such as a timeout) requests
/// cancellation; retry loops observe it before every new attempt and while
/// waiting out a retry delay. Cancellation is idempotent - only the first
/// cancellation reason is kept.
#[derive(Default)]
pub struct CancellationToken {
    /// Whether cancellation has been requested.
    cancelled: AtomicBool,
    /// The reason for cancellation (first one wins).
    reason: RwLock<Option<String>>,
    /// Guards the condition variable used by timed waits.
    lock: Mutex<()>,
    /// Wakes threads blocked in [`CancellationToken::wait_timeout`].
    signal: Condvar,
}

impl CancellationToken {
    /// Creates a new cancellation token.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation with a reason.
    ///
    /// This is idempotent - only the first reason is kept.
    /// Threads blocked in [`CancellationToken::wait_timeout`] wake immediately.
    pub fn cancel(&self, reason: impl Into<String>) {
        // Only set if not already cancelled (first reason wins)
        if self
            .cancelled
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            *self.reason.write() = Some(reason.into());

            {
                let _guard = self.lock.lock();
                self.signal.notify_all();
            }
        }
    }

    /// Returns whether cancellation has been requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Returns the cancellation reason, if any.
    #[must_use]
    pub fn reason(&self) -> Option<String> {
        self.reason.read().clone()
    }

    /// Blocks for up to `timeout`, returning early if cancellation is requested.
    ///
    /// Returns true if the token was cancelled before or during the wait.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        if timeout.is_zero() || self.is_cancelled() {
            return self.is_cancelled();
        }

        let Some(deadline) = Instant::now().checked_add(timeout) else {
            // Effectively unbounded; wait until cancelled.
            let mut guard = self.lock.lock();
            while !self.is_cancelled() {
                self.signal.wait(&mut guard);
            }
            return true;
        };

        let mut guard = self.lock.lock();
        while !self.is_cancelled() {
            if self.signal.wait_until(&mut guard, deadline).timed_out() {
                break;
            }
        }
        self.is_cancelled()
    }
}

impl std::fmt::Debug for CancellationToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancellationToken")
            .field("cancelled", &self.is_cancelled())
            .field("reason", &self.reason())
            .finish_non_exhaustive()
    }
}
