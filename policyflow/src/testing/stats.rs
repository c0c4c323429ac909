//! Shared listener counters.

use crate::execution::{ExecutionDoneEvent, ExecutionEvent, ExecutionScheduledEvent};
use crate::fallback::FallbackPolicyBuilder;
use crate::retry::RetryPolicyBuilder;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

/// Counts listener invocations across any number of calls and threads.
#[derive(Debug, Default)]
pub struct Stats {
    retries: AtomicU32,
    retries_scheduled: AtomicU32,
    retries_exceeded: AtomicU32,
    aborts: AtomicU32,
    failed_attempts: AtomicU32,
    fallbacks: AtomicU32,
    successes: AtomicU32,
    failures: AtomicU32,
}

impl Stats {
    /// Creates zeroed counters.
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Retry attempts started.
    pub fn retries(&self) -> u32 {
        self.retries.load(Ordering::SeqCst)
    }

    /// Retries scheduled.
    pub fn retries_scheduled(&self) -> u32 {
        self.retries_scheduled.load(Ordering::SeqCst)
    }

    /// Times retries were exhausted.
    pub fn retries_exceeded(&self) -> u32 {
        self.retries_exceeded.load(Ordering::SeqCst)
    }

    /// Times an abort condition matched.
    pub fn aborts(&self) -> u32 {
        self.aborts.load(Ordering::SeqCst)
    }

    /// Attempts that ended in a handled failure.
    pub fn failed_attempts(&self) -> u32 {
        self.failed_attempts.load(Ordering::SeqCst)
    }

    /// Fallbacks applied.
    pub fn fallbacks(&self) -> u32 {
        self.fallbacks.load(Ordering::SeqCst)
    }

    /// Policy successes.
    pub fn successes(&self) -> u32 {
        self.successes.load(Ordering::SeqCst)
    }

    /// Policy failures.
    pub fn failures(&self) -> u32 {
        self.failures.load(Ordering::SeqCst)
    }

    /// Zeroes every counter.
    pub fn reset(&self) {
        for counter in [
            &self.retries,
            &self.retries_scheduled,
            &self.retries_exceeded,
            &self.aborts,
            &self.failed_attempts,
            &self.fallbacks,
            &self.successes,
            &self.failures,
        ] {
            counter.store(0, Ordering::SeqCst);
        }
    }
}

fn bump(counter: &AtomicU32) {
    counter.fetch_add(1, Ordering::SeqCst);
}

/// Attaches counting listeners for every retry event.
///
/// Replaces any listeners previously configured on `builder`.
#[must_use]
pub fn with_retry_stats<R: 'static>(
    builder: RetryPolicyBuilder<R>,
    stats: &Arc<Stats>,
) -> RetryPolicyBuilder<R> {
    let (retry, scheduled, exceeded, abort, failed, success, failure) = (
        Arc::clone(stats),
        Arc::clone(stats),
        Arc::clone(stats),
        Arc::clone(stats),
        Arc::clone(stats),
        Arc::clone(stats),
        Arc::clone(stats),
    );
    builder
        .on_retry(move |_: &ExecutionEvent<'_, R>| bump(&retry.retries))
        .on_retry_scheduled(move |_: &ExecutionScheduledEvent<'_, R>| {
            bump(&scheduled.retries_scheduled);
        })
        .on_retries_exceeded(move |_: &ExecutionEvent<'_, R>| bump(&exceeded.retries_exceeded))
        .on_abort(move |_: &ExecutionEvent<'_, R>| bump(&abort.aborts))
        .on_failed_attempt(move |_: &ExecutionEvent<'_, R>| bump(&failed.failed_attempts))
        .on_success(move |_: &ExecutionEvent<'_, R>| bump(&success.successes))
        .on_failure(move |_: &ExecutionEvent<'_, R>| bump(&failure.failures))
}

/// Attaches counting listeners for every fallback event.
///
/// Replaces any listeners previously configured on `builder`.
#[must_use]
pub fn with_fallback_stats<R: 'static>(
    builder: FallbackPolicyBuilder<R>,
    stats: &Arc<Stats>,
) -> FallbackPolicyBuilder<R> {
    let (executed, success, failure) = (Arc::clone(stats), Arc::clone(stats), Arc::clone(stats));
    builder
        .on_fallback_executed(move |_: &ExecutionDoneEvent<'_, R>| bump(&executed.fallbacks))
        .on_success(move |_: &ExecutionDoneEvent<'_, R>| bump(&success.successes))
        .on_failure(move |_: &ExecutionDoneEvent<'_, R>| bump(&failure.failures))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::Error;
    use crate::Executor;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_retry_stats_count_events() {
        let stats = Stats::new();
        let policy = with_retry_stats(RetryPolicyBuilder::<()>::new(), &stats)
            .build()
            .unwrap();

        let _ = Executor::with(policy).run(|| Err(Error::msg("down")));

        assert_eq!(stats.failed_attempts(), 3);
        assert_eq!(stats.retries_scheduled(), 2);
        assert_eq!(stats.retries(), 2);
        assert_eq!(stats.retries_exceeded(), 1);
        assert_eq!(stats.failures(), 1);
        assert_eq!(stats.successes(), 0);
    }

    #[test]
    fn test_reset() {
        let stats = Stats::new();
        bump(&stats.fallbacks);
        bump(&stats.aborts);
        stats.reset();
        assert_eq!(stats.fallbacks(), 0);
        assert_eq!(stats.aborts(), 0);
    }
}
