//! The per-call execution context shared by every policy in a chain.

use crate::cancellation::CancellationToken;
use crate::errors::Error;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// The mutable record of one logical call's progress.
///
/// An `Execution` is created when an [`Executor`](crate::Executor) begins a
/// call, is owned by that call alone, and is mutated in place by each policy
/// layer as attempts proceed. User functions and listeners only ever see it
/// through a shared reference.
///
/// The last outcome is always the user function's own outcome from the most
/// recent attempt. What a policy layer passes on to its caller, such as a
/// `RetriesExceededError` or a fallback substitute, never replaces it.
pub struct Execution<R> {
    attempts: u32,
    executions: u32,
    start_time: Instant,
    attempt_start_time: Instant,
    last_outcome: Option<Result<R, Error>>,
    complete: bool,
    cancellation: Arc<CancellationToken>,
}

impl<R> Execution<R> {
    /// Creates an execution whose first attempt starts now.
    pub(crate) fn new(cancellation: Arc<CancellationToken>) -> Self {
        let now = Instant::now();
        Self {
            attempts: 1,
            executions: 0,
            start_time: now,
            attempt_start_time: now,
            last_outcome: None,
            complete: false,
            cancellation,
        }
    }

    /// Returns the number of attempts started so far, including the current one.
    #[must_use]
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Returns the number of times the user function actually ran to completion.
    #[must_use]
    pub fn executions(&self) -> u32 {
        self.executions
    }

    /// Returns the number of retries, i.e. attempts after the first.
    #[must_use]
    pub fn retries(&self) -> u32 {
        self.attempts.saturating_sub(1)
    }

    /// Returns true while the first attempt is in progress.
    #[must_use]
    pub fn is_first_attempt(&self) -> bool {
        self.attempts == 1
    }

    /// Returns true once a retry has started.
    #[must_use]
    pub fn is_retry(&self) -> bool {
        self.attempts > 1
    }

    /// Returns when the first attempt started.
    #[must_use]
    pub fn start_time(&self) -> Instant {
        self.start_time
    }

    /// Returns when the current attempt started.
    #[must_use]
    pub fn attempt_start_time(&self) -> Instant {
        self.attempt_start_time
    }

    /// Returns the time elapsed since the first attempt started.
    #[must_use]
    pub fn elapsed_time(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Returns the time elapsed since the current attempt started.
    #[must_use]
    pub fn elapsed_attempt_time(&self) -> Duration {
        self.attempt_start_time.elapsed()
    }

    /// Returns the result of the most recent attempt, if it succeeded.
    #[must_use]
    pub fn last_result(&self) -> Option<&R> {
        self.last_outcome.as_ref().and_then(|outcome| outcome.as_ref().ok())
    }

    /// Returns the error of the most recent attempt, if it failed.
    #[must_use]
    pub fn last_error(&self) -> Option<&Error> {
        self.last_outcome
            .as_ref()
            .and_then(|outcome| outcome.as_ref().err())
    }

    /// Returns the outcome of the most recent attempt.
    #[must_use]
    pub fn last_outcome(&self) -> Option<&Result<R, Error>> {
        self.last_outcome.as_ref()
    }

    /// Returns true once the call has finished; no further attempts occur.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.complete
    }

    /// Returns true if cancellation has been requested for this call.
    #[must_use]
    pub fn is_canceled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    /// Returns the cancellation token observed by this call.
    #[must_use]
    pub fn cancellation(&self) -> &Arc<CancellationToken> {
        &self.cancellation
    }

    /// Starts the next attempt.
    pub(crate) fn begin_attempt(&mut self) {
        self.attempts += 1;
        self.attempt_start_time = Instant::now();
    }

    /// Counts a completed invocation of the user function.
    pub(crate) fn record_execution(&mut self) {
        self.executions += 1;
    }

    /// Stores the user function's outcome for the attempt in progress.
    pub(crate) fn record(&mut self, outcome: Result<R, Error>) {
        self.last_outcome = Some(outcome);
    }

    /// Marks the call as finished.
    pub(crate) fn complete(&mut self) {
        self.complete = true;
    }
}

impl<R> fmt::Debug for Execution<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Execution")
            .field("attempts", &self.attempts)
            .field("executions", &self.executions)
            .field("elapsed", &self.elapsed_time())
            .field("last_error", &self.last_error())
            .field("complete", &self.complete)
            .field("canceled", &self.is_canceled())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn execution() -> Execution<u32> {
        Execution::new(Arc::new(CancellationToken::new()))
    }

    #[test]
    fn test_new_execution_starts_first_attempt() {
        let exec = execution();
        assert_eq!(exec.attempts(), 1);
        assert_eq!(exec.executions(), 0);
        assert_eq!(exec.retries(), 0);
        assert!(exec.is_first_attempt());
        assert!(!exec.is_retry());
        assert!(!exec.is_complete());
        assert!(exec.last_outcome().is_none());
    }

    #[test]
    fn test_begin_attempt_advances_counters() {
        let mut exec = execution();
        let first_attempt = exec.attempt_start_time();
        exec.begin_attempt();

        assert_eq!(exec.attempts(), 2);
        assert_eq!(exec.retries(), 1);
        assert!(exec.is_retry());
        assert!(exec.attempt_start_time() >= first_attempt);
        assert_eq!(exec.start_time(), first_attempt);
    }

    #[test]
    fn test_record_overwrites_last_outcome() {
        let mut exec = execution();
        exec.record(Err(Error::msg("first")));
        assert_eq!(exec.last_error().map(ToString::to_string), Some("first".to_string()));
        assert!(exec.last_result().is_none());

        exec.record(Ok(7));
        assert_eq!(exec.last_result(), Some(&7));
        assert!(exec.last_error().is_none());
    }

    #[test]
    fn test_cancellation_is_visible() {
        let exec = execution();
        assert!(!exec.is_canceled());
        exec.cancellation().cancel("stop");
        assert!(exec.is_canceled());
    }
}
