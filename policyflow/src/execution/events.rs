//! Immutable event snapshots handed to policy and executor listeners.

use super::Execution;
use crate::errors::Error;
use std::fmt;
use std::ops::Deref;
use std::sync::Arc;
use std::time::Duration;

/// A read-only view of an execution at the moment an event fires.
///
/// Dereferences to [`Execution`], so every accessor of the context is
/// available on the event.
pub struct ExecutionEvent<'a, R> {
    execution: &'a Execution<R>,
}

impl<'a, R> ExecutionEvent<'a, R> {
    pub(crate) fn new(execution: &'a Execution<R>) -> Self {
        Self { execution }
    }
}

impl<R> Deref for ExecutionEvent<'_, R> {
    type Target = Execution<R>;

    fn deref(&self) -> &Self::Target {
        self.execution
    }
}

impl<R> fmt::Debug for ExecutionEvent<'_, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ExecutionEvent").field(self.execution).finish()
    }
}

/// Fired when a retry has been scheduled, before the delay is waited out.
pub struct ExecutionScheduledEvent<'a, R> {
    execution: &'a Execution<R>,
    /// The delay before the next attempt.
    pub delay: Duration,
}

impl<'a, R> ExecutionScheduledEvent<'a, R> {
    pub(crate) fn new(execution: &'a Execution<R>, delay: Duration) -> Self {
        Self { execution, delay }
    }

    /// Returns the delay before the next attempt.
    #[must_use]
    pub fn delay(&self) -> Duration {
        self.delay
    }
}

impl<R> Deref for ExecutionScheduledEvent<'_, R> {
    type Target = Execution<R>;

    fn deref(&self) -> &Self::Target {
        self.execution
    }
}

impl<R> fmt::Debug for ExecutionScheduledEvent<'_, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionScheduledEvent")
            .field("execution", self.execution)
            .field("delay", &self.delay)
            .finish()
    }
}

/// Fired when a policy or an executor has produced an outcome.
pub struct ExecutionDoneEvent<'a, R> {
    execution: &'a Execution<R>,
    outcome: &'a Result<R, Error>,
}

impl<'a, R> ExecutionDoneEvent<'a, R> {
    pub(crate) fn new(execution: &'a Execution<R>, outcome: &'a Result<R, Error>) -> Self {
        Self { execution, outcome }
    }

    /// Returns the outcome being reported.
    #[must_use]
    pub fn outcome(&self) -> &'a Result<R, Error> {
        self.outcome
    }

    /// Returns the result, if the outcome is a success.
    #[must_use]
    pub fn result(&self) -> Option<&'a R> {
        self.outcome.as_ref().ok()
    }

    /// Returns the error, if the outcome is a failure.
    #[must_use]
    pub fn error(&self) -> Option<&'a Error> {
        self.outcome.as_ref().err()
    }
}

impl<R> Deref for ExecutionDoneEvent<'_, R> {
    type Target = Execution<R>;

    fn deref(&self) -> &Self::Target {
        self.execution
    }
}

impl<R> fmt::Debug for ExecutionDoneEvent<'_, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionDoneEvent")
            .field("execution", self.execution)
            .field("error", &self.error())
            .finish_non_exhaustive()
    }
}

/// Listener for plain execution events.
pub type EventListener<R> = Arc<dyn for<'a> Fn(&ExecutionEvent<'a, R>) + Send + Sync>;

/// Listener for scheduled-retry events.
pub type ScheduledListener<R> = Arc<dyn for<'a> Fn(&ExecutionScheduledEvent<'a, R>) + Send + Sync>;

/// Listener for completion events.
pub type DoneListener<R> = Arc<dyn for<'a> Fn(&ExecutionDoneEvent<'a, R>) + Send + Sync>;
