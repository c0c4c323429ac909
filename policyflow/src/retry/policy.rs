//! Retry policy configuration and its builder.

use super::delay::{DelayCalculator, DelayStrategy, Jitter};
use crate::errors::{Error, PolicyError};
use crate::execution::{
    EventListener, ExecutionEvent, ExecutionScheduledEvent, ScheduledListener,
};
use crate::policy::{FailurePolicyBuilder, OutcomeClassifier};
use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Default number of retries after the first attempt.
pub const DEFAULT_MAX_RETRIES: i32 = 2;

/// Default backoff growth factor.
pub const DEFAULT_BACKOFF_FACTOR: f64 = 2.0;

/// Observer callbacks of a retry policy. They never alter control flow.
pub(super) struct RetryListeners<R> {
    pub(super) on_retry: Option<EventListener<R>>,
    pub(super) on_retry_scheduled: Option<ScheduledListener<R>>,
    pub(super) on_retries_exceeded: Option<EventListener<R>>,
    pub(super) on_abort: Option<EventListener<R>>,
    pub(super) on_failed_attempt: Option<EventListener<R>>,
    pub(super) on_success: Option<EventListener<R>>,
    pub(super) on_failure: Option<EventListener<R>>,
}

impl<R> Default for RetryListeners<R> {
    fn default() -> Self {
        Self {
            on_retry: None,
            on_retry_scheduled: None,
            on_retries_exceeded: None,
            on_abort: None,
            on_failed_attempt: None,
            on_success: None,
            on_failure: None,
        }
    }
}

impl<R> Clone for RetryListeners<R> {
    fn clone(&self) -> Self {
        Self {
            on_retry: self.on_retry.clone(),
            on_retry_scheduled: self.on_retry_scheduled.clone(),
            on_retries_exceeded: self.on_retries_exceeded.clone(),
            on_abort: self.on_abort.clone(),
            on_failed_attempt: self.on_failed_attempt.clone(),
            on_success: self.on_success.clone(),
            on_failure: self.on_failure.clone(),
        }
    }
}

/// A policy that re-runs failed executions.
///
/// By default it handles any error, allows 2 retries (3 attempts in total)
/// and does not wait between attempts.
///
/// ```rust,ignore
/// let retry = RetryPolicy::<String>::builder()
///     .handle_error(ConnectionReset)
///     .with_backoff(Duration::from_millis(10), Duration::from_secs(1))
///     .with_jitter_factor(0.2)
///     .with_max_retries(5)
///     .build()?;
/// ```
pub struct RetryPolicy<R> {
    pub(super) failure: OutcomeClassifier<R>,
    pub(super) abort: OutcomeClassifier<R>,
    pub(super) max_retries: i32,
    pub(super) max_duration: Option<Duration>,
    pub(super) delay: DelayCalculator,
    pub(super) return_last_failure: bool,
    pub(super) listeners: RetryListeners<R>,
}

impl<R> RetryPolicy<R> {
    /// Creates a builder with default settings.
    #[must_use]
    pub fn builder() -> RetryPolicyBuilder<R> {
        RetryPolicyBuilder::new()
    }

    /// Creates a policy with default settings.
    #[must_use]
    pub fn with_defaults() -> Self {
        RetryPolicyBuilder::new().into_policy()
    }

    /// Returns the maximum number of retries; `-1` means unlimited.
    #[must_use]
    pub fn max_retries(&self) -> i32 {
        self.max_retries
    }

    /// Returns the wall-clock budget measured from the first attempt.
    #[must_use]
    pub fn max_duration(&self) -> Option<Duration> {
        self.max_duration
    }

    /// Returns the delay calculator.
    #[must_use]
    pub fn delay(&self) -> DelayCalculator {
        self.delay
    }

    /// Returns true if the outcome is a failure this policy retries.
    pub fn is_failure(&self, outcome: &Result<R, Error>) -> bool {
        self.failure.matches(outcome)
    }

    /// Returns true if the outcome matches an abort condition.
    pub fn is_abortable(&self, outcome: &Result<R, Error>) -> bool {
        self.abort.matches(outcome)
    }
}

impl<R> Clone for RetryPolicy<R> {
    fn clone(&self) -> Self {
        Self {
            failure: self.failure.clone(),
            abort: self.abort.clone(),
            max_retries: self.max_retries,
            max_duration: self.max_duration,
            delay: self.delay,
            return_last_failure: self.return_last_failure,
            listeners: self.listeners.clone(),
        }
    }
}

impl<R> fmt::Debug for RetryPolicy<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("failure", &self.failure)
            .field("abort", &self.abort)
            .field("max_retries", &self.max_retries)
            .field("max_duration", &self.max_duration)
            .field("delay", &self.delay)
            .field("return_last_failure", &self.return_last_failure)
            .finish_non_exhaustive()
    }
}

/// Builds [`RetryPolicy`] instances.
///
/// Failure conditions come from [`FailurePolicyBuilder`].
pub struct RetryPolicyBuilder<R> {
    failure: OutcomeClassifier<R>,
    abort: OutcomeClassifier<R>,
    max_retries: i32,
    max_duration: Option<Duration>,
    strategy: DelayStrategy,
    jitter_factor: Option<f64>,
    jitter_range: Option<Duration>,
    return_last_failure: bool,
    listeners: RetryListeners<R>,
}

impl<R> Default for RetryPolicyBuilder<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R> RetryPolicyBuilder<R> {
    /// Creates a builder with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self {
            failure: OutcomeClassifier::failures(),
            abort: OutcomeClassifier::conditions(),
            max_retries: DEFAULT_MAX_RETRIES,
            max_duration: None,
            strategy: DelayStrategy::None,
            jitter_factor: None,
            jitter_range: None,
            return_last_failure: false,
            listeners: RetryListeners::default(),
        }
    }

    /// Sets the maximum number of retries; `-1` retries without limit.
    #[must_use]
    pub fn with_max_retries(mut self, max_retries: i32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Sets the maximum number of attempts, including the first; `-1` is unlimited.
    #[must_use]
    pub fn with_max_attempts(mut self, max_attempts: i32) -> Self {
        self.max_retries = if max_attempts == -1 {
            -1
        } else {
            max_attempts.saturating_sub(1)
        };
        self
    }

    /// Stops retrying once this much time has passed since the first attempt.
    #[must_use]
    pub fn with_max_duration(mut self, max_duration: Duration) -> Self {
        self.max_duration = Some(max_duration);
        self
    }

    /// Waits a fixed delay between attempts.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.strategy = if delay.is_zero() {
            DelayStrategy::None
        } else {
            DelayStrategy::Fixed(delay)
        };
        self
    }

    /// Doubles the delay after every retry, starting at `base`, up to `max`.
    #[must_use]
    pub fn with_backoff(self, base: Duration, max: Duration) -> Self {
        self.with_backoff_factor(base, max, DEFAULT_BACKOFF_FACTOR)
    }

    /// Multiplies the delay by `factor` after every retry, starting at `base`, up to `max`.
    #[must_use]
    pub fn with_backoff_factor(mut self, base: Duration, max: Duration, factor: f64) -> Self {
        self.strategy = DelayStrategy::Backoff { base, max, factor };
        self
    }

    /// Waits a random delay in `[min, max)` between attempts.
    #[must_use]
    pub fn with_random_delay(mut self, min: Duration, max: Duration) -> Self {
        self.strategy = DelayStrategy::Random { min, max };
        self
    }

    /// Perturbs each delay by up to `factor` of itself in either direction.
    #[must_use]
    pub fn with_jitter_factor(mut self, factor: f64) -> Self {
        self.jitter_factor = Some(factor);
        self
    }

    /// Perturbs each delay by up to `range` in either direction.
    #[must_use]
    pub fn with_jitter(mut self, range: Duration) -> Self {
        self.jitter_range = Some(range);
        self
    }

    /// Stops retrying immediately when an error equal to `error` occurs.
    #[must_use]
    pub fn abort_on_error<E>(mut self, error: E) -> Self
    where
        E: StdError + PartialEq + Send + Sync + 'static,
    {
        self.abort.push_error(error);
        self
    }

    /// Stops retrying immediately when an error of type `E` occurs.
    #[must_use]
    pub fn abort_on_error_type<E>(mut self) -> Self
    where
        E: StdError + 'static,
    {
        self.abort.push_error_type::<E>();
        self
    }

    /// Stops retrying immediately when `result` is returned.
    #[must_use]
    pub fn abort_on_result(mut self, result: R) -> Self
    where
        R: PartialEq + Send + Sync + 'static,
    {
        self.abort.push_result(result);
        self
    }

    /// Stops retrying immediately when `predicate` accepts the outcome.
    #[must_use]
    pub fn abort_if<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&Result<R, Error>) -> bool + Send + Sync + 'static,
    {
        self.abort.push_outcome_if(predicate);
        self
    }

    /// Surfaces the last failure as-is on exhaustion instead of wrapping it in
    /// [`RetriesExceededError`](crate::RetriesExceededError).
    #[must_use]
    pub fn return_last_failure(mut self) -> Self {
        self.return_last_failure = true;
        self
    }

    /// Called immediately before each retry attempt.
    #[must_use]
    pub fn on_retry<F>(mut self, listener: F) -> Self
    where
        F: Fn(&ExecutionEvent<'_, R>) + Send + Sync + 'static,
    {
        self.listeners.on_retry = Some(Arc::new(listener));
        self
    }

    /// Called when a retry is scheduled, before its delay is waited out.
    #[must_use]
    pub fn on_retry_scheduled<F>(mut self, listener: F) -> Self
    where
        F: Fn(&ExecutionScheduledEvent<'_, R>) + Send + Sync + 'static,
    {
        self.listeners.on_retry_scheduled = Some(Arc::new(listener));
        self
    }

    /// Called when attempts or the time budget run out.
    #[must_use]
    pub fn on_retries_exceeded<F>(mut self, listener: F) -> Self
    where
        F: Fn(&ExecutionEvent<'_, R>) + Send + Sync + 'static,
    {
        self.listeners.on_retries_exceeded = Some(Arc::new(listener));
        self
    }

    /// Called when an abort condition stops retrying.
    #[must_use]
    pub fn on_abort<F>(mut self, listener: F) -> Self
    where
        F: Fn(&ExecutionEvent<'_, R>) + Send + Sync + 'static,
    {
        self.listeners.on_abort = Some(Arc::new(listener));
        self
    }

    /// Called after every attempt that ends in a handled failure.
    #[must_use]
    pub fn on_failed_attempt<F>(mut self, listener: F) -> Self
    where
        F: Fn(&ExecutionEvent<'_, R>) + Send + Sync + 'static,
    {
        self.listeners.on_failed_attempt = Some(Arc::new(listener));
        self
    }

    /// Called when the policy completes with a success.
    #[must_use]
    pub fn on_success<F>(mut self, listener: F) -> Self
    where
        F: Fn(&ExecutionEvent<'_, R>) + Send + Sync + 'static,
    {
        self.listeners.on_success = Some(Arc::new(listener));
        self
    }

    /// Called when the policy completes with a failure (exhausted or aborted).
    #[must_use]
    pub fn on_failure<F>(mut self, listener: F) -> Self
    where
        F: Fn(&ExecutionEvent<'_, R>) + Send + Sync + 'static,
    {
        self.listeners.on_failure = Some(Arc::new(listener));
        self
    }

    /// Validates the configuration and builds the policy.
    pub fn build(self) -> Result<RetryPolicy<R>, PolicyError> {
        self.validate()?;
        Ok(self.into_policy())
    }

    fn validate(&self) -> Result<(), PolicyError> {
        if self.max_retries < -1 {
            return Err(invalid("max_retries must be -1 or greater"));
        }

        match self.strategy {
            DelayStrategy::Backoff { base, max, factor } => {
                if base.is_zero() {
                    return Err(invalid("backoff base delay must be greater than zero"));
                }
                if max <= base {
                    return Err(invalid("backoff max delay must be greater than the base delay"));
                }
                if factor.is_nan() || factor <= 1.0 {
                    return Err(invalid("backoff factor must be greater than 1"));
                }
            }
            DelayStrategy::Random { min, max } if min >= max => {
                return Err(invalid("random delay min must be less than max"));
            }
            _ => {}
        }

        if self.jitter_factor.is_some() && self.jitter_range.is_some() {
            return Err(invalid("configure either a jitter factor or a jitter range, not both"));
        }
        if let Some(factor) = self.jitter_factor {
            if !(0.0..=1.0).contains(&factor) {
                return Err(invalid("jitter factor must be between 0 and 1"));
            }
        }

        if let Some(max_duration) = self.max_duration {
            if self.strategy.max_delay() >= max_duration {
                return Err(invalid("delay must be less than the max duration"));
            }
        }

        Ok(())
    }

    fn into_policy(self) -> RetryPolicy<R> {
        let jitter = match (self.jitter_factor, self.jitter_range) {
            (Some(factor), _) => Jitter::Factor(factor),
            (None, Some(range)) => Jitter::Range(range),
            (None, None) => Jitter::None,
        };

        RetryPolicy {
            failure: self.failure,
            abort: self.abort,
            max_retries: self.max_retries,
            max_duration: self.max_duration,
            delay: DelayCalculator::new(self.strategy, jitter),
            return_last_failure: self.return_last_failure,
            listeners: self.listeners,
        }
    }
}

impl<R> FailurePolicyBuilder<R> for RetryPolicyBuilder<R> {
    fn classifier_mut(&mut self) -> &mut OutcomeClassifier<R> {
        &mut self.failure
    }
}

fn invalid(message: &str) -> PolicyError {
    PolicyError::InvalidConfig(message.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use thiserror::Error;

    #[derive(Debug, Clone, PartialEq, Eq, Error)]
    #[error("unavailable")]
    struct Unavailable;

    #[test]
    fn test_defaults() {
        let policy = RetryPolicy::<bool>::with_defaults();
        assert_eq!(policy.max_retries(), 2);
        assert_eq!(policy.max_duration(), None);
        assert_eq!(policy.delay().strategy(), DelayStrategy::None);
        assert_eq!(policy.delay().jitter(), Jitter::None);
        assert!(policy.is_failure(&Err(Error::new(Unavailable))));
        assert!(!policy.is_failure(&Ok(false)));
        assert!(!policy.is_abortable(&Err(Error::new(Unavailable))));
    }

    #[test]
    fn test_max_attempts_maps_to_retries() {
        let policy = RetryPolicy::<()>::builder().with_max_attempts(5).build();
        assert_eq!(policy.map(|p| p.max_retries()), Ok(4));

        let unlimited = RetryPolicy::<()>::builder().with_max_attempts(-1).build();
        assert_eq!(unlimited.map(|p| p.max_retries()), Ok(-1));
    }

    #[test]
    fn test_zero_delay_means_no_delay() {
        let policy = RetryPolicy::<()>::builder()
            .with_delay(Duration::ZERO)
            .build();
        assert_eq!(policy.map(|p| p.delay().strategy()), Ok(DelayStrategy::None));
    }

    #[test]
    fn test_jitter_factor_selected() {
        let policy = RetryPolicy::<()>::builder()
            .with_delay(Duration::from_millis(10))
            .with_jitter_factor(0.25)
            .build();
        assert_eq!(policy.map(|p| p.delay().jitter()), Ok(Jitter::Factor(0.25)));
    }

    #[test]
    fn test_failure_and_abort_conditions() {
        let policy = RetryPolicy::<i32>::builder()
            .handle_result(0)
            .abort_on_error(Unavailable)
            .build();
        assert!(policy.is_ok());
        let policy = policy.unwrap();

        assert!(policy.is_failure(&Ok(0)));
        assert!(!policy.is_failure(&Ok(1)));
        assert!(policy.is_abortable(&Err(Error::new(Unavailable))));
        assert!(!policy.is_abortable(&Ok(0)));
    }

    #[test]
    fn test_rejects_invalid_max_retries() {
        let result = RetryPolicy::<()>::builder().with_max_retries(-2).build();
        assert!(matches!(result, Err(PolicyError::InvalidConfig(_))));
    }

    #[test]
    fn test_rejects_invalid_backoff() {
        let same_bounds = RetryPolicy::<()>::builder()
            .with_backoff(Duration::from_secs(1), Duration::from_secs(1))
            .build();
        assert!(same_bounds.is_err());

        let flat = RetryPolicy::<()>::builder()
            .with_backoff_factor(Duration::from_secs(1), Duration::from_secs(5), 1.0)
            .build();
        assert!(flat.is_err());

        let zero_base = RetryPolicy::<()>::builder()
            .with_backoff(Duration::ZERO, Duration::from_secs(5))
            .build();
        assert!(zero_base.is_err());
    }

    #[test]
    fn test_rejects_invalid_jitter() {
        let both = RetryPolicy::<()>::builder()
            .with_jitter_factor(0.1)
            .with_jitter(Duration::from_millis(5))
            .build();
        assert!(both.is_err());

        let too_large = RetryPolicy::<()>::builder().with_jitter_factor(1.5).build();
        assert!(too_large.is_err());
    }

    #[test]
    fn test_rejects_delay_exceeding_max_duration() {
        let result = RetryPolicy::<()>::builder()
            .with_delay(Duration::from_secs(2))
            .with_max_duration(Duration::from_secs(1))
            .build();
        assert_eq!(
            result.err(),
            Some(PolicyError::InvalidConfig(
                "delay must be less than the max duration".to_string()
            ))
        );
    }

    #[test]
    fn test_rejects_inverted_random_delay() {
        let result = RetryPolicy::<()>::builder()
            .with_random_delay(Duration::from_millis(20), Duration::from_millis(10))
            .build();
        assert!(result.is_err());
    }
}
