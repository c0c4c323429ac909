//! The retry decision loop.

use super::policy::RetryPolicy;
use crate::errors::{Error, RetriesExceededError};
use crate::execution::{EventListener, Execution, ExecutionEvent, ExecutionScheduledEvent};
use crate::policy::{ExecutionFn, Policy};
use tracing::{debug, trace, warn};

/// How a retry loop finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Completion {
    /// The outcome is not a handled failure.
    Success,
    /// An abort condition matched.
    Aborted,
    /// Attempts or the time budget ran out.
    Exhausted,
    /// Cancellation was requested.
    Cancelled,
}

/// What to do after evaluating an attempt.
enum Verdict {
    Complete(Completion),
    Retry,
}

impl<R> Policy<R> for RetryPolicy<R> {
    fn apply<'a>(&'a self, mut inner: ExecutionFn<'a, R>) -> ExecutionFn<'a, R> {
        Box::new(move |exec: &mut Execution<R>| self.execute(exec, &mut inner))
    }
}

impl<R> RetryPolicy<R> {
    fn execute(&self, exec: &mut Execution<R>, inner: &mut ExecutionFn<'_, R>) -> Result<R, Error> {
        let mut failed_attempts: u32 = 0;

        loop {
            let outcome = inner(exec);
            let failure = self.failure.matches(&outcome);
            let abort = failure && self.abort.matches(&outcome);
            if failure {
                failed_attempts += 1;
            }

            match self.evaluate(exec, failure, abort, failed_attempts) {
                Verdict::Complete(completion) => {
                    return self.complete(exec, completion, outcome);
                }
                Verdict::Retry => {}
            }

            let remaining = self
                .max_duration
                .map(|max| max.saturating_sub(exec.elapsed_time()));
            let delay = self.delay.calculate(failed_attempts, remaining);

            debug!(
                attempt = exec.attempts(),
                delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                error = outcome.as_ref().err().map(tracing::field::display),
                "Retry scheduled"
            );
            if let Some(ref listener) = self.listeners.on_retry_scheduled {
                listener(&ExecutionScheduledEvent::new(exec, delay));
            }

            if exec.cancellation().wait_timeout(delay) {
                debug!(attempt = exec.attempts(), "Retry delay interrupted by cancellation");
                return self.complete(exec, Completion::Cancelled, outcome);
            }

            exec.begin_attempt();
            emit(self.listeners.on_retry.as_ref(), exec);
        }
    }

    fn evaluate(
        &self,
        exec: &Execution<R>,
        failure: bool,
        abort: bool,
        failed_attempts: u32,
    ) -> Verdict {
        if exec.is_canceled() {
            return Verdict::Complete(Completion::Cancelled);
        }
        if !failure {
            return Verdict::Complete(Completion::Success);
        }

        emit(self.listeners.on_failed_attempt.as_ref(), exec);
        trace!(
            attempt = exec.attempts(),
            failed_attempts,
            "Attempt failed"
        );

        if abort {
            return Verdict::Complete(Completion::Aborted);
        }

        let retries_used = i64::from(failed_attempts) - 1;
        let retries_exhausted =
            self.max_retries >= 0 && retries_used >= i64::from(self.max_retries);
        let duration_exceeded = self
            .max_duration
            .is_some_and(|max| exec.elapsed_time() >= max);
        if retries_exhausted || duration_exceeded {
            return Verdict::Complete(Completion::Exhausted);
        }

        Verdict::Retry
    }

    fn complete(
        &self,
        exec: &Execution<R>,
        completion: Completion,
        outcome: Result<R, Error>,
    ) -> Result<R, Error> {
        match completion {
            Completion::Success => {
                emit(self.listeners.on_success.as_ref(), exec);
                outcome
            }
            Completion::Cancelled => {
                debug!(attempts = exec.attempts(), "Retries stopped by cancellation");
                outcome
            }
            Completion::Aborted => {
                debug!(attempts = exec.attempts(), "Retries aborted");
                emit(self.listeners.on_abort.as_ref(), exec);
                emit(self.listeners.on_failure.as_ref(), exec);
                outcome
            }
            Completion::Exhausted => {
                warn!(
                    attempts = exec.attempts(),
                    elapsed_ms = u64::try_from(exec.elapsed_time().as_millis()).unwrap_or(u64::MAX),
                    "Retries exceeded"
                );
                emit(self.listeners.on_retries_exceeded.as_ref(), exec);
                emit(self.listeners.on_failure.as_ref(), exec);

                match outcome {
                    outcome if self.return_last_failure => outcome,
                    Ok(_) => Err(RetriesExceededError::new(exec.attempts(), None).into()),
                    Err(cause) => {
                        Err(RetriesExceededError::new(exec.attempts(), Some(cause)).into())
                    }
                }
            }
        }
    }
}

fn emit<R>(listener: Option<&EventListener<R>>, exec: &Execution<R>) {
    if let Some(listener) = listener {
        listener(&ExecutionEvent::new(exec));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cancellation::CancellationToken;
    use crate::policy::FailurePolicyBuilder;
    use crate::retry::RetryPolicyBuilder;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;
    use std::time::{Duration, Instant};

    fn run_with(
        policy: &RetryPolicy<u32>,
        token: Arc<CancellationToken>,
        mut f: impl FnMut(&Execution<u32>) -> Result<u32, Error>,
    ) -> (Result<u32, Error>, u32) {
        let mut exec = Execution::new(token);
        let outcome = {
            let mut chain = policy.apply(Box::new(|exec: &mut Execution<u32>| {
                let outcome = f(&*exec);
                exec.record_execution();
                exec.record(outcome.clone());
                outcome
            }));
            chain(&mut exec)
        };
        (outcome, exec.attempts())
    }

    fn run(
        policy: &RetryPolicy<u32>,
        f: impl FnMut(&Execution<u32>) -> Result<u32, Error>,
    ) -> (Result<u32, Error>, u32) {
        run_with(policy, Arc::new(CancellationToken::new()), f)
    }

    #[test]
    fn test_unlimited_retries_until_success() {
        let policy = RetryPolicyBuilder::<u32>::new().with_max_retries(-1).build().unwrap();
        let (outcome, attempts) = run(&policy, |exec: &Execution<u32>| {
            if exec.attempts() < 10 {
                Err(Error::msg("not yet"))
            } else {
                Ok(exec.attempts())
            }
        });
        assert_eq!(outcome.ok(), Some(10));
        assert_eq!(attempts, 10);
    }

    #[test]
    fn test_zero_retries_runs_once() {
        let policy = RetryPolicyBuilder::<u32>::new().with_max_retries(0).build().unwrap();
        let (outcome, attempts) = run(&policy, |_exec: &Execution<u32>| Err(Error::msg("down")));
        assert!(outcome.err().is_some_and(|e| e.is_type::<RetriesExceededError>()));
        assert_eq!(attempts, 1);
    }

    #[test]
    fn test_handled_result_retried() {
        let policy = RetryPolicyBuilder::<u32>::new().handle_result(0).build().unwrap();
        let (outcome, attempts) =
            run(&policy, |exec: &Execution<u32>| Ok(exec.attempts().saturating_sub(2)));
        assert_eq!(outcome.ok(), Some(1));
        assert_eq!(attempts, 3);
    }

    #[test]
    fn test_cancelled_token_stops_after_current_attempt() {
        let token = Arc::new(CancellationToken::new());
        let policy = RetryPolicyBuilder::<u32>::new().with_max_retries(-1).build().unwrap();
        let canceller = Arc::clone(&token);

        let (outcome, attempts) = run_with(&policy, token, move |exec: &Execution<u32>| {
            if exec.attempts() == 2 {
                canceller.cancel("enough");
            }
            Err(Error::msg("down"))
        });

        assert_eq!(attempts, 2);
        assert!(outcome.err().is_some_and(|e| !e.is_type::<RetriesExceededError>()));
    }

    #[test]
    fn test_delay_clamped_to_time_budget() {
        let policy = RetryPolicyBuilder::<u32>::new()
            .with_delay(Duration::from_millis(40))
            .with_max_duration(Duration::from_millis(60))
            .with_max_retries(-1)
            .build()
            .unwrap();

        let started = Instant::now();
        let (outcome, attempts) = run(&policy, |_exec: &Execution<u32>| Err(Error::msg("down")));

        assert!(outcome.err().is_some_and(|e| e.is_type::<RetriesExceededError>()));
        assert!(attempts >= 2);
        assert!(started.elapsed() < Duration::from_millis(500));
    }
}
