//! Assertions on executor calls.

use crate::errors::Error;
use crate::execution::ExecutionDoneEvent;
use crate::executor::Executor;
use parking_lot::Mutex;
use std::error::Error as StdError;
use std::fmt::Debug;
use std::sync::Arc;

/// Runs `f` through a copy of `executor` that records the final counters.
fn run_recorded<R, F>(executor: &Executor<R>, f: F) -> (Result<R, Error>, u32, u32)
where
    R: Clone + 'static,
    F: FnMut() -> Result<R, Error>,
{
    let counts = Arc::new(Mutex::new((0, 0)));
    let recorder = Arc::clone(&counts);
    let executor = executor
        .clone()
        .on_complete(move |event: &ExecutionDoneEvent<'_, R>| {
            *recorder.lock() = (event.attempts(), event.executions());
        });

    let outcome = executor.get(f);
    let (attempts, executions) = *counts.lock();
    (outcome, attempts, executions)
}

fn assert_counts(attempts: u32, executions: u32, expected_attempts: u32, expected_executions: u32) {
    assert_eq!(
        attempts, expected_attempts,
        "Expected {expected_attempts} attempts, got {attempts}"
    );
    assert_eq!(
        executions, expected_executions,
        "Expected {expected_executions} executions, got {executions}"
    );
}

/// Asserts that a call succeeds with `expected` after the given attempts and executions.
///
/// Replaces the executor's `on_complete` listener for the duration of the call.
pub fn assert_get_success<R, F>(
    executor: &Executor<R>,
    f: F,
    expected_attempts: u32,
    expected_executions: u32,
    expected: &R,
) where
    R: Clone + PartialEq + Debug + 'static,
    F: FnMut() -> Result<R, Error>,
{
    let (outcome, attempts, executions) = run_recorded(executor, f);
    assert_counts(attempts, executions, expected_attempts, expected_executions);
    match outcome {
        Ok(ref result) => assert_eq!(
            result, expected,
            "Expected result {expected:?}, got {result:?}"
        ),
        Err(error) => panic!("Expected success, got error: {error}"),
    }
}

/// Asserts that a call fails with an error whose chain contains `expected`.
pub fn assert_get_failure<R, F, E>(
    executor: &Executor<R>,
    f: F,
    expected_attempts: u32,
    expected_executions: u32,
    expected: &E,
) where
    R: Clone + Debug + 'static,
    F: FnMut() -> Result<R, Error>,
    E: StdError + PartialEq + 'static,
{
    assert_get_failure_matching(executor, f, expected_attempts, expected_executions, |error| {
        error.is(expected)
    });
}

/// Asserts that a call fails with an error accepted by `predicate`.
pub fn assert_get_failure_matching<R, F, P>(
    executor: &Executor<R>,
    f: F,
    expected_attempts: u32,
    expected_executions: u32,
    predicate: P,
) where
    R: Clone + Debug + 'static,
    F: FnMut() -> Result<R, Error>,
    P: FnOnce(&Error) -> bool,
{
    let (outcome, attempts, executions) = run_recorded(executor, f);
    assert_counts(attempts, executions, expected_attempts, expected_executions);
    match outcome {
        Ok(result) => panic!("Expected failure, got result: {result:?}"),
        Err(error) => assert!(predicate(&error), "Unexpected error: {error}"),
    }
}

/// Asserts that a call without a result fails with an error whose chain contains `expected`.
pub fn assert_run_failure<F, E>(
    executor: &Executor<()>,
    f: F,
    expected_attempts: u32,
    expected_executions: u32,
    expected: &E,
) where
    F: FnMut() -> Result<(), Error>,
    E: StdError + PartialEq + 'static,
{
    assert_get_failure(executor, f, expected_attempts, expected_executions, expected);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ConnectingError, TimeoutError};

    #[test]
    fn test_assert_get_success_without_policies() {
        assert_get_success(&Executor::new(), || Ok(3), 1, 1, &3);
    }

    #[test]
    fn test_assert_run_failure_without_policies() {
        assert_run_failure(&Executor::new(), || Err(ConnectingError.into()), 1, 1, &ConnectingError);
    }

    #[test]
    #[should_panic(expected = "Unexpected error")]
    fn test_assert_get_failure_rejects_other_error() {
        assert_get_failure(
            &Executor::<u8>::new(),
            || Err(ConnectingError.into()),
            1,
            1,
            &TimeoutError,
        );
    }

    #[test]
    #[should_panic(expected = "Expected 2 attempts")]
    fn test_assert_counts_mismatch() {
        assert_get_success(&Executor::new(), || Ok(true), 2, 2, &true);
    }
}
