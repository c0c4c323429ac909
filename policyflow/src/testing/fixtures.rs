//! Error fixtures and scripted user functions.

use crate::errors::Error;
use std::error::Error as StdError;
use std::fmt;
use thiserror::Error;

/// A transient connection failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("connecting")]
pub struct ConnectingError;

/// A failure caused by bad input; usually not worth retrying.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("invalid argument")]
pub struct InvalidArgumentError;

/// A failure caused by the system being in the wrong state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("invalid state")]
pub struct InvalidStateError;

/// An operation that took too long.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("timed out")]
pub struct TimeoutError;

/// An error that wraps another one, to exercise chain-aware matching.
#[derive(Debug, Clone)]
pub struct CompositeError {
    /// The wrapped error.
    pub cause: Error,
}

impl CompositeError {
    /// Wraps `cause`.
    pub fn new(cause: impl Into<Error>) -> Self {
        Self {
            cause: cause.into(),
        }
    }
}

impl fmt::Display for CompositeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "composite error: {}", self.cause)
    }
}

impl StdError for CompositeError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        let cause: &(dyn StdError + 'static) = self.cause.as_std();
        Some(cause)
    }
}

/// Returns a function that fails with `error` `n` times, then returns `result`.
pub fn fail_n_times_then<R: Clone>(
    n: u32,
    error: impl Into<Error>,
    result: R,
) -> impl FnMut() -> Result<R, Error> {
    let error = error.into();
    let mut calls = 0;
    move || {
        calls += 1;
        if calls <= n {
            Err(error.clone())
        } else {
            Ok(result.clone())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_composite_error_exposes_cause() {
        let error = Error::new(CompositeError::new(InvalidStateError));
        assert!(error.is(&InvalidStateError));
        assert_eq!(error.to_string(), "composite error: invalid state");
    }

    #[test]
    fn test_fail_n_times_then() {
        let mut f = fail_n_times_then(2, ConnectingError, "ok");
        assert!(f().is_err());
        assert!(f().is_err());
        assert_eq!(f().ok(), Some("ok"));
        assert_eq!(f().ok(), Some("ok"));
    }
}
