//! Outcome classification shared by every failure-handling policy.

use crate::errors::Error;
use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;

type ErrorPredicate = Arc<dyn Fn(&Error) -> bool + Send + Sync>;
type ResultPredicate<R> = Arc<dyn Fn(&R) -> bool + Send + Sync>;
type OutcomePredicate<R> = Arc<dyn Fn(&Result<R, Error>) -> bool + Send + Sync>;

/// Decides whether an outcome counts as a handled failure for a policy.
///
/// Matchers are OR-ed: a single match classifies the outcome as handled.
/// Once a policy is built its classifier is never mutated again, so it can be
/// evaluated any number of times, from any thread.
pub struct OutcomeClassifier<R> {
    error_predicates: Vec<ErrorPredicate>,
    result_predicates: Vec<ResultPredicate<R>>,
    outcome_predicates: Vec<OutcomePredicate<R>>,
    errors_by_default: bool,
}

impl<R> OutcomeClassifier<R> {
    /// Creates a failure classifier.
    ///
    /// With no matchers it handles any error. Errors are also handled when
    /// only result matchers are configured, since nothing checks them.
    #[must_use]
    pub fn failures() -> Self {
        Self {
            error_predicates: Vec::new(),
            result_predicates: Vec::new(),
            outcome_predicates: Vec::new(),
            errors_by_default: true,
        }
    }

    /// Creates a classifier that only matches what is explicitly configured.
    ///
    /// Used for abort conditions: with no matchers it never matches.
    #[must_use]
    pub fn conditions() -> Self {
        Self {
            errors_by_default: false,
            ..Self::failures()
        }
    }

    /// Matches errors equal to `error` anywhere in their source chain.
    pub fn push_error<E>(&mut self, error: E)
    where
        E: StdError + PartialEq + Send + Sync + 'static,
    {
        self.error_predicates.push(error_equal_to(error));
    }

    /// Matches errors whose source chain contains an error of type `E`.
    pub fn push_error_type<E>(&mut self)
    where
        E: StdError + 'static,
    {
        self.error_predicates.push(error_of_type::<E>());
    }

    /// Matches errors accepted by `predicate`.
    pub fn push_error_if<F>(&mut self, predicate: F)
    where
        F: Fn(&Error) -> bool + Send + Sync + 'static,
    {
        self.error_predicates.push(Arc::new(predicate));
    }

    /// Matches results equal to `result`.
    pub fn push_result(&mut self, result: R)
    where
        R: PartialEq + Send + Sync + 'static,
    {
        self.result_predicates
            .push(Arc::new(move |candidate: &R| *candidate == result));
    }

    /// Matches results accepted by `predicate`.
    pub fn push_result_if<F>(&mut self, predicate: F)
    where
        F: Fn(&R) -> bool + Send + Sync + 'static,
    {
        self.result_predicates.push(Arc::new(predicate));
    }

    /// Matches whole outcomes accepted by `predicate`.
    ///
    /// An outcome predicate counts as checking errors, so unmatched errors
    /// are no longer handled by default.
    pub fn push_outcome_if<F>(&mut self, predicate: F)
    where
        F: Fn(&Result<R, Error>) -> bool + Send + Sync + 'static,
    {
        self.outcome_predicates.push(Arc::new(predicate));
    }

    /// Returns true if no matcher has been configured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.error_predicates.is_empty()
            && self.result_predicates.is_empty()
            && self.outcome_predicates.is_empty()
    }

    /// Returns true if the outcome is a handled failure.
    pub fn matches(&self, outcome: &Result<R, Error>) -> bool {
        if self.is_empty() {
            return self.errors_by_default && outcome.is_err();
        }

        let matched = match outcome {
            Ok(result) => self
                .result_predicates
                .iter()
                .any(|predicate| predicate(result)),
            Err(error) => self
                .error_predicates
                .iter()
                .any(|predicate| predicate(error)),
        };
        if matched
            || self
                .outcome_predicates
                .iter()
                .any(|predicate| predicate(outcome))
        {
            return true;
        }

        let errors_checked =
            !self.error_predicates.is_empty() || !self.outcome_predicates.is_empty();
        self.errors_by_default && outcome.is_err() && !errors_checked
    }
}

fn error_equal_to<E>(error: E) -> ErrorPredicate
where
    E: StdError + PartialEq + Send + Sync + 'static,
{
    Arc::new(move |candidate: &Error| candidate.is(&error))
}

fn error_of_type<E>() -> ErrorPredicate
where
    E: StdError + 'static,
{
    Arc::new(|candidate: &Error| candidate.is_type::<E>())
}

impl<R> Clone for OutcomeClassifier<R> {
    fn clone(&self) -> Self {
        Self {
            error_predicates: self.error_predicates.clone(),
            result_predicates: self.result_predicates.clone(),
            outcome_predicates: self.outcome_predicates.clone(),
            errors_by_default: self.errors_by_default,
        }
    }
}

impl<R> fmt::Debug for OutcomeClassifier<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OutcomeClassifier")
            .field("error_predicates", &self.error_predicates.len())
            .field("result_predicates", &self.result_predicates.len())
            .field("outcome_predicates", &self.outcome_predicates.len())
            .field("errors_by_default", &self.errors_by_default)
            .finish()
    }
}

/// Builder methods shared by policies that classify failures.
///
/// Implemented by [`RetryPolicyBuilder`](crate::retry::RetryPolicyBuilder)
/// and [`FallbackPolicyBuilder`](crate::fallback::FallbackPolicyBuilder).
pub trait FailurePolicyBuilder<R>: Sized {
    /// Returns the failure classifier being configured.
    fn classifier_mut(&mut self) -> &mut OutcomeClassifier<R>;

    /// Handles errors equal to `error`, including when wrapped by another error.
    #[must_use]
    fn handle_error<E>(mut self, error: E) -> Self
    where
        E: StdError + PartialEq + Send + Sync + 'static,
    {
        self.classifier_mut().push_error(error);
        self
    }

    /// Handles errors equal to any of `errors`.
    #[must_use]
    fn handle_errors<E, I>(mut self, errors: I) -> Self
    where
        E: StdError + PartialEq + Send + Sync + 'static,
        I: IntoIterator<Item = E>,
    {
        for error in errors {
            self.classifier_mut().push_error(error);
        }
        self
    }

    /// Handles errors whose source chain contains an error of type `E`.
    #[must_use]
    fn handle_error_type<E>(mut self) -> Self
    where
        E: StdError + 'static,
    {
        self.classifier_mut().push_error_type::<E>();
        self
    }

    /// Handles errors accepted by `predicate`.
    #[must_use]
    fn handle_error_if<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&Error) -> bool + Send + Sync + 'static,
    {
        self.classifier_mut().push_error_if(predicate);
        self
    }

    /// Handles results equal to `result`.
    #[must_use]
    fn handle_result(mut self, result: R) -> Self
    where
        R: PartialEq + Send + Sync + 'static,
    {
        self.classifier_mut().push_result(result);
        self
    }

    /// Handles results accepted by `predicate`.
    #[must_use]
    fn handle_result_if<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&R) -> bool + Send + Sync + 'static,
    {
        self.classifier_mut().push_result_if(predicate);
        self
    }

    /// Handles outcomes accepted by `predicate`.
    #[must_use]
    fn handle_if<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&Result<R, Error>) -> bool + Send + Sync + 'static,
    {
        self.classifier_mut().push_outcome_if(predicate);
        self
    }
}
