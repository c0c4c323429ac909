//! Fallback policy: substitutes the outcome of a failed execution.

use crate::errors::Error;
use crate::execution::{DoneListener, Execution, ExecutionDoneEvent};
use crate::policy::{ExecutionFn, FailurePolicyBuilder, OutcomeClassifier, Policy};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

type FallbackFn<R> = Arc<dyn Fn(&Execution<R>) -> Result<R, Error> + Send + Sync>;

/// What a fallback substitutes for a handled failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackKind {
    /// A constant result.
    Result,
    /// A constant error.
    Error,
    /// A value computed from the failed execution.
    Function,
}

/// A policy that replaces a handled failure with an alternative outcome.
///
/// The fallback evaluates the final outcome of everything it wraps, once per
/// call. When its classifier matches (any error, by default) the outcome is
/// replaced by a constant result, a constant error, or the value of a
/// function that can inspect the failed execution. The substitute is final:
/// it is not run through this policy again.
pub struct FallbackPolicy<R> {
    classifier: OutcomeClassifier<R>,
    kind: FallbackKind,
    fallback: FallbackFn<R>,
    on_fallback_executed: Option<DoneListener<R>>,
    on_success: Option<DoneListener<R>>,
    on_failure: Option<DoneListener<R>>,
}

impl<R> FallbackPolicy<R> {
    /// Creates a fallback that returns `result` for any error.
    pub fn with_result(result: R) -> Self
    where
        R: Clone + Send + Sync + 'static,
    {
        FallbackPolicyBuilder::with_result(result).build()
    }

    /// Creates a fallback that replaces any error with `error`.
    pub fn with_error(error: impl Into<Error>) -> Self
    where
        R: 'static,
    {
        FallbackPolicyBuilder::with_error(error).build()
    }

    /// Creates a fallback that computes a substitute for any error.
    pub fn with_fn<F>(fallback: F) -> Self
    where
        F: Fn(&Execution<R>) -> Result<R, Error> + Send + Sync + 'static,
    {
        FallbackPolicyBuilder::with_fn(fallback).build()
    }

    /// Returns what this fallback substitutes.
    #[must_use]
    pub fn kind(&self) -> FallbackKind {
        self.kind
    }

    /// Returns true if the outcome would trigger the fallback.
    pub fn is_failure(&self, outcome: &Result<R, Error>) -> bool {
        self.classifier.matches(outcome)
    }

    fn execute(&self, exec: &mut Execution<R>, inner: &mut ExecutionFn<'_, R>) -> Result<R, Error> {
        let outcome = inner(exec);
        if !self.classifier.matches(&outcome) {
            return outcome;
        }

        debug!(
            kind = ?self.kind,
            attempts = exec.attempts(),
            error = outcome.as_ref().err().map(tracing::field::display),
            "Applying fallback"
        );
        let substitute = (self.fallback)(&*exec);
        let still_failed = self.classifier.matches(&substitute);

        let event = ExecutionDoneEvent::new(&*exec, &substitute);
        if let Some(ref listener) = self.on_fallback_executed {
            listener(&event);
        }
        let completion = if still_failed {
            self.on_failure.as_ref()
        } else {
            self.on_success.as_ref()
        };
        if let Some(listener) = completion {
            listener(&event);
        }

        substitute
    }
}

impl<R> Policy<R> for FallbackPolicy<R> {
    fn apply<'a>(&'a self, mut inner: ExecutionFn<'a, R>) -> ExecutionFn<'a, R> {
        Box::new(move |exec: &mut Execution<R>| self.execute(exec, &mut inner))
    }
}

impl<R> Clone for FallbackPolicy<R> {
    fn clone(&self) -> Self {
        Self {
            classifier: self.classifier.clone(),
            kind: self.kind,
            fallback: Arc::clone(&self.fallback),
            on_fallback_executed: self.on_fallback_executed.clone(),
            on_success: self.on_success.clone(),
            on_failure: self.on_failure.clone(),
        }
    }
}

impl<R> fmt::Debug for FallbackPolicy<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FallbackPolicy")
            .field("classifier", &self.classifier)
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

/// Builds [`FallbackPolicy`] instances.
///
/// Failure conditions come from [`FailurePolicyBuilder`]; without any, the
/// fallback handles every error.
pub struct FallbackPolicyBuilder<R> {
    classifier: OutcomeClassifier<R>,
    kind: FallbackKind,
    fallback: FallbackFn<R>,
    on_fallback_executed: Option<DoneListener<R>>,
    on_success: Option<DoneListener<R>>,
    on_failure: Option<DoneListener<R>>,
}

impl<R> FallbackPolicyBuilder<R> {
    fn new(kind: FallbackKind, fallback: FallbackFn<R>) -> Self {
        Self {
            classifier: OutcomeClassifier::failures(),
            kind,
            fallback,
            on_fallback_executed: None,
            on_success: None,
            on_failure: None,
        }
    }

    /// Starts a fallback that substitutes a constant result.
    pub fn with_result(result: R) -> Self
    where
        R: Clone + Send + Sync + 'static,
    {
        Self::new(
            FallbackKind::Result,
            Arc::new(move |_exec: &Execution<R>| Ok(result.clone())),
        )
    }

    /// Starts a fallback that substitutes a constant error.
    pub fn with_error(error: impl Into<Error>) -> Self
    where
        R: 'static,
    {
        let error = error.into();
        Self::new(
            FallbackKind::Error,
            Arc::new(move |_exec: &Execution<R>| Err(error.clone())),
        )
    }

    /// Starts a fallback that computes its substitute from the failed execution.
    pub fn with_fn<F>(fallback: F) -> Self
    where
        F: Fn(&Execution<R>) -> Result<R, Error> + Send + Sync + 'static,
    {
        Self::new(FallbackKind::Function, Arc::new(fallback))
    }

    /// Called with the substitute outcome whenever the fallback is applied.
    #[must_use]
    pub fn on_fallback_executed<F>(mut self, listener: F) -> Self
    where
        F: Fn(&ExecutionDoneEvent<'_, R>) + Send + Sync + 'static,
    {
        self.on_fallback_executed = Some(Arc::new(listener));
        self
    }

    /// Called when an applied fallback produced a successful outcome.
    #[must_use]
    pub fn on_success<F>(mut self, listener: F) -> Self
    where
        F: Fn(&ExecutionDoneEvent<'_, R>) + Send + Sync + 'static,
    {
        self.on_success = Some(Arc::new(listener));
        self
    }

    /// Called when an applied fallback still produced a failure.
    #[must_use]
    pub fn on_failure<F>(mut self, listener: F) -> Self
    where
        F: Fn(&ExecutionDoneEvent<'_, R>) + Send + Sync + 'static,
    {
        self.on_failure = Some(Arc::new(listener));
        self
    }

    /// Builds the policy.
    #[must_use]
    pub fn build(self) -> FallbackPolicy<R> {
        FallbackPolicy {
            classifier: self.classifier,
            kind: self.kind,
            fallback: self.fallback,
            on_fallback_executed: self.on_fallback_executed,
            on_success: self.on_success,
            on_failure: self.on_failure,
        }
    }
}

impl<R> FailurePolicyBuilder<R> for FallbackPolicyBuilder<R> {
    fn classifier_mut(&mut self) -> &mut OutcomeClassifier<R> {
        &mut self.classifier
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cancellation::CancellationToken;
    use crate::policy::Policy;
    use pretty_assertions::assert_eq;
    use thiserror::Error;

    #[derive(Debug, Clone, PartialEq, Eq, Error)]
    #[error("invalid argument")]
    struct InvalidArgument;

    fn run(policy: &FallbackPolicy<i32>, outcome: Result<i32, Error>) -> Result<i32, Error> {
        let mut outcome = Some(outcome);
        let mut chain = policy.apply(Box::new(move |exec: &mut Execution<i32>| {
            let outcome = outcome.take().unwrap_or_else(|| Ok(0));
            exec.record(outcome.clone());
            outcome
        }));
        chain(&mut Execution::new(Arc::new(CancellationToken::new())))
    }

    #[test]
    fn test_kinds() {
        assert_eq!(FallbackPolicy::with_result(1).kind(), FallbackKind::Result);
        assert_eq!(
            FallbackPolicy::<i32>::with_error(InvalidArgument).kind(),
            FallbackKind::Error
        );
        assert_eq!(
            FallbackPolicy::<i32>::with_fn(|_| Ok(1)).kind(),
            FallbackKind::Function
        );
    }

    #[test]
    fn test_result_substituted_for_error() {
        let policy = FallbackPolicy::with_result(42);
        assert_eq!(run(&policy, Err(Error::msg("down"))).ok(), Some(42));
    }

    #[test]
    fn test_success_passes_through() {
        let policy = FallbackPolicy::with_result(42);
        assert_eq!(run(&policy, Ok(7)).ok(), Some(7));
    }

    #[test]
    fn test_error_substituted_for_error() {
        let policy = FallbackPolicy::<i32>::with_error(InvalidArgument);
        let error = run(&policy, Err(Error::msg("down"))).err();
        assert!(error.is_some_and(|e| e.is(&InvalidArgument)));
    }

    #[test]
    fn test_constant_error_is_shared() {
        let replacement = Error::new(InvalidArgument);
        let policy = FallbackPolicy::<i32>::with_error(replacement.clone());
        let error = run(&policy, Err(Error::msg("down"))).err();
        assert!(error.is_some_and(|e| e.ptr_eq(&replacement)));
    }

    #[test]
    fn test_fn_sees_failed_execution() {
        let policy = FallbackPolicy::with_fn(|exec: &Execution<i32>| {
            let message = exec.last_error().map(ToString::to_string).unwrap_or_default();
            Ok(i32::try_from(message.len()).unwrap_or(-1))
        });
        assert_eq!(run(&policy, Err(Error::msg("down"))).ok(), Some(4));
    }

    #[test]
    fn test_handled_result_triggers_fallback() {
        let policy = FallbackPolicyBuilder::with_result(1).handle_result(-1).build();
        assert_eq!(run(&policy, Ok(-1)).ok(), Some(1));
        assert_eq!(run(&policy, Ok(5)).ok(), Some(5));
    }

    #[test]
    fn test_unhandled_error_passes_through() {
        let policy = FallbackPolicyBuilder::with_result(1)
            .handle_error(InvalidArgument)
            .build();
        let error = run(&policy, Err(Error::msg("other"))).err();
        assert_eq!(error.map(|e| e.to_string()), Some("other".to_string()));
    }
}
