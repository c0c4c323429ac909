//! The policy abstraction and the composition of policies into a chain.
//!
//! A policy is an immutable configuration that decorates an inner executable
//! function with its own behaviour. Chains are nested decorators: each layer
//! decides independently whether, and how many times, it invokes the layer
//! beneath it.
//!
//! Policies are always listed outermost-first. In `[fallback, retry]` the
//! fallback wraps the retry, which wraps the user function, so the fallback
//! only sees the retry loop's final outcome.

mod classifier;

pub use classifier::{FailurePolicyBuilder, OutcomeClassifier};

use crate::errors::Error;
use crate::execution::Execution;
use std::sync::Arc;

/// An executable layer of a policy chain.
pub type ExecutionFn<'a, R> = Box<dyn FnMut(&mut Execution<R>) -> Result<R, Error> + 'a>;

/// A resilience policy that can decorate an executable function.
///
/// Circuit breakers, timeouts, bulkheads and similar policies plug into the
/// same chain by implementing this trait.
pub trait Policy<R>: Send + Sync {
    /// Wraps `inner` with this policy's behaviour.
    fn apply<'a>(&'a self, inner: ExecutionFn<'a, R>) -> ExecutionFn<'a, R>;
}

impl<R, P> Policy<R> for Arc<P>
where
    P: Policy<R> + ?Sized,
{
    fn apply<'a>(&'a self, inner: ExecutionFn<'a, R>) -> ExecutionFn<'a, R> {
        (**self).apply(inner)
    }
}

/// Wraps `innermost` with `policies`, given outermost-first.
pub(crate) fn compose<'a, R>(
    policies: &'a [Arc<dyn Policy<R>>],
    innermost: ExecutionFn<'a, R>,
) -> ExecutionFn<'a, R> {
    policies
        .iter()
        .rev()
        .fold(innermost, |inner, policy| policy.apply(inner))
}
