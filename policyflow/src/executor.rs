//! Runs user functions through a composed policy chain.

use crate::cancellation::CancellationToken;
use crate::errors::{Error, PolicyError};
use crate::execution::{DoneListener, Execution, ExecutionDoneEvent};
use crate::policy::{compose, ExecutionFn, Policy};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, debug_span};

/// Executes user functions through an ordered list of policies.
///
/// Policies are listed outermost-first: `Executor::with(fallback).compose(retry)`
/// runs the retry loop inside the fallback. An executor is immutable once
/// configured and can be shared between threads and reused for any number of
/// calls; every call gets its own [`Execution`].
///
/// Running a call requires `R: Clone`: the user function's outcome is kept in
/// the [`Execution`] as the latest attempt while a copy travels up the chain.
pub struct Executor<R> {
    policies: Vec<Arc<dyn Policy<R>>>,
    cancellation: Option<Arc<CancellationToken>>,
    on_complete: Option<DoneListener<R>>,
    on_success: Option<DoneListener<R>>,
    on_failure: Option<DoneListener<R>>,
}

impl<R> Executor<R> {
    /// Creates an executor without policies; calls run exactly once.
    #[must_use]
    pub fn new() -> Self {
        Self {
            policies: Vec::new(),
            cancellation: None,
            on_complete: None,
            on_success: None,
            on_failure: None,
        }
    }

    /// Creates an executor whose outermost policy is `policy`.
    #[must_use]
    pub fn with<P>(policy: P) -> Self
    where
        P: Policy<R> + 'static,
    {
        Self::new().compose(policy)
    }

    /// Creates an executor from policies given outermost-first.
    #[must_use]
    pub fn from_policies(policies: Vec<Arc<dyn Policy<R>>>) -> Self {
        Self {
            policies,
            ..Self::new()
        }
    }

    /// Adds `policy` inside every policy configured so far.
    #[must_use]
    pub fn compose<P>(mut self, policy: P) -> Self
    where
        P: Policy<R> + 'static,
    {
        self.policies.push(Arc::new(policy));
        self
    }

    /// Observes `token`: an already cancelled token fails calls immediately,
    /// and cancelling it interrupts retry delays.
    #[must_use]
    pub fn with_cancellation(mut self, token: Arc<CancellationToken>) -> Self {
        self.cancellation = Some(token);
        self
    }

    /// Called with the final outcome of every call.
    #[must_use]
    pub fn on_complete<F>(mut self, listener: F) -> Self
    where
        F: Fn(&ExecutionDoneEvent<'_, R>) + Send + Sync + 'static,
    {
        self.on_complete = Some(Arc::new(listener));
        self
    }

    /// Called when a call finishes with `Ok`.
    #[must_use]
    pub fn on_success<F>(mut self, listener: F) -> Self
    where
        F: Fn(&ExecutionDoneEvent<'_, R>) + Send + Sync + 'static,
    {
        self.on_success = Some(Arc::new(listener));
        self
    }

    /// Called when a call finishes with `Err`.
    #[must_use]
    pub fn on_failure<F>(mut self, listener: F) -> Self
    where
        F: Fn(&ExecutionDoneEvent<'_, R>) + Send + Sync + 'static,
    {
        self.on_failure = Some(Arc::new(listener));
        self
    }

    /// Returns the configured policies, outermost-first.
    #[must_use]
    pub fn policies(&self) -> &[Arc<dyn Policy<R>>] {
        &self.policies
    }
}

impl<R: Clone> Executor<R> {

    /// Runs `f` through the policy chain and returns the final outcome.
    pub fn get<F>(&self, mut f: F) -> Result<R, Error>
    where
        F: FnMut() -> Result<R, Error>,
    {
        self.get_with_execution(move |_exec: &Execution<R>| f())
    }

    /// Like [`Executor::get`], but `f` can inspect the call's execution.
    pub fn get_with_execution<F>(&self, mut f: F) -> Result<R, Error>
    where
        F: FnMut(&Execution<R>) -> Result<R, Error>,
    {
        let cancellation = self.cancellation.clone().unwrap_or_default();
        if cancellation.is_cancelled() {
            let reason = cancellation.reason().unwrap_or_default();
            debug!(reason = %reason, "Execution cancelled before first attempt");
            return Err(PolicyError::Cancelled(reason).into());
        }

        let span = debug_span!("policy_execution", policies = self.policies.len());
        let _entered = span.enter();

        let mut exec = Execution::new(cancellation);
        let outcome = {
            let innermost: ExecutionFn<'_, R> = Box::new(|exec: &mut Execution<R>| {
                let outcome = f(&*exec);
                exec.record_execution();
                exec.record(outcome.clone());
                outcome
            });
            let mut chain = compose(&self.policies, innermost);
            chain(&mut exec)
        };
        exec.complete();

        debug!(
            attempts = exec.attempts(),
            executions = exec.executions(),
            success = outcome.is_ok(),
            "Execution complete"
        );
        self.notify(&exec, &outcome);
        outcome
    }

    fn notify(&self, exec: &Execution<R>, outcome: &Result<R, Error>) {
        let event = ExecutionDoneEvent::new(exec, outcome);
        if let Some(ref listener) = self.on_complete {
            listener(&event);
        }
        let listener = if outcome.is_ok() {
            self.on_success.as_ref()
        } else {
            self.on_failure.as_ref()
        };
        if let Some(listener) = listener {
            listener(&event);
        }
    }
}

impl Executor<()> {
    /// Runs a function that produces no result.
    pub fn run<F>(&self, f: F) -> Result<(), Error>
    where
        F: FnMut() -> Result<(), Error>,
    {
        self.get(f)
    }

    /// Like [`Executor::run`], but `f` can inspect the call's execution.
    pub fn run_with_execution<F>(&self, f: F) -> Result<(), Error>
    where
        F: FnMut(&Execution<()>) -> Result<(), Error>,
    {
        self.get_with_execution(f)
    }

    /// Runs a function that produces no result on a blocking worker.
    pub fn run_async<F>(&self, f: F) -> impl Future<Output = Result<(), Error>> + Send + 'static
    where
        F: FnMut() -> Result<(), Error> + Send + 'static,
    {
        self.get_async(f)
    }
}

impl<R: Clone + Send + 'static> Executor<R> {
    /// Runs the whole chain on a Tokio blocking worker.
    ///
    /// Retry delays block the worker, not the async runtime. A panic in the
    /// user function or a listener resumes on the task awaiting the future.
    pub fn get_async<F>(&self, mut f: F) -> impl Future<Output = Result<R, Error>> + Send + 'static
    where
        F: FnMut() -> Result<R, Error> + Send + 'static,
    {
        self.get_with_execution_async(move |_exec: &Execution<R>| f())
    }

    /// Like [`Executor::get_async`], but `f` can inspect the call's execution.
    pub fn get_with_execution_async<F>(
        &self,
        f: F,
    ) -> impl Future<Output = Result<R, Error>> + Send + 'static
    where
        F: FnMut(&Execution<R>) -> Result<R, Error> + Send + 'static,
    {
        let executor = self.clone();
        async move {
            let handle = tokio::task::spawn_blocking(move || executor.get_with_execution(f));
            match handle.await {
                Ok(outcome) => outcome,
                Err(err) if err.is_panic() => std::panic::resume_unwind(err.into_panic()),
                Err(err) => Err(Error::new(err)),
            }
        }
    }
}

impl<R> Default for Executor<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R> Clone for Executor<R> {
    fn clone(&self) -> Self {
        Self {
            policies: self.policies.clone(),
            cancellation: self.cancellation.clone(),
            on_complete: self.on_complete.clone(),
            on_success: self.on_success.clone(),
            on_failure: self.on_failure.clone(),
        }
    }
}

impl<R> fmt::Debug for Executor<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Executor")
            .field("policies", &self.policies.len())
            .field("cancellation", &self.cancellation)
            .finish_non_exhaustive()
    }
}
