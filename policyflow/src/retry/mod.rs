//! Retry policy: re-runs failed executions with configurable delays.
//!
//! The engine follows a small state machine per call:
//!
//! - attempt: run the inner function once and classify its outcome
//! - evaluate: stop on cancellation, success or an abort condition; give up
//!   when the retry count or time budget is exhausted
//! - schedule: compute the delay (fixed, random or exponential, plus jitter),
//!   notify listeners and wait on the cancellation token
//!
//! Exhaustion surfaces a [`RetriesExceededError`](crate::RetriesExceededError)
//! wrapping the last error; an abort surfaces the raw error.

mod config;
mod delay;
mod engine;
mod policy;

pub use config::RetryConfig;
pub use delay::{DelayCalculator, DelayStrategy, Jitter};
pub use policy::{RetryPolicy, RetryPolicyBuilder, DEFAULT_BACKOFF_FACTOR, DEFAULT_MAX_RETRIES};
