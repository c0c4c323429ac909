//! # Policyflow
//!
//! Composable resilience policies for fallible operations.
//!
//! Policyflow wraps a user function in a chain of policies that decide how
//! failures are handled:
//!
//! - **Retry**: re-run handled failures with fixed, random or exponential
//!   delays, jitter, attempt limits, a time budget and abort conditions
//! - **Fallback**: substitute a result, an error, or a computed value
//! - **Composition**: policies nest outermost-first, and anything that
//!   implements [`Policy`] can join the chain
//! - **Observability**: listeners on every policy event, plus `tracing` spans
//!   and events
//! - **Cancellation**: retry delays wake up as soon as a call is cancelled
//!
//! ## Quick Start
//!
//! ```rust
//! use policyflow::prelude::*;
//! use std::time::Duration;
//!
//! let retry = RetryPolicy::<String>::builder()
//!     .handle_error_type::<std::io::Error>()
//!     .with_max_retries(3)
//!     .with_delay(Duration::from_millis(10))
//!     .build()?;
//! let fallback = FallbackPolicy::with_result("cached".to_string());
//!
//! let executor = Executor::with(fallback).compose(retry);
//! let value = executor.get(|| Ok("fresh".to_string()))?;
//! assert_eq!(value, "fresh");
//! # Ok::<(), Box<dyn std::error::Error + Send + Sync>>(())
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod cancellation;
pub mod errors;
pub mod execution;
pub mod executor;
pub mod fallback;
pub mod observability;
pub mod policy;
pub mod retry;
pub mod testing;


pub use errors::{Error, PolicyError, RetriesExceededError};
pub use execution::{Execution, ExecutionDoneEvent, ExecutionEvent, ExecutionScheduledEvent};
pub use executor::Executor;
pub use fallback::{FallbackPolicy, FallbackPolicyBuilder};
pub use policy::Policy;
pub use retry::{RetryConfig, RetryPolicy, RetryPolicyBuilder};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::cancellation::CancellationToken;
    pub use crate::errors::{Error, PolicyError, RetriesExceededError};
    pub use crate::execution::{
        Execution, ExecutionDoneEvent, ExecutionEvent, ExecutionScheduledEvent,
    };
    pub use crate::executor::Executor;
    pub use crate::fallback::{FallbackKind, FallbackPolicy, FallbackPolicyBuilder};
    pub use crate::policy::{ExecutionFn, FailurePolicyBuilder, OutcomeClassifier, Policy};
    pub use crate::retry::{
        DelayStrategy, Jitter, RetryConfig, RetryPolicy, RetryPolicyBuilder,
    };
}
