//! Testing utilities for code built on policyflow.
//!
//! This module provides:
//! - Listener counters that can be attached to policy builders
//! - Assertions on an executor's attempts, executions and outcome
//! - Common error fixtures and scripted user functions

mod assertions;
mod fixtures;
mod stats;

pub use assertions::{
    assert_get_failure, assert_get_failure_matching, assert_get_success, assert_run_failure,
};
pub use fixtures::{
    fail_n_times_then, ConnectingError, CompositeError, InvalidArgumentError, InvalidStateError,
    TimeoutError,
};
pub use stats::{with_fallback_stats, with_retry_stats, Stats};
