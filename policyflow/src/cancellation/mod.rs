//! Cooperative cancellation for policy executions.
//!
//! A [`CancellationToken`] is shared between the party that wants to stop an
//! execution and the retry loops running inside it. Retry delays wait on the
//! token, so a cancellation interrupts a pending delay instead of being
//! noticed only after it elapses.

mod token;

pub use token::CancellationToken;
