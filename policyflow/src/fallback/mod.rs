//! Fallback policy: replaces a handled failure with an alternative outcome.

mod policy;

pub use policy::{FallbackKind, FallbackPolicy, FallbackPolicyBuilder};
