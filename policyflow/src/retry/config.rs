//! Serializable retry configuration.

use super::policy::{RetryPolicyBuilder, DEFAULT_BACKOFF_FACTOR, DEFAULT_MAX_RETRIES};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Plain-data retry settings, suitable for loading from configuration files.
///
/// Failure conditions and listeners are code, so they are added to the
/// builder returned by [`RetryPolicyBuilder::from_config`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Maximum retries after the first attempt; `-1` is unlimited.
    pub max_retries: i32,
    /// Base delay between attempts in milliseconds.
    pub delay_ms: u64,
    /// Maximum delay in milliseconds. Enables exponential backoff when set.
    pub max_delay_ms: Option<u64>,
    /// Backoff growth factor, used together with `max_delay_ms`.
    pub backoff_factor: Option<f64>,
    /// Jitter as a fraction of each delay.
    pub jitter_factor: Option<f64>,
    /// Jitter as an absolute range in milliseconds.
    pub jitter_ms: Option<u64>,
    /// Time budget measured from the first attempt, in milliseconds.
    pub max_duration_ms: Option<u64>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            delay_ms: 0,
            max_delay_ms: None,
            backoff_factor: None,
            jitter_factor: None,
            jitter_ms: None,
            max_duration_ms: None,
        }
    }
}

impl RetryConfig {
    /// Creates a new retry config.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the maximum retries.
    #[must_use]
    pub fn with_max_retries(mut self, max_retries: i32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Sets the base delay.
    #[must_use]
    pub fn with_delay_ms(mut self, delay: u64) -> Self {
        self.delay_ms = delay;
        self
    }

    /// Enables exponential backoff up to the given maximum delay.
    #[must_use]
    pub fn with_max_delay_ms(mut self, delay: u64) -> Self {
        self.max_delay_ms = Some(delay);
        self
    }

    /// Sets the jitter factor.
    #[must_use]
    pub fn with_jitter_factor(mut self, factor: f64) -> Self {
        self.jitter_factor = Some(factor);
        self
    }

    /// Sets the time budget.
    #[must_use]
    pub fn with_max_duration_ms(mut self, duration: u64) -> Self {
        self.max_duration_ms = Some(duration);
        self
    }
}

impl<R> RetryPolicyBuilder<R> {
    /// Creates a builder seeded from plain configuration.
    ///
    /// The result is validated when [`RetryPolicyBuilder::build`] is called.
    #[must_use]
    pub fn from_config(config: &RetryConfig) -> Self {
        let delay = Duration::from_millis(config.delay_ms);
        let mut builder = Self::new().with_max_retries(config.max_retries);

        builder = match config.max_delay_ms {
            Some(max_delay) => builder.with_backoff_factor(
                delay,
                Duration::from_millis(max_delay),
                config.backoff_factor.unwrap_or(DEFAULT_BACKOFF_FACTOR),
            ),
            None => builder.with_delay(delay),
        };
        if let Some(factor) = config.jitter_factor {
            builder = builder.with_jitter_factor(factor);
        }
        if let Some(jitter) = config.jitter_ms {
            builder = builder.with_jitter(Duration::from_millis(jitter));
        }
        if let Some(max_duration) = config.max_duration_ms {
            builder = builder.with_max_duration(Duration::from_millis(max_duration));
        }
        builder
    }
}
