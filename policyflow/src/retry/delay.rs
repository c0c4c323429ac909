//! Retry delay computation: fixed, random and exponential backoff, with jitter.

use rand::Rng;
use std::time::Duration;

/// How the base delay between attempts is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum DelayStrategy {
    /// Retry immediately.
    #[default]
    None,
    /// Wait the same delay before every retry.
    Fixed(Duration),
    /// delay = min(base * factor^(retry - 1), max)
    Backoff {
        /// Delay before the first retry.
        base: Duration,
        /// Upper bound for the computed delay.
        max: Duration,
        /// Growth factor applied per retry.
        factor: f64,
    },
    /// Uniformly random delay in `[min, max)`.
    Random {
        /// Lower bound (inclusive).
        min: Duration,
        /// Upper bound (exclusive).
        max: Duration,
    },
}

impl DelayStrategy {
    /// Calculates the base delay for the given retry (1 for the first retry).
    #[must_use]
    pub fn delay(&self, retry: u32) -> Duration {
        match *self {
            Self::None => Duration::ZERO,
            Self::Fixed(delay) => delay,
            Self::Backoff { base, max, factor } => {
                let exponent = i32::try_from(retry.saturating_sub(1)).unwrap_or(i32::MAX);
                let secs = base.as_secs_f64() * factor.powi(exponent);
                // NaN and infinity both collapse to the cap.
                if secs.is_nan() || secs >= max.as_secs_f64() {
                    return max;
                }
                Duration::try_from_secs_f64(secs).unwrap_or(max)
            }
            Self::Random { min, max } => {
                if min >= max {
                    return min;
                }
                let (low, high) = (min.as_secs_f64(), max.as_secs_f64());
                // Distinct durations can round to the same float near Duration::MAX.
                if low >= high {
                    return min;
                }
                let secs = rand::thread_rng().gen_range(low..high);
                Duration::try_from_secs_f64(secs).map_or(max, |delay| delay.clamp(min, max))
            }
        }
    }

    /// Returns the largest delay this strategy can produce.
    #[must_use]
    pub fn max_delay(&self) -> Duration {
        match *self {
            Self::None => Duration::ZERO,
            Self::Fixed(delay) => delay,
            Self::Backoff { max, .. } | Self::Random { max, .. } => max,
        }
    }
}

/// Random perturbation applied on top of the base delay.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum Jitter {
    /// No jitter.
    #[default]
    None,
    /// Perturb by a random amount in `[-f * delay, +f * delay]`.
    Factor(f64),
    /// Perturb by a random amount in `[-range, +range]`.
    Range(Duration),
}

impl Jitter {
    /// Applies jitter to a delay. The result is never negative.
    #[must_use]
    pub fn apply(&self, delay: Duration) -> Duration {
        let spread = match *self {
            Self::None => return delay,
            Self::Factor(factor) => delay.as_secs_f64() * factor,
            Self::Range(range) => range.as_secs_f64(),
        };
        if spread <= 0.0 {
            return delay;
        }

        let offset = rand::thread_rng().gen_range(-spread..=spread);
        Duration::try_from_secs_f64((delay.as_secs_f64() + offset).max(0.0)).unwrap_or(delay)
    }
}

/// Computes the wait before the next attempt.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DelayCalculator {
    strategy: DelayStrategy,
    jitter: Jitter,
}

impl DelayCalculator {
    /// Creates a new calculator.
    #[must_use]
    pub fn new(strategy: DelayStrategy, jitter: Jitter) -> Self {
        Self { strategy, jitter }
    }

    /// Returns the delay strategy.
    #[must_use]
    pub fn strategy(&self) -> DelayStrategy {
        self.strategy
    }

    /// Returns the jitter.
    #[must_use]
    pub fn jitter(&self) -> Jitter {
        self.jitter
    }

    /// Calculates the delay before the given retry.
    ///
    /// When `remaining` is set the delay never exceeds it, so a retry is not
    /// scheduled past the end of the time budget.
    #[must_use]
    pub fn calculate(&self, retry: u32, remaining: Option<Duration>) -> Duration {
        let delay = self.jitter.apply(self.strategy.delay(retry));
        match remaining {
            Some(remaining) => delay.min(remaining),
            None => delay,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_no_delay() {
        assert_eq!(DelayStrategy::None.delay(3), Duration::ZERO);
    }

    #[test]
    fn test_fixed_delay_is_exact() {
        let strategy = DelayStrategy::Fixed(Duration::from_millis(10));
        assert_eq!(strategy.delay(1), Duration::from_millis(10));
        assert_eq!(strategy.delay(5), Duration::from_millis(10));
    }

    #[test]
    fn test_exponential_backoff() {
        let strategy = DelayStrategy::Backoff {
            base: Duration::from_secs(1),
            max: Duration::from_secs(30),
            factor: 2.0,
        };
        assert_eq!(strategy.delay(1), Duration::from_secs(1));
        assert_eq!(strategy.delay(2), Duration::from_secs(2));
        assert_eq!(strategy.delay(3), Duration::from_secs(4));
        assert_eq!(strategy.delay(4), Duration::from_secs(8));
    }

    #[test]
    fn test_backoff_is_capped() {
        let strategy = DelayStrategy::Backoff {
            base: Duration::from_secs(1),
            max: Duration::from_secs(5),
            factor: 3.0,
        };
        assert_eq!(strategy.delay(3), Duration::from_secs(5));
        assert_eq!(strategy.delay(u32::MAX), Duration::from_secs(5));
    }

    #[test]
    fn test_random_delay_bounds() {
        let strategy = DelayStrategy::Random {
            min: Duration::from_millis(10),
            max: Duration::from_millis(20),
        };
        for _ in 0..100 {
            let delay = strategy.delay(1);
            assert!(delay >= Duration::from_millis(10));
            assert!(delay < Duration::from_millis(20));
        }
    }

    #[test]
    fn test_random_delay_near_duration_max() {
        for gap in [1, 8192] {
            let min = Duration::MAX - Duration::from_secs(gap);
            let strategy = DelayStrategy::Random {
                min,
                max: Duration::MAX,
            };
            for _ in 0..20 {
                let delay = strategy.delay(1);
                assert!(delay >= min, "{delay:?} below {min:?}");
            }
        }
    }

    #[test]
    fn test_jitter_factor_bounds() {
        let jitter = Jitter::Factor(0.5);
        let delay = Duration::from_millis(100);
        for _ in 0..100 {
            let result = jitter.apply(delay);
            assert!(result >= Duration::from_millis(50));
            assert!(result <= Duration::from_millis(150));
        }
    }

    #[test]
    fn test_jitter_range_never_negative() {
        let jitter = Jitter::Range(Duration::from_millis(50));
        let clamped = (0..200)
            .map(|_| jitter.apply(Duration::from_millis(10)))
            .inspect(|result| assert!(*result <= Duration::from_millis(60)))
            .filter(|result| result.is_zero())
            .count();
        // Roughly 40% of offsets fall below -10ms and clamp to zero.
        assert!(clamped > 0);
    }

    #[test]
    fn test_no_jitter() {
        let delay = Duration::from_secs(10);
        assert_eq!(Jitter::None.apply(delay), delay);
        assert_eq!(Jitter::Factor(0.0).apply(delay), delay);
    }

    #[test]
    fn test_calculator_respects_remaining_budget() {
        let calculator = DelayCalculator::new(
            DelayStrategy::Fixed(Duration::from_millis(100)),
            Jitter::None,
        );
        assert_eq!(calculator.calculate(1, None), Duration::from_millis(100));
        assert_eq!(
            calculator.calculate(1, Some(Duration::from_millis(30))),
            Duration::from_millis(30)
        );
    }
}
