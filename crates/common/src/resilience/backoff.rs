//! Backoff strategies for calculating retry delays
//!
//! Attempts are numbered from 0. The exponential strategy computes
//! `initial_delay * base^attempt`, capped at `max_delay`, and can be asked to
//! start from a larger floor (used when a server tells us how long to wait).

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Backoff strategy for calculating retry delays
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BackoffStrategy {
    /// Fixed delay between retries
    Fixed(Duration),
    /// Exponential backoff: initial_delay * base^attempt
    Exponential {
        /// Delay before the first retry
        initial_delay: Duration,
        /// Growth factor per attempt
        base: f64,
        /// Cap on any computed delay
        max_delay: Duration,
    },
}

impl BackoffStrategy {
    /// Exponential backoff with the given base delay and multiplier.
    pub fn exponential(initial_delay: Duration, base: f64, max_delay: Duration) -> Self {
        Self::Exponential { initial_delay, base, max_delay }
    }

    /// Calculate the delay for the given attempt
    pub fn calculate_delay(&self, attempt: u32) -> Duration {
        match self {
            Self::Fixed(delay) => *delay,
            Self::Exponential { initial_delay, .. } => {
                self.calculate_delay_from(*initial_delay, attempt)
            }
        }
    }

    /// Calculate the delay for `attempt`, scaling from `max(floor, initial)`
    /// instead of the configured initial delay.
    ///
    /// A floor above `max_delay` raises the cap to the floor.
    ///
    /// For a fixed strategy the result is `max(floor, delay)`.
    pub fn calculate_delay_from(&self, floor: Duration, attempt: u32) -> Duration {
        match self {
            Self::Fixed(delay) => (*delay).max(floor),
            Self::Exponential { initial_delay, base, max_delay } => {
                let start = (*initial_delay).max(floor);
                let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
                let delay_ms = start.as_millis() as f64 * base.max(1.0).powi(exponent);
                // The cap never undercuts the floor itself
                let cap = (*max_delay).max(start);
                let capped_ms = delay_ms.min(cap.as_millis() as f64);
                Duration::from_millis(capped_ms as u64)
            }
        }
    }

    /// The configured starting delay.
    pub fn initial_delay(&self) -> Duration {
        match self {
            Self::Fixed(delay) => *delay,
            Self::Exponential { initial_delay, .. } => *initial_delay,
        }
    }
}

impl Default for BackoffStrategy {
    fn default() -> Self {
        Self::Exponential {
            initial_delay: Duration::from_secs(1),
            base: 2.0,
            max_delay: Duration::from_secs(60),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_strategy_fixed() {
        let strategy = BackoffStrategy::Fixed(Duration::from_millis(100));

        assert_eq!(strategy.calculate_delay(0), Duration::from_millis(100));
        assert_eq!(strategy.calculate_delay(5), Duration::from_millis(100));
        assert_eq!(strategy.calculate_delay_from(Duration::from_secs(2), 3), Duration::from_secs(2));
    }

    #[test]
    fn test_backoff_strategy_exponential() {
        let strategy = BackoffStrategy::exponential(
            Duration::from_millis(100),
            2.0,
            Duration::from_secs(10),
        );

        assert_eq!(strategy.calculate_delay(0), Duration::from_millis(100));
        assert_eq!(strategy.calculate_delay(1), Duration::from_millis(200));
        assert_eq!(strategy.calculate_delay(2), Duration::from_millis(400));
        assert_eq!(strategy.calculate_delay(3), Duration::from_millis(800));

        // Should cap at max_delay
        assert_eq!(strategy.calculate_delay(20), Duration::from_secs(10));
    }

    #[test]
    fn floor_replaces_initial_delay_when_larger() {
        let strategy = BackoffStrategy::exponential(
            Duration::from_millis(100),
            2.0,
            Duration::from_secs(60),
        );

        assert_eq!(strategy.calculate_delay_from(Duration::from_secs(3), 0), Duration::from_secs(3));
        assert_eq!(strategy.calculate_delay_from(Duration::from_secs(3), 2), Duration::from_secs(12));
        // A floor below the initial delay changes nothing
        assert_eq!(
            strategy.calculate_delay_from(Duration::from_millis(10), 1),
            Duration::from_millis(200)
        );
    }

    #[test]
    fn floor_above_cap_is_still_honoured() {
        let strategy =
            BackoffStrategy::exponential(Duration::from_millis(100), 2.0, Duration::from_secs(1));
        assert_eq!(strategy.calculate_delay_from(Duration::from_secs(5), 0), Duration::from_secs(5));
        assert_eq!(strategy.calculate_delay_from(Duration::from_secs(5), 3), Duration::from_secs(5));
    }

    #[test]
    fn delays_never_decrease_with_attempt() {
        let strategy = BackoffStrategy::default();
        let mut previous = Duration::ZERO;
        for attempt in 0..40 {
            let delay = strategy.calculate_delay(attempt);
            assert!(delay >= previous, "attempt {attempt} went backwards");
            previous = delay;
        }
    }

    #[test]
    fn multiplier_below_one_is_treated_as_constant() {
        let strategy =
            BackoffStrategy::exponential(Duration::from_millis(500), 0.5, Duration::from_secs(5));
        assert_eq!(strategy.calculate_delay(4), Duration::from_millis(500));
    }
}
