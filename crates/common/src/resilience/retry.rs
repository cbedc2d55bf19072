//! Retry configuration and the decision contract between a failure
//! classifier and a retry loop

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::backoff::BackoffStrategy;

/// Trait for determining whether an error should be retried
pub trait RetryPolicy<E> {
    /// Decide what to do after `error` on the zero-based `attempt`
    fn should_retry(&self, error: &E, attempt: u32) -> RetryDecision;
}

/// Decision for whether to retry an operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Retry the operation with the default backoff delay
    Retry,
    /// Retry the operation with a custom delay (zero means immediately)
    RetryAfter(Duration),
    /// Don't retry the operation
    Stop,
}

/// Configuration for retry behavior
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Retries after the initial attempt
    pub max_retries: u32,
    /// Backoff strategy for calculating delays
    pub backoff: BackoffStrategy,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self { max_retries: 3, backoff: BackoffStrategy::default() }
    }
}

impl RetryConfig {
    /// Retry up to `max_retries` times after the first attempt.
    pub fn new(max_retries: u32, backoff: BackoffStrategy) -> Self {
        Self { max_retries, backoff }
    }

    /// Delay for a decision on the given attempt. `Stop` yields `None`.
    pub fn delay_for(&self, decision: RetryDecision, attempt: u32) -> Option<Duration> {
        match decision {
            RetryDecision::Retry => Some(self.backoff.calculate_delay(attempt)),
            RetryDecision::RetryAfter(delay) => Some(delay),
            RetryDecision::Stop => None,
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        match &self.backoff {
            BackoffStrategy::Exponential { base, .. } if *base < 1.0 => {
                Err(format!("backoff multiplier must be at least 1.0, got {base}"))
            }
            BackoffStrategy::Exponential { initial_delay, max_delay, .. }
                if max_delay < initial_delay =>
            {
                Err("max delay must not be shorter than the initial delay".to_string())
            }
            _ => Ok(()),
        }
    }
}
