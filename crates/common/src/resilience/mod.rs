//! Resilience primitives
//!
//! Backoff delay calculation plus the retry decision contract. Classification
//! of *which* failures are worth retrying is domain knowledge and stays with
//! whoever implements [`RetryPolicy`].

pub mod backoff;
pub mod retry;

pub use backoff::BackoffStrategy;
pub use retry::{RetryConfig, RetryDecision, RetryPolicy};
