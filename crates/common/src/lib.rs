//! Modular common utilities shared across Mowerlink crates.
//!
//! Nothing in here knows about mowers or vendor clouds; these are the
//! generic building blocks the client is assembled from:
//! - [`time`]: wall clock abstraction and cancellable sleeping
//! - [`resilience`]: backoff strategies and the retry decision contract
//! - [`security`]: secret string wrapper that never leaks through `Debug`
//! - [`testing`]: deterministic doubles (feature `test-utils`)

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::complexity, clippy::suspicious)]

pub mod resilience;
pub mod security;
pub mod time;

// Testing utilities
// ---------------------------------------------------------------
#[cfg(any(feature = "test-utils", test))]
pub mod testing;

// Re-export commonly used types and traits for convenience
// ------------------------
pub use resilience::{BackoffStrategy, RetryConfig, RetryDecision, RetryPolicy};
pub use security::SecretString;
pub use time::{Clock, MockClock, Sleeper, SystemClock, TokioSleeper};
