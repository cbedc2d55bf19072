//! Time abstractions
//!
//! - **[`clock`]**: wall clock source used for request timestamps and token
//!   expiry checks, with a settable mock for tests
//! - **[`sleeper`]**: suspension primitive used between retry attempts
//!
//! ## Usage
//!
//! ```rust
//! use chrono::Duration;
//!
//! use mowerlink_common::time::{Clock, MockClock};
//!
//! let clock = MockClock::new();
//! let before = clock.now_utc();
//! clock.advance(Duration::minutes(5));
//! assert_eq!(clock.now_utc() - before, Duration::minutes(5));
//! ```

pub mod clock;
pub mod sleeper;

pub use clock::{Clock, MockClock, SystemClock};
pub use sleeper::{Sleeper, TokioSleeper};
