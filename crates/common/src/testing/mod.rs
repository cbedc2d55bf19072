//! Testing utilities and helpers
//!
//! - **[`sleeper`]**: a [`Sleeper`](crate::time::Sleeper) that records the
//!   requested delays and returns immediately
//!
//! The mock wall clock lives in [`crate::time::MockClock`] and is re-exported
//! here so test modules can pull everything from one place.
//!
//! ## Usage
//!
//! ```rust
//! # #[cfg(feature = "test-utils")]
//! # {
//! use std::time::Duration;
//!
//! use mowerlink_common::testing::RecordingSleeper;
//! use mowerlink_common::time::Sleeper;
//!
//! # tokio_test::block_on(async {
//! let sleeper = RecordingSleeper::new();
//! sleeper.sleep(Duration::from_secs(4)).await;
//! assert_eq!(sleeper.recorded(), vec![Duration::from_secs(4)]);
//! # });
//! # }
//! ```

pub mod sleeper;

pub use sleeper::RecordingSleeper;

pub use crate::time::MockClock;
