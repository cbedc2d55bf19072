//! Wall clock abstraction for testability
//!
//! Request signatures embed the current time and session expiry is compared
//! against it, so every consumer reads time through [`Clock`] instead of
//! calling `Utc::now()` directly.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Utc};

/// Trait for wall clock reads.
pub trait Clock: Send + Sync + 'static {
    /// Get the current wall clock time (UTC).
    fn now_utc(&self) -> DateTime<Utc>;

    /// Get milliseconds since UNIX epoch.
    ///
    /// Times before the epoch clamp to zero.
    fn millis_since_epoch(&self) -> u64 {
        u64::try_from(self.now_utc().timestamp_millis()).unwrap_or_default()
    }
}

/// Real system clock implementation for production use
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_utc(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Implement Clock for Arc<T> where T: Clock for convenient cloning
impl<T: Clock> Clock for Arc<T> {
    fn now_utc(&self) -> DateTime<Utc> {
        (**self).now_utc()
    }
}

/// Mock clock for deterministic testing
///
/// Clones share the same underlying time, so a test can keep one handle and
/// hand another to the code under test.
#[derive(Debug, Clone)]
pub struct MockClock {
    current: Arc<Mutex<DateTime<Utc>>>,
}

impl MockClock {
    /// Create a new mock clock starting at the current wall time
    pub fn new() -> Self {
        Self::at(Utc::now())
    }

    /// Create a mock clock frozen at a specific instant
    pub fn at(start: DateTime<Utc>) -> Self {
        Self { current: Arc::new(Mutex::new(start)) }
    }

    /// Advance the mock clock by a duration
    pub fn advance(&self, duration: Duration) {
        if let Ok(mut current) = self.current.lock() {
            *current += duration;
        }
    }

    /// Set the mock clock to a specific instant
    pub fn set(&self, instant: DateTime<Utc>) {
        if let Ok(mut current) = self.current.lock() {
            *current = instant;
        }
    }
}

impl Default for MockClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MockClock {
    fn now_utc(&self) -> DateTime<Utc> {
        self.current.lock().map(|c| *c).unwrap_or_else(|poisoned| *poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn mock_clock_is_frozen_until_advanced() {
        let start = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let clock = MockClock::at(start);

        assert_eq!(clock.now_utc(), start);
        assert_eq!(clock.now_utc(), start);

        clock.advance(Duration::seconds(90));
        assert_eq!(clock.now_utc(), start + Duration::seconds(90));
    }

    #[test]
    fn clones_share_time() {
        let clock = MockClock::new();
        let handle = clock.clone();
        let before = clock.now_utc();

        handle.advance(Duration::hours(2));
        assert_eq!(clock.now_utc() - before, Duration::hours(2));
    }

    #[test]
    fn millis_since_epoch_matches_timestamp() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let clock = MockClock::at(start);
        assert_eq!(clock.millis_since_epoch(), 1_704_067_200_000);
    }

    #[test]
    fn set_overrides_current_time() {
        let clock = MockClock::new();
        let target = Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap();
        clock.set(target);
        assert_eq!(clock.now_utc(), target);
    }
}
