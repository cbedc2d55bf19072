//! Integration tests for the resilience and time primitives
//!
//! Exercises backoff calculation together with the sleeper abstraction the
//! way the API client's retry loop drives them.

#![cfg(feature = "test-utils")]

use std::sync::Arc;
use std::time::Duration;

use mowerlink_common::testing::RecordingSleeper;
use mowerlink_common::time::{Clock, MockClock, Sleeper};
use mowerlink_common::BackoffStrategy;

/// Drives a fake retry loop for `attempts` failures and returns the delays
/// the sleeper observed.
async fn drive(strategy: &BackoffStrategy, sleeper: Arc<dyn Sleeper>, attempts: u32) {
    for attempt in 0..attempts {
        sleeper.sleep(strategy.calculate_delay(attempt)).await;
    }
}

/// Validates that an exponential schedule is observed verbatim through a
/// type-erased sleeper.
#[tokio::test]
async fn test_exponential_schedule_through_dyn_sleeper() {
    let recorder = RecordingSleeper::new();
    let strategy =
        BackoffStrategy::exponential(Duration::from_millis(250), 2.0, Duration::from_secs(30));

    drive(&strategy, Arc::new(recorder.clone()), 4).await;

    assert_eq!(
        recorder.recorded(),
        vec![
            Duration::from_millis(250),
            Duration::from_millis(500),
            Duration::from_secs(1),
            Duration::from_secs(2),
        ]
    );
}

/// Validates that a server-provided floor dominates small base delays for
/// every attempt and the schedule still never shrinks.
#[tokio::test]
async fn test_floor_schedule_is_monotonic() {
    let strategy =
        BackoffStrategy::exponential(Duration::from_millis(100), 1.5, Duration::from_secs(120));
    let floor = Duration::from_secs(5);

    let delays: Vec<Duration> =
        (0..10).map(|attempt| strategy.calculate_delay_from(floor, attempt)).collect();

    assert_eq!(delays[0], floor);
    assert!(delays.windows(2).all(|pair| pair[0] <= pair[1]));
    // 5s * 1.5^9 overshoots the cap
    assert_eq!(delays[9], Duration::from_secs(120));
}

/// Validates that the mock clock and the recording sleeper are independent:
/// recording a sleep does not move wall time.
#[tokio::test]
async fn test_recording_sleeper_does_not_advance_clock() {
    let clock = MockClock::new();
    let before = clock.now_utc();
    let recorder = RecordingSleeper::new();

    recorder.sleep(Duration::from_secs(600)).await;

    assert_eq!(clock.now_utc(), before);
    assert_eq!(recorder.total(), Duration::from_secs(600));
}
