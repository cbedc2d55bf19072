//! Suspension primitive for retry backoff
//!
//! Backoff delays are suspensions, never busy-waits. Production code uses
//! [`TokioSleeper`]; tests swap in a recorder so no real time passes.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

/// Something that can suspend the current task for a duration.
#[async_trait]
pub trait Sleeper: Send + Sync {
    /// Suspend for `duration`. Zero durations return immediately.
    async fn sleep(&self, duration: Duration);
}

/// Sleeper backed by the tokio timer
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        if !duration.is_zero() {
            tokio::time::sleep(duration).await;
        }
    }
}

#[async_trait]
impl<T: Sleeper + ?Sized> Sleeper for Arc<T> {
    async fn sleep(&self, duration: Duration) {
        (**self).sleep(duration).await;
    }
}
