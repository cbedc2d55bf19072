//! Recording sleeper for deterministic retry tests

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::time::Sleeper;

/// Records each requested delay and returns without waiting.
///
/// Clones share the same log.
#[derive(Debug, Clone, Default)]
pub struct RecordingSleeper {
    delays: Arc<Mutex<Vec<Duration>>>,
}

impl RecordingSleeper {
    /// Create an empty recorder
    pub fn new() -> Self {
        Self::default()
    }

    /// Delays requested so far, in call order
    pub fn recorded(&self) -> Vec<Duration> {
        self.delays.lock().map(|d| d.clone()).unwrap_or_default()
    }

    /// Number of sleeps requested (including zero-length ones)
    pub fn count(&self) -> usize {
        self.delays.lock().map(|d| d.len()).unwrap_or_default()
    }

    /// Sum of every requested delay
    pub fn total(&self) -> Duration {
        self.recorded().into_iter().sum()
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        if let Ok(mut delays) = self.delays.lock() {
            delays.push(duration);
        }
        tokio::task::yield_now().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn records_delays_in_order() {
        let sleeper = RecordingSleeper::new();
        let shared = sleeper.clone();

        sleeper.sleep(Duration::from_millis(10)).await;
        shared.sleep(Duration::from_millis(30)).await;

        assert_eq!(sleeper.recorded(), vec![Duration::from_millis(10), Duration::from_millis(30)]);
        assert_eq!(sleeper.count(), 2);
        assert_eq!(sleeper.total(), Duration::from_millis(40));
    }
}
