//! Retry orchestrator
//!
//! Wraps one unit of work and decides, per failure, whether to give up,
//! refresh the session and go again, or back off. Every call to
//! [`RetryOrchestrator::execute`] keeps its own attempt counter; the only
//! shared state is the session behind [`SessionRefresher`].

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use mowerlink_common::{BackoffStrategy, RetryConfig, RetryDecision, RetryPolicy, Sleeper};
use mowerlink_domain::{ClientError, ErrorCategory, Result, RetrySettings};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::auth::SessionRefresher;

/// Maps the error taxonomy onto retry decisions.
#[derive(Debug, Clone)]
pub struct ClientRetryPolicy {
    backoff: BackoffStrategy,
}

impl ClientRetryPolicy {
    /// Policy using `backoff` for rate-limit delays.
    pub fn new(backoff: BackoffStrategy) -> Self {
        Self { backoff }
    }
}

impl RetryPolicy<ClientError> for ClientRetryPolicy {
    fn should_retry(&self, error: &ClientError, attempt: u32) -> RetryDecision {
        match error.category() {
            ErrorCategory::Authentication | ErrorCategory::DeviceOffline | ErrorCategory::Fatal => {
                RetryDecision::Stop
            }
            // The refresh itself is the remedy; no waiting
            ErrorCategory::TokenExpired => RetryDecision::RetryAfter(Duration::ZERO),
            ErrorCategory::RateLimited => RetryDecision::RetryAfter(
                self.backoff
                    .calculate_delay_from(error.retry_after().unwrap_or_default(), attempt),
            ),
            ErrorCategory::Transient => RetryDecision::Retry,
        }
    }
}

/// Build the loop configuration from the user-facing retry settings.
pub fn retry_config(settings: &RetrySettings) -> RetryConfig {
    RetryConfig::new(
        settings.max_retries,
        BackoffStrategy::exponential(
            Duration::from_millis(settings.base_delay_ms),
            settings.multiplier,
            Duration::from_millis(settings.max_delay_ms),
        ),
    )
}

/// Runs device calls under the retry policy, refreshing the session on expiry.
pub struct RetryOrchestrator {
    config: RetryConfig,
    policy: ClientRetryPolicy,
    sleeper: Arc<dyn Sleeper>,
    refresher: Arc<dyn SessionRefresher>,
    cancel: CancellationToken,
}

impl RetryOrchestrator {
    /// Orchestrator cancelled by `cancel`.
    pub fn new(
        config: RetryConfig,
        sleeper: Arc<dyn Sleeper>,
        refresher: Arc<dyn SessionRefresher>,
        cancel: CancellationToken,
    ) -> Self {
        let policy = ClientRetryPolicy::new(config.backoff.clone());
        Self { config, policy, sleeper, refresher, cancel }
    }

    /// Token that aborts every in-flight call.
    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Run `operation` under the retry policy.
    ///
    /// When attempts run out the last error is returned unchanged.
    pub async fn execute<T, F, Fut>(&self, name: &str, mut operation: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt: u32 = 0;
        loop {
            if self.cancel.is_cancelled() {
                return Err(ClientError::Cancelled);
            }

            let observed = self.refresher.generation();
            let outcome = tokio::select! {
                () = self.cancel.cancelled() => return Err(ClientError::Cancelled),
                outcome = operation() => outcome,
            };

            let error = match outcome {
                Ok(value) => return Ok(value),
                Err(error) => error,
            };

            let decision = self.policy.should_retry(&error, attempt);
            let Some(delay) = self.config.delay_for(decision, attempt) else {
                debug!(operation = name, attempt, error = %error, "not retryable");
                return Err(error);
            };
            if attempt >= self.config.max_retries {
                warn!(operation = name, attempts = attempt + 1, error = %error, "retries exhausted");
                return Err(error);
            }

            if error.category() == ErrorCategory::TokenExpired {
                debug!(operation = name, attempt, "token expired, refreshing session");
                self.refresher.refresh_after(observed).await?;
            }

            if !delay.is_zero() {
                debug!(operation = name, attempt, delay_ms = delay.as_millis() as u64, error = %error, "backing off");
                tokio::select! {
                    () = self.cancel.cancelled() => return Err(ClientError::Cancelled),
                    () = self.sleeper.sleep(delay) => {}
                }
            }

            attempt += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;
    use mowerlink_common::testing::RecordingSleeper;

    use super::*;

    #[derive(Default)]
    struct CountingRefresher {
        generation: AtomicU64,
        calls: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl SessionRefresher for CountingRefresher {
        fn generation(&self) -> u64 {
            self.generation.load(Ordering::SeqCst)
        }

        async fn refresh_after(&self, _observed: u64) -> Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(ClientError::SessionInvalid { message: "refresh rejected".into() });
            }
            self.generation.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    /// Operation that replays scripted outcomes.
    struct Script {
        outcomes: Mutex<VecDeque<Result<&'static str>>>,
        calls: AtomicUsize,
    }

    impl Script {
        fn new(outcomes: Vec<Result<&'static str>>) -> Self {
            Self { outcomes: Mutex::new(outcomes.into()), calls: AtomicUsize::new(0) }
        }

        async fn run(&self) -> Result<&'static str> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.outcomes
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Err(ClientError::Network("script exhausted".into())))
        }
    }

    fn settings(max_retries: u32) -> RetryConfig {
        retry_config(&RetrySettings {
            max_retries,
            base_delay_ms: 100,
            multiplier: 2.0,
            max_delay_ms: 60_000,
        })
    }

    fn orchestrator(
        max_retries: u32,
        refresher: Arc<CountingRefresher>,
    ) -> (RetryOrchestrator, RecordingSleeper) {
        let sleeper = RecordingSleeper::new();
        let orchestrator = RetryOrchestrator::new(
            settings(max_retries),
            Arc::new(sleeper.clone()),
            refresher,
            CancellationToken::new(),
        );
        (orchestrator, sleeper)
    }

    fn rate_limited(secs: u64) -> ClientError {
        ClientError::RateLimited {
            message: "slow down".into(),
            retry_after: Some(Duration::from_secs(secs)),
        }
    }

    #[tokio::test]
    async fn token_expiry_refreshes_once_without_delay() {
        let refresher = Arc::new(CountingRefresher::default());
        let (orchestrator, sleeper) = orchestrator(3, refresher.clone());
        let script =
            Script::new(vec![Err(ClientError::TokenExpired { message: "460".into() }), Ok("done")]);

        let value = orchestrator.execute("status", || script.run()).await.unwrap();

        assert_eq!(value, "done");
        assert_eq!(refresher.calls.load(Ordering::SeqCst), 1);
        assert_eq!(sleeper.count(), 0);
        assert_eq!(script.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn authentication_errors_are_terminal() {
        let refresher = Arc::new(CountingRefresher::default());
        let (orchestrator, sleeper) = orchestrator(5, refresher.clone());
        let script = Script::new(vec![Err(ClientError::SessionInvalid { message: "gone".into() })]);

        let err = orchestrator.execute("status", || script.run()).await.unwrap_err();

        assert!(matches!(err, ClientError::SessionInvalid { .. }));
        assert_eq!(script.calls.load(Ordering::SeqCst), 1);
        assert_eq!(refresher.calls.load(Ordering::SeqCst), 0);
        assert_eq!(sleeper.count(), 0);
    }

    #[tokio::test]
    async fn device_offline_is_not_retried() {
        let (orchestrator, _) = orchestrator(5, Arc::new(CountingRefresher::default()));
        let script = Script::new(vec![Err(ClientError::DeviceOffline {
            message: "offline".into(),
            device_id: None,
        })]);

        let err = orchestrator.execute("status", || script.run()).await.unwrap_err();
        assert!(matches!(err, ClientError::DeviceOffline { .. }));
        assert_eq!(script.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn transient_errors_back_off_exponentially() {
        let (orchestrator, sleeper) = orchestrator(3, Arc::new(CountingRefresher::default()));
        let script = Script::new(vec![
            Err(ClientError::Network("reset".into())),
            Err(ClientError::Api { status: 502, code: None, message: "bad gateway".into(), body: None }),
            Ok("done"),
        ]);

        assert_eq!(orchestrator.execute("list", || script.run()).await.unwrap(), "done");
        assert_eq!(sleeper.recorded(), vec![Duration::from_millis(100), Duration::from_millis(200)]);
    }

    #[tokio::test]
    async fn rate_limit_delays_are_monotonic_and_respect_server_hint() {
        let (orchestrator, sleeper) = orchestrator(4, Arc::new(CountingRefresher::default()));
        let script = Script::new(vec![
            Err(rate_limited(2)),
            Err(rate_limited(1)),
            Err(rate_limited(1)),
            Err(rate_limited(3)),
            Ok("done"),
        ]);

        orchestrator.execute("command", || script.run()).await.unwrap();

        let delays = sleeper.recorded();
        assert_eq!(delays[0], Duration::from_secs(2));
        assert!(delays.windows(2).all(|pair| pair[0] <= pair[1]), "{delays:?}");
        assert!(delays[3] >= Duration::from_secs(3) * 8);
    }

    #[tokio::test]
    async fn exhaustion_returns_the_last_error_unchanged() {
        let (orchestrator, sleeper) = orchestrator(2, Arc::new(CountingRefresher::default()));
        let script = Script::new(vec![
            Err(ClientError::Network("first".into())),
            Err(ClientError::Network("second".into())),
            Err(ClientError::Api { status: 500, code: Some(1), message: "last".into(), body: None }),
        ]);

        let err = orchestrator.execute("list", || script.run()).await.unwrap_err();

        assert!(matches!(err, ClientError::Api { status: 500, ref message, .. } if message == "last"));
        assert_eq!(script.calls.load(Ordering::SeqCst), 3);
        assert_eq!(sleeper.count(), 2);
    }

    #[tokio::test]
    async fn failed_refresh_propagates() {
        let refresher = Arc::new(CountingRefresher { fail: true, ..CountingRefresher::default() });
        let (orchestrator, _) = orchestrator(3, refresher.clone());
        let script = Script::new(vec![Err(ClientError::TokenExpired { message: "460".into() })]);

        let err = orchestrator.execute("status", || script.run()).await.unwrap_err();
        assert!(matches!(err, ClientError::SessionInvalid { .. }));
        assert_eq!(script.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn cancellation_interrupts_backoff() {
        let cancel = CancellationToken::new();
        let orchestrator = RetryOrchestrator::new(
            settings(3),
            Arc::new(mowerlink_common::TokioSleeper),
            Arc::new(CountingRefresher::default()),
            cancel.clone(),
        );
        let script = Script::new(vec![Err(ClientError::Network("down".into()))]);

        let canceller = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            cancel.cancel();
        });

        // Base delay here is 100ms, so cancellation lands mid-sleep
        let err = orchestrator.execute("list", || script.run()).await.unwrap_err();
        canceller.await.unwrap();
        assert!(matches!(err, ClientError::Cancelled));
    }

    #[tokio::test]
    async fn concurrent_calls_keep_separate_attempt_counters() {
        let refresher = Arc::new(CountingRefresher::default());
        let (orchestrator, _) = orchestrator(1, refresher);
        let first = Script::new(vec![Err(ClientError::Network("a".into())), Ok("first")]);
        let second = Script::new(vec![Err(ClientError::Network("b".into())), Ok("second")]);

        let (a, b) = tokio::join!(
            orchestrator.execute("a", || first.run()),
            orchestrator.execute("b", || second.run()),
        );
        assert_eq!(a.unwrap(), "first");
        assert_eq!(b.unwrap(), "second");
    }
}
