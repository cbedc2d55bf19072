//! Mower cloud client
//!
//! One [`MowerClient`] per logical connection. It owns the session, the retry
//! orchestrator and the cancellation token shared by every in-flight call;
//! nothing is global.

use std::sync::Arc;
use std::time::Duration;

use mowerlink_common::{Clock, SecretString, Sleeper, SystemClock, TokioSleeper};
use mowerlink_domain::{
    ApiGeneration, AuthPhase, AuthState, ClientConfig, DeviceRecord, DeviceStatus, MowerCommand,
    MowerSnapshot, Result, Session,
};
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::auth::{AuthStrategy, LegacyStrategy, OAuth2Strategy, SessionManager};
use crate::devices::DeviceService;
use crate::http::{HttpTransport, Transport};
use crate::retry::{retry_config, RetryOrchestrator};

/// Entry point: one logged-in account and its devices.
pub struct MowerClient {
    generation: ApiGeneration,
    sessions: Arc<SessionManager>,
    devices: DeviceService,
    cancel: CancellationToken,
}

impl MowerClient {
    /// Builder for injecting a transport, clock or sleeper.
    pub fn builder(config: ClientConfig) -> MowerClientBuilder {
        MowerClientBuilder::new(config)
    }

    /// Client with the default HTTP transport, system clock and tokio timers.
    pub fn new(config: ClientConfig) -> Result<Self> {
        Self::builder(config).build()
    }

    /// Login API generation this client was built for.
    pub fn generation(&self) -> ApiGeneration {
        self.generation
    }

    /// Underlying session manager.
    pub fn sessions(&self) -> &Arc<SessionManager> {
        &self.sessions
    }

    // Session

    /// Log in; a rejected login is never retried.
    pub async fn authenticate(
        &self,
        email: impl Into<String>,
        password: impl Into<SecretString>,
    ) -> Result<Session> {
        self.sessions.authenticate(email, password).await
    }

    /// Renew the session now.
    pub async fn refresh_session(&self) -> Result<Session> {
        self.sessions.refresh_session().await
    }

    /// True with a token valid for at least five more minutes.
    pub async fn is_authenticated(&self) -> bool {
        self.sessions.is_authenticated().await
    }

    /// Current session, if any.
    pub async fn session(&self) -> Option<Session> {
        self.sessions.session().await
    }

    /// Current auth lifecycle phase.
    pub async fn phase(&self) -> AuthPhase {
        self.sessions.phase().await
    }

    /// Export the session for the caller to persist.
    pub async fn get_auth_state(&self) -> AuthState {
        self.sessions.get_auth_state().await
    }

    /// Import a previously exported session.
    pub async fn restore_auth_state(&self, state: AuthState) -> Result<()> {
        self.sessions.restore_auth_state(state).await
    }

    /// Forget the session and cached credentials.
    pub async fn logout(&self) {
        self.sessions.logout().await;
    }

    // Devices

    /// Every device bound to the account; empty is not an error.
    pub async fn list_devices(&self) -> Result<Vec<DeviceRecord>> {
        self.devices.list_devices().await
    }

    /// Status poll with the standard property keys.
    pub async fn get_device_status(&self, iot_id: &str) -> Result<DeviceStatus> {
        self.devices.get_device_status(iot_id).await
    }

    /// Read only the given property keys.
    pub async fn get_device_properties(&self, iot_id: &str, keys: &[&str]) -> Result<DeviceStatus> {
        self.devices.get_device_properties(iot_id, keys).await
    }

    /// Write device properties.
    pub async fn set_device_properties(&self, iot_id: &str, items: &Value) -> Result<Value> {
        self.devices.set_device_properties(iot_id, items).await
    }

    /// Normalized status; offline devices yield an offline snapshot.
    pub async fn get_mower_snapshot(&self, iot_id: &str) -> Result<MowerSnapshot> {
        self.devices.get_mower_snapshot(iot_id).await
    }

    /// Invoke a device service for the command.
    pub async fn send_command(
        &self,
        iot_id: &str,
        command: MowerCommand,
        args: Option<Value>,
    ) -> Result<Value> {
        self.devices.send_command(iot_id, command, args).await
    }

    /// Start a mowing job.
    pub async fn start_mowing(&self, iot_id: &str) -> Result<Value> {
        self.send_command(iot_id, MowerCommand::Start, None).await
    }

    /// Pause the current job.
    pub async fn pause_mowing(&self, iot_id: &str) -> Result<Value> {
        self.send_command(iot_id, MowerCommand::Pause, None).await
    }

    /// Resume a paused job.
    pub async fn resume_mowing(&self, iot_id: &str) -> Result<Value> {
        self.send_command(iot_id, MowerCommand::Resume, None).await
    }

    /// Send the mower back to its dock.
    pub async fn return_to_dock(&self, iot_id: &str) -> Result<Value> {
        self.send_command(iot_id, MowerCommand::ReturnToDock, None).await
    }

    /// End the current job.
    pub async fn stop_mowing(&self, iot_id: &str) -> Result<Value> {
        self.send_command(iot_id, MowerCommand::Stop, None).await
    }

    // Lifecycle

    /// Cancel every in-flight call. Pending backoff sleeps end with
    /// `ClientError::Cancelled`, and so does every later call.
    pub fn shutdown(&self) {
        if !self.cancel.is_cancelled() {
            info!("shutting down mower client");
            self.cancel.cancel();
        }
    }

    /// True once `shutdown` was called or the client dropped.
    pub fn is_shut_down(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

impl Drop for MowerClient {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Builder for [`MowerClient`]. Collaborators default to the real ones.
pub struct MowerClientBuilder {
    config: ClientConfig,
    transport: Option<Arc<dyn Transport>>,
    clock: Option<Arc<dyn Clock>>,
    sleeper: Option<Arc<dyn Sleeper>>,
}

impl MowerClientBuilder {
    /// Start from config with default collaborators.
    pub fn new(config: ClientConfig) -> Self {
        Self { config, transport: None, clock: None, sleeper: None }
    }

    /// Use a custom transport.
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Use a custom clock.
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Use a custom sleeper for retry delays.
    pub fn sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = Some(sleeper);
        self
    }

    /// Validate the config and wire the client.
    pub fn build(self) -> Result<MowerClient> {
        let config = self.config;
        config.validate()?;

        let transport = match self.transport {
            Some(transport) => transport,
            None => Arc::new(
                HttpTransport::builder()
                    .timeout(Duration::from_secs(config.request_timeout_secs))
                    .user_agent(config.user_agent.clone())
                    .build()?,
            ),
        };
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let sleeper = self.sleeper.unwrap_or_else(|| Arc::new(TokioSleeper));

        let strategy: Arc<dyn AuthStrategy> = match config.generation {
            ApiGeneration::Legacy => {
                Arc::new(LegacyStrategy::new(&config, transport.clone(), clock.clone()))
            }
            ApiGeneration::OAuth2 => {
                Arc::new(OAuth2Strategy::new(&config, transport.clone(), clock.clone()))
            }
        };

        let sessions = Arc::new(SessionManager::new(strategy, clock.clone()));
        let cancel = CancellationToken::new();
        let retry = Arc::new(RetryOrchestrator::new(
            retry_config(&config.retry),
            sleeper,
            sessions.clone(),
            cancel.clone(),
        ));
        let devices = DeviceService::new(sessions.clone(), transport, clock, retry);

        debug!(generation = %config.generation, gateway = %config.api_base_url, "mower client ready");
        Ok(MowerClient { generation: config.generation, sessions, devices, cancel })
    }
}
