//! Session manager
//!
//! Owns credentials and the current session:
//! - authenticate / refresh / restore / export transitions
//! - 5-minute validity buffer on every expiry check
//! - single-flight refresh: concurrent callers that hit an expired token
//!   together trigger one refresh, not one each
//!
//! Session fields are replaced as a whole under one write lock, so callers
//! never observe a half-updated session.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Duration;
use mowerlink_common::{Clock, SecretString};
use mowerlink_domain::constants::SESSION_EXPIRY_BUFFER_SECS;
use mowerlink_domain::{AuthPhase, AuthState, ClientError, Result, Session};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use super::{AuthStrategy, Credentials};
use crate::observability::fingerprint;

/// What the retry orchestrator needs from a session owner.
#[async_trait]
pub trait SessionRefresher: Send + Sync {
    /// Counter bumped every time the session is replaced.
    fn generation(&self) -> u64;

    /// Refresh unless the session already moved past `observed`.
    async fn refresh_after(&self, observed: u64) -> Result<()>;
}

struct SessionState {
    session: Option<Session>,
    credentials: Option<Credentials>,
    client_id: String,
    phase: AuthPhase,
}

/// Owns the current session and the credentials that produced it.
pub struct SessionManager {
    strategy: Arc<dyn AuthStrategy>,
    clock: Arc<dyn Clock>,
    state: RwLock<SessionState>,
    refresh_lock: Mutex<()>,
    generation: AtomicU64,
}

impl SessionManager {
    /// Start unauthenticated with a fresh client id.
    pub fn new(strategy: Arc<dyn AuthStrategy>, clock: Arc<dyn Clock>) -> Self {
        Self {
            strategy,
            clock,
            state: RwLock::new(SessionState {
                session: None,
                credentials: None,
                client_id: Uuid::new_v4().to_string(),
                phase: AuthPhase::Unauthenticated,
            }),
            refresh_lock: Mutex::new(()),
            generation: AtomicU64::new(0),
        }
    }

    /// Login strategy, also used to sign device calls.
    pub fn strategy(&self) -> &Arc<dyn AuthStrategy> {
        &self.strategy
    }

    fn buffer() -> Duration {
        Duration::seconds(SESSION_EXPIRY_BUFFER_SECS)
    }

    /// Log in with the given account and keep the credentials for silent
    /// re-authentication. Failures are never retried.
    #[instrument(skip(self, email, password))]
    pub async fn authenticate(
        &self,
        email: impl Into<String>,
        password: impl Into<SecretString>,
    ) -> Result<Session> {
        let credentials = Credentials::new(email, password);
        let client_id = {
            let mut state = self.state.write().await;
            state.phase = AuthPhase::Authenticating;
            state.client_id.clone()
        };

        let _refresh = self.refresh_lock.lock().await;
        match self.strategy.authenticate(&credentials, &client_id).await {
            Ok(session) => {
                self.install(session.clone()).await;
                // Only credentials the server accepted are kept for fallback
                self.state.write().await.credentials = Some(credentials);
                info!(
                    generation = ?self.strategy.generation(),
                    token = %fingerprint(&session.access_token),
                    "authenticated"
                );
                Ok(session)
            }
            Err(err) => {
                let err = as_auth_failure(err);
                warn!(error = %err, "authentication failed");
                self.clear_session().await;
                self.state.write().await.credentials = None;
                Err(err)
            }
        }
    }

    /// Refresh the session now.
    pub async fn refresh_session(&self) -> Result<Session> {
        let observed = self.generation();
        self.refresh_after(observed).await?;
        self.session()
            .await
            .ok_or_else(|| ClientError::SessionInvalid { message: "session lost during refresh".into() })
    }

    /// True only with a token valid for at least five more minutes.
    pub async fn is_authenticated(&self) -> bool {
        let now = self.clock.now_utc();
        self.state
            .read()
            .await
            .session
            .as_ref()
            .is_some_and(|s| s.is_valid_at(now, Self::buffer()))
    }

    /// Current session, refreshed first if it is inside the expiry buffer.
    pub async fn current_session(&self) -> Result<Session> {
        let observed = self.generation();
        let needs_refresh = {
            let state = self.state.read().await;
            match &state.session {
                Some(s) => !s.is_valid_at(self.clock.now_utc(), Self::buffer()),
                None if state.credentials.is_some() => true,
                None => {
                    return Err(ClientError::SessionInvalid { message: "not authenticated".into() })
                }
            }
        };

        if needs_refresh {
            debug!("session near expiry, refreshing before use");
            self.refresh_after(observed).await?;
        }

        self.session()
            .await
            .ok_or_else(|| ClientError::SessionInvalid { message: "not authenticated".into() })
    }

    /// Current session, even if near expiry.
    pub async fn session(&self) -> Option<Session> {
        self.state.read().await.session.clone()
    }

    /// Current lifecycle phase.
    pub async fn phase(&self) -> AuthPhase {
        self.state.read().await.phase
    }

    /// Per-installation client id.
    pub async fn client_id(&self) -> String {
        self.state.read().await.client_id.clone()
    }

    /// Export the session for the caller to persist.
    pub async fn get_auth_state(&self) -> AuthState {
        let state = self.state.read().await;
        AuthState::capture(state.session.as_ref(), &state.client_id)
    }

    /// Import a previously exported state. Cached credentials are dropped.
    pub async fn restore_auth_state(&self, auth_state: AuthState) -> Result<()> {
        let restored = auth_state.restore()?;
        if restored.client_id_regenerated {
            info!("restored auth state had no client id; generated a new one");
        }

        let _refresh = self.refresh_lock.lock().await;
        let mut state = self.state.write().await;
        state.phase = if restored.session.is_some() {
            AuthPhase::Authenticated
        } else {
            AuthPhase::Unauthenticated
        };
        state.session = restored.session;
        state.client_id = restored.client_id;
        state.credentials = None;
        self.generation.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    /// Forget the session and the cached credentials.
    pub async fn logout(&self) {
        let _refresh = self.refresh_lock.lock().await;
        let mut state = self.state.write().await;
        state.session = None;
        state.credentials = None;
        state.phase = AuthPhase::Unauthenticated;
        self.generation.fetch_add(1, Ordering::SeqCst);
        info!("logged out");
    }

    async fn install(&self, session: Session) {
        let mut state = self.state.write().await;
        state.client_id.clone_from(&session.client_id);
        state.session = Some(session);
        state.phase = AuthPhase::Authenticated;
        self.generation.fetch_add(1, Ordering::SeqCst);
    }

    async fn clear_session(&self) {
        let mut state = self.state.write().await;
        state.session = None;
        state.phase = AuthPhase::Unauthenticated;
        self.generation.fetch_add(1, Ordering::SeqCst);
    }

    /// Refresh token first; cached credentials once as a fallback.
    async fn do_refresh(&self) -> Result<()> {
        let (session, credentials, client_id) = {
            let mut state = self.state.write().await;
            state.phase = AuthPhase::Refreshing;
            (state.session.clone(), state.credentials.clone(), state.client_id.clone())
        };

        let refresh_error = match &session {
            Some(current) => match self.strategy.refresh(current).await {
                Ok(fresh) => {
                    self.install(fresh).await;
                    debug!("session refreshed with refresh token");
                    return Ok(());
                }
                Err(err) => {
                    warn!(error = %err, "refresh token rejected");
                    err
                }
            },
            None => ClientError::SessionInvalid { message: "no session to refresh".into() },
        };

        let Some(credentials) = credentials else {
            self.settle_after_failure(&refresh_error, session.is_some()).await;
            return Err(refresh_error);
        };

        info!("falling back to full re-authentication");
        match self.strategy.authenticate(&credentials, &client_id).await {
            Ok(fresh) => {
                self.install(fresh).await;
                Ok(())
            }
            Err(err) => {
                let err = as_auth_failure(err);
                self.settle_after_failure(&err, session.is_some()).await;
                Err(err)
            }
        }
    }

    /// Drop the session only when the failure was an auth rejection;
    /// a network blip keeps it for the next attempt. Rejected credentials
    /// are forgotten so they are never resubmitted.
    async fn settle_after_failure(&self, err: &ClientError, had_session: bool) {
        if err.is_auth_failure() {
            self.state.write().await.credentials = None;
        }
        if err.is_auth_failure() || !had_session {
            warn!(error = %err, "session unrecoverable, clearing");
            self.clear_session().await;
        } else {
            self.state.write().await.phase = AuthPhase::Authenticated;
        }
    }
}

#[async_trait]
impl SessionRefresher for SessionManager {
    fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    async fn refresh_after(&self, observed: u64) -> Result<()> {
        let _refresh = self.refresh_lock.lock().await;
        if self.generation() != observed {
            // Someone else replaced the session while we waited
            return if self.state.read().await.session.is_some() {
                debug!("refresh already done by a concurrent caller");
                Ok(())
            } else {
                Err(ClientError::SessionInvalid { message: "session was cleared".into() })
            };
        }
        self.do_refresh().await
    }
}

/// Login rejections arrive as plain API errors from some endpoints.
fn as_auth_failure(err: ClientError) -> ClientError {
    match err {
        ClientError::Api { status, code, message, .. } if (400..500).contains(&status) || status == 200 => {
            ClientError::Authentication { message, code }
        }
        other => other,
    }
}
