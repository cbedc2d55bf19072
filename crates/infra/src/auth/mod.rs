//! Authentication
//!
//! The two login generations are concrete strategies behind [`AuthStrategy`],
//! picked once when the client is built. [`SessionManager`] owns the
//! credentials and the current session and drives the strategy.

pub mod credentials;
pub mod jwt;
pub mod legacy;
pub mod oauth2;
pub mod session;

use std::collections::BTreeMap;

use async_trait::async_trait;
use mowerlink_domain::{ApiGeneration, Result, Session};

pub use credentials::Credentials;
pub use legacy::LegacyStrategy;
pub use oauth2::OAuth2Strategy;
pub use session::{SessionManager, SessionRefresher};

use crate::http::TransportRequest;
use crate::signing::{AliyunSigner, SignedRequest};

/// A gateway-signed call ready to send.
#[derive(Debug, Clone)]
pub struct SignedCall {
    /// Full request URL
    pub url: String,
    /// Signature headers and form parameters
    pub signed: SignedRequest,
}

impl SignedCall {
    /// Form POST carrying the signed parameters.
    pub fn into_request(self) -> TransportRequest {
        TransportRequest::post(self.url).headers(self.signed.headers).form(self.signed.params)
    }
}

/// Capability shared by both login generations.
#[async_trait]
pub trait AuthStrategy: Send + Sync {
    fn generation(&self) -> ApiGeneration;

    /// Full login handshake. Never retried here.
    async fn authenticate(&self, credentials: &Credentials, client_id: &str) -> Result<Session>;

    /// Exchange the session's refresh token for a new session.
    async fn refresh(&self, session: &Session) -> Result<Session>;

    /// Gateway signer for device calls.
    fn signer(&self) -> &AliyunSigner;

    /// Gateway used when the session carries no endpoint override.
    fn default_gateway(&self) -> &str;

    /// Sign a device call for `session`.
    fn sign(
        &self,
        path: &str,
        params: BTreeMap<String, String>,
        session: Option<&Session>,
        timestamp_ms: u64,
        nonce: &str,
    ) -> Result<SignedCall> {
        let base = session
            .and_then(|s| s.endpoint.as_deref())
            .unwrap_or_else(|| self.default_gateway());
        let token = session.map(|s| s.access_token.as_str());
        let signed = self.signer().sign(path, params, token, timestamp_ms, nonce)?;
        Ok(SignedCall { url: join_url(base, path), signed })
    }
}

/// `base` + `path` with exactly one slash between them.
pub(crate) fn join_url(base: &str, path: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'))
}
