//! OAuth2 password / refresh-token grants against the signed token endpoint
//!
//! Token lifetime comes from the server's `expires_in`.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::Duration;
use mowerlink_common::Clock;
use mowerlink_domain::constants::DEFAULT_OAUTH_EXPIRES_IN_SECS;
use mowerlink_domain::{ApiGeneration, ClientConfig, ClientError, Result, Session};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, instrument};

use super::jwt::endpoint_hint;
use super::{join_url, AuthStrategy, Credentials};
use crate::http::envelope::{expect_json, unwrap_data};
use crate::http::{Transport, TransportRequest};
use crate::observability::fingerprint;
use crate::signing::{AliyunSigner, OAuthSigner};

/// Field order here is the signed byte order.
#[derive(Debug, Serialize)]
struct PasswordGrant<'a> {
    username: &'a str,
    password: String,
    client_id: &'a str,
    grant_type: &'static str,
}

#[derive(Debug, Serialize)]
struct RefreshGrant<'a> {
    refresh_token: &'a str,
    client_id: &'a str,
    grant_type: &'static str,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<Value>,
    #[serde(default, rename = "userInformation")]
    user_information: Option<Value>,
}

impl TokenResponse {
    /// Tokens arrive either at the top level or under `data`.
    fn from_body(body: Value) -> Result<Self> {
        let payload = unwrap_data(body)?;
        let tokens = match payload.get("data") {
            Some(inner) if inner.get("access_token").is_some() => inner.clone(),
            _ => payload,
        };
        serde_json::from_value(tokens)
            .map_err(|e| ClientError::InvalidResponse(format!("malformed token response: {e}")))
    }

    fn expires_in_secs(&self) -> i64 {
        let parsed = match &self.expires_in {
            Some(Value::Number(n)) => n.as_i64(),
            Some(Value::String(s)) => s.trim().parse().ok(),
            _ => None,
        };
        parsed.filter(|secs| *secs > 0).unwrap_or(DEFAULT_OAUTH_EXPIRES_IN_SECS)
    }

    fn identity_id(&self) -> Option<String> {
        let info = self.user_information.as_ref()?;
        ["userId", "user_id", "id"].iter().find_map(|key| match info.get(*key)? {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
    }
}

/// Signed OAuth2 password and refresh grants.
pub struct OAuth2Strategy {
    transport: Arc<dyn Transport>,
    clock: Arc<dyn Clock>,
    gateway_signer: AliyunSigner,
    token_signer: OAuthSigner,
    api_base_url: String,
    auth_base_url: String,
    token_path: String,
    region: Option<String>,
}

impl OAuth2Strategy {
    /// Build from client config; nothing is sent until login.
    pub fn new(config: &ClientConfig, transport: Arc<dyn Transport>, clock: Arc<dyn Clock>) -> Self {
        Self {
            transport,
            clock,
            gateway_signer: AliyunSigner::new(config.app_key.clone(), config.app_secret.clone()),
            token_signer: OAuthSigner::new(config.client_id.clone(), config.client_secret.clone()),
            api_base_url: config.api_base_url.clone(),
            auth_base_url: config.auth_base_url.clone(),
            token_path: config.oauth_token_path.clone(),
            region: config.region.clone(),
        }
    }

    async fn token_request<T: Serialize>(&self, grant: &T) -> Result<TokenResponse> {
        let signature =
            self.token_signer.sign(grant, &self.token_path, self.clock.millis_since_epoch())?;

        // Send exactly the fields that were signed
        let signed_fields: BTreeMap<String, Value> = serde_json::from_str(&signature.body_json)
            .map_err(|e| ClientError::InvalidState(format!("token request is not an object: {e}")))?;
        let form = signed_fields
            .into_iter()
            .map(|(key, value)| match value {
                Value::String(s) => (key, s),
                other => (key, other.to_string()),
            })
            .collect();

        let request = TransportRequest::post(join_url(&self.auth_base_url, &self.token_path))
            .headers(signature.headers(self.token_signer.client_id()))
            .form(form);

        let body = expect_json(self.transport.execute(request).await?)?;
        TokenResponse::from_body(body)
    }

    fn session_from(&self, tokens: TokenResponse, client_id: &str, previous: Option<&Session>) -> Result<Session> {
        let refresh_token = tokens
            .refresh_token
            .clone()
            .filter(|t| !t.is_empty())
            .or_else(|| previous.map(|s| s.refresh_token.clone()))
            .ok_or_else(|| ClientError::InvalidResponse("token response has no refresh_token".into()))?;

        let iot_endpoint = endpoint_hint(&tokens.access_token)
            .or_else(|| previous.and_then(|s| s.iot_endpoint.clone()));
        if iot_endpoint.is_none() {
            debug!("access token carries no IoT endpoint hint; using the default API domain");
        }

        Ok(Session {
            expires_at: self.clock.now_utc() + Duration::seconds(tokens.expires_in_secs()),
            identity_id: tokens.identity_id().or_else(|| previous.and_then(|s| s.identity_id.clone())),
            access_token: tokens.access_token,
            refresh_token,
            client_id: client_id.to_string(),
            endpoint: previous.and_then(|s| s.endpoint.clone()),
            iot_endpoint,
            region: previous.and_then(|s| s.region.clone()).or_else(|| self.region.clone()),
        })
    }
}

#[async_trait]
impl AuthStrategy for OAuth2Strategy {
    fn generation(&self) -> ApiGeneration {
        ApiGeneration::OAuth2
    }

    #[instrument(skip(self, credentials, client_id), fields(email = %credentials.email))]
    async fn authenticate(&self, credentials: &Credentials, client_id: &str) -> Result<Session> {
        let grant = PasswordGrant {
            username: &credentials.email,
            password: STANDARD.encode(credentials.password.expose()),
            client_id: self.token_signer.client_id(),
            grant_type: "password",
        };
        let tokens = self.token_request(&grant).await?;
        let session = self.session_from(tokens, client_id, None)?;

        info!(token = %fingerprint(&session.access_token), expires_at = %session.expires_at, "oauth session established");
        Ok(session)
    }

    #[instrument(skip(self, session))]
    async fn refresh(&self, session: &Session) -> Result<Session> {
        let grant = RefreshGrant {
            refresh_token: &session.refresh_token,
            client_id: self.token_signer.client_id(),
            grant_type: "refresh_token",
        };
        let tokens = self.token_request(&grant).await?;
        let refreshed = self.session_from(tokens, &session.client_id, Some(session))?;

        info!(token = %fingerprint(&refreshed.access_token), "oauth session refreshed");
        Ok(refreshed)
    }

    fn signer(&self) -> &AliyunSigner {
        &self.gateway_signer
    }

    fn default_gateway(&self) -> &str {
        &self.api_base_url
    }
}
