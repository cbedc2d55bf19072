//! Legacy three-step login: connect (region lookup), login, token exchange
//!
//! Tokens from this flow live for a fixed two hours regardless of what the
//! server says.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Duration;
use mowerlink_common::Clock;
use mowerlink_domain::constants::{
    LEGACY_TOKEN_LIFETIME_SECS, PATH_CREATE_SESSION, PATH_REFRESH_SESSION, PATH_REGION_GET,
    PATH_USER_LOGIN,
};
use mowerlink_domain::{ApiGeneration, ClientConfig, ClientError, Result, Session};
use serde_json::Value;
use tracing::{debug, info, instrument};
use uuid::Uuid;

use super::jwt::normalize_endpoint;
use super::{join_url, AuthStrategy, Credentials};
use crate::http::envelope::into_data;
use crate::http::{Transport, TransportRequest};
use crate::observability::fingerprint;
use crate::signing::AliyunSigner;

/// Where the account lives, as reported by the connect step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionInfo {
    /// Region identifier, when the lookup returned one
    pub region_id: Option<String>,
    /// Gateway for signed calls
    pub api_gateway: String,
    /// Base for the account login form
    pub login_base: String,
}

/// Three-step login for the legacy gateway API.
pub struct LegacyStrategy {
    transport: Arc<dyn Transport>,
    clock: Arc<dyn Clock>,
    signer: AliyunSigner,
    api_base_url: String,
    auth_base_url: String,
    country_code: String,
    region: Option<String>,
}

impl LegacyStrategy {
    /// Build from client config; nothing is sent until login.
    pub fn new(config: &ClientConfig, transport: Arc<dyn Transport>, clock: Arc<dyn Clock>) -> Self {
        Self {
            transport,
            clock,
            signer: AliyunSigner::new(config.app_key.clone(), config.app_secret.clone()),
            api_base_url: config.api_base_url.clone(),
            auth_base_url: config.auth_base_url.clone(),
            country_code: config.country_code.clone(),
            region: config.region.clone(),
        }
    }

    /// Gateway-signed call returning the envelope payload.
    async fn signed_call(
        &self,
        base: &str,
        path: &str,
        params: BTreeMap<String, String>,
        iot_token: Option<&str>,
    ) -> Result<Value> {
        let nonce = Uuid::new_v4().to_string();
        let signed =
            self.signer.sign(path, params, iot_token, self.clock.millis_since_epoch(), &nonce)?;
        let request = TransportRequest::post(join_url(base, path))
            .headers(signed.headers)
            .form(signed.params);
        into_data(self.transport.execute(request).await?)
    }

    /// Step 1: resolve region and endpoints. Missing fields keep the
    /// configured defaults.
    #[instrument(skip(self))]
    pub async fn connect(&self) -> Result<RegionInfo> {
        let params = BTreeMap::from([
            ("type".to_string(), "THIRD_AUTHCODE".to_string()),
            ("countryCode".to_string(), self.country_code.clone()),
        ]);
        let data = self.signed_call(&self.api_base_url, PATH_REGION_GET, params, None).await?;

        let field = |key: &str| {
            data.get(key).and_then(Value::as_str).filter(|v| !v.trim().is_empty())
        };
        let info = RegionInfo {
            region_id: field("regionId").map(str::to_string).or_else(|| self.region.clone()),
            api_gateway: field("apiGatewayEndpoint")
                .map(normalize_endpoint)
                .unwrap_or_else(|| self.api_base_url.clone()),
            login_base: field("oaApiGatewayEndpoint")
                .map(normalize_endpoint)
                .unwrap_or_else(|| self.auth_base_url.clone()),
        };

        debug!(region = ?info.region_id, gateway = %info.api_gateway, "resolved account region");
        Ok(info)
    }

    /// Step 2: account login, yielding a one-time auth code.
    async fn login(&self, login_base: &str, credentials: &Credentials, client_id: &str) -> Result<String> {
        let form = BTreeMap::from([
            ("email".to_string(), credentials.email.clone()),
            ("password".to_string(), credentials.password.expose().to_string()),
            ("clientId".to_string(), client_id.to_string()),
        ]);
        let request = TransportRequest::post(join_url(login_base, PATH_USER_LOGIN)).form(form);
        let data = into_data(self.transport.execute(request).await?)?;

        data.get("authCode")
            .and_then(Value::as_str)
            .filter(|code| !code.is_empty())
            .map(str::to_string)
            .ok_or_else(|| ClientError::InvalidResponse("login response has no authCode".into()))
    }

    /// Step 3: trade the auth code for an IoT token.
    async fn exchange(&self, region: &RegionInfo, auth_code: &str, client_id: &str) -> Result<Session> {
        let params = BTreeMap::from([
            ("authCode".to_string(), auth_code.to_string()),
            ("accountType".to_string(), "OA_SESSION".to_string()),
            ("appKey".to_string(), self.signer.app_key().to_string()),
        ]);
        let data = self.signed_call(&region.api_gateway, PATH_CREATE_SESSION, params, None).await?;

        let access_token = required_str(&data, "iotToken")?;
        let refresh_token = required_str(&data, "refreshToken")?;
        let identity_id = data
            .pointer("/identity/identityId")
            .and_then(Value::as_str)
            .map(str::to_string);

        Ok(Session {
            access_token,
            refresh_token,
            expires_at: self.clock.now_utc() + Duration::seconds(LEGACY_TOKEN_LIFETIME_SECS),
            identity_id,
            client_id: client_id.to_string(),
            endpoint: Some(region.api_gateway.clone()),
            iot_endpoint: None,
            region: region.region_id.clone(),
        })
    }
}

#[async_trait]
impl AuthStrategy for LegacyStrategy {
    fn generation(&self) -> ApiGeneration {
        ApiGeneration::Legacy
    }

    #[instrument(skip(self, credentials, client_id), fields(email = %credentials.email))]
    async fn authenticate(&self, credentials: &Credentials, client_id: &str) -> Result<Session> {
        let region = self.connect().await?;
        let auth_code = self.login(&region.login_base, credentials, client_id).await?;
        let session = self.exchange(&region, &auth_code, client_id).await?;

        info!(token = %fingerprint(&session.access_token), "legacy session established");
        Ok(session)
    }

    #[instrument(skip(self, session))]
    async fn refresh(&self, session: &Session) -> Result<Session> {
        let mut params = BTreeMap::from([("refreshToken".to_string(), session.refresh_token.clone())]);
        if let Some(identity) = &session.identity_id {
            params.insert("identityId".to_string(), identity.clone());
        }

        let base = session.endpoint.as_deref().unwrap_or(&self.api_base_url);
        let data = self.signed_call(base, PATH_REFRESH_SESSION, params, None).await?;

        let access_token = required_str(&data, "iotToken")?;
        let refresh_token = data
            .get("refreshToken")
            .and_then(Value::as_str)
            .filter(|t| !t.is_empty())
            .map_or_else(|| session.refresh_token.clone(), str::to_string);

        info!(token = %fingerprint(&access_token), "legacy session refreshed");
        Ok(Session {
            access_token,
            refresh_token,
            expires_at: self.clock.now_utc() + Duration::seconds(LEGACY_TOKEN_LIFETIME_SECS),
            ..session.clone()
        })
    }

    fn signer(&self) -> &AliyunSigner {
        &self.signer
    }

    fn default_gateway(&self) -> &str {
        &self.api_base_url
    }
}

pub(crate) fn required_str(data: &Value, key: &str) -> Result<String> {
    data.get(key)
        .and_then(Value::as_str)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .ok_or_else(|| ClientError::InvalidResponse(format!("response is missing {key}")))
}
