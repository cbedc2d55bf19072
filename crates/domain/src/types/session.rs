//! Session and exported auth-state types
//!
//! A [`Session`] is either fully populated or absent; there is no partially
//! filled variant. [`AuthState`] is the opaque, caller-persisted export and
//! accepts both the legacy (`iotToken`, `iotTokenExpire`, ...) and current
//! field layouts on import.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::ClientError;

/// Which generation of the vendor login API a client talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApiGeneration {
    /// Three-step connect / login / token-exchange flow, 2-hour tokens
    Legacy,
    /// Signed OAuth2 token endpoint, server-supplied `expires_in`
    #[default]
    OAuth2,
}

impl FromStr for ApiGeneration {
    type Err = ClientError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "legacy" | "aliyun" => Ok(Self::Legacy),
            "oauth2" | "oauth" => Ok(Self::OAuth2),
            other => Err(ClientError::Config(format!("unknown API generation: {other}"))),
        }
    }
}

impl fmt::Display for ApiGeneration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Legacy => f.write_str("legacy"),
            Self::OAuth2 => f.write_str("oauth2"),
        }
    }
}

/// Lifecycle phase of the session manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthPhase {
    /// No session
    Unauthenticated,
    /// Login in flight
    Authenticating,
    /// Session installed
    Authenticated,
    /// Refresh in flight
    Refreshing,
}

/// Authenticated session material.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Bearer credential for device calls ("iotToken" in the legacy flow)
    pub access_token: String,
    /// Credential used to renew the access token
    pub refresh_token: String,
    /// Absolute access-token expiry
    pub expires_at: DateTime<Utc>,
    /// Vendor account identity
    pub identity_id: Option<String>,
    /// Per-installation client id
    pub client_id: String,
    /// Gateway base URL override for signed calls
    pub endpoint: Option<String>,
    /// IoT endpoint hint captured at authentication
    pub iot_endpoint: Option<String>,
    /// Region the account lives in
    pub region: Option<String>,
}

impl Session {
    /// True if the token is still valid `buffer` from `now`.
    pub fn is_valid_at(&self, now: DateTime<Utc>, buffer: Duration) -> bool {
        self.expires_at > now + buffer
    }

    /// Seconds until expiry (negative once expired).
    pub fn seconds_until_expiry(&self, now: DateTime<Utc>) -> i64 {
        (self.expires_at - now).num_seconds()
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .field("identity_id", &self.identity_id)
            .field("client_id", &self.client_id)
            .field("endpoint", &self.endpoint)
            .field("iot_endpoint", &self.iot_endpoint)
            .field("region", &self.region)
            .finish()
    }
}

/// Exported auth state, persisted by the caller between process runs.
///
/// Field order in the serialized form carries no meaning.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuthState {
    /// Bearer credential
    #[serde(default, alias = "iotToken", alias = "accessToken", skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,

    /// Renewal credential
    #[serde(default, alias = "refreshToken", skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,

    /// Absolute expiry
    #[serde(default, alias = "expiresAt", skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,

    /// Legacy layout: absolute expiry as epoch milliseconds (or seconds)
    #[serde(default, rename = "iotTokenExpire", skip_serializing)]
    pub legacy_expiry: Option<i64>,

    /// Vendor account identity
    #[serde(default, alias = "identityId", skip_serializing_if = "Option::is_none")]
    pub identity_id: Option<String>,

    /// Per-installation client id
    #[serde(default, alias = "clientId", skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,

    /// Gateway base URL override
    #[serde(default, alias = "apiGatewayEndpoint", skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,

    /// IoT endpoint hint
    #[serde(default, alias = "iotEndpoint", skip_serializing_if = "Option::is_none")]
    pub iot_endpoint: Option<String>,

    /// Account region
    #[serde(default, alias = "regionId", skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
}

/// Result of importing an [`AuthState`].
#[derive(Debug, Clone, PartialEq)]
pub struct RestoredAuth {
    /// Imported session, absent when the state held no token
    pub session: Option<Session>,
    /// Client id to use from now on
    pub client_id: String,
    /// True when the imported state had no usable client id
    pub client_id_regenerated: bool,
}

impl AuthState {
    /// Export the given session (if any) and client id.
    pub fn capture(session: Option<&Session>, client_id: &str) -> Self {
        match session {
            Some(s) => Self {
                access_token: Some(s.access_token.clone()),
                refresh_token: Some(s.refresh_token.clone()),
                expires_at: Some(s.expires_at),
                legacy_expiry: None,
                identity_id: s.identity_id.clone(),
                client_id: Some(s.client_id.clone()),
                endpoint: s.endpoint.clone(),
                iot_endpoint: s.iot_endpoint.clone(),
                region: s.region.clone(),
            },
            None => Self { client_id: Some(client_id.to_string()), ..Self::default() },
        }
    }

    /// Parse an exported blob.
    pub fn from_json(blob: &str) -> Result<Self, ClientError> {
        serde_json::from_str(blob)
            .map_err(|e| ClientError::InvalidState(format!("unreadable auth state: {e}")))
    }

    /// Serialize to the opaque blob handed to the caller.
    pub fn to_json(&self) -> Result<String, ClientError> {
        serde_json::to_string(self)
            .map_err(|e| ClientError::InvalidState(format!("cannot export auth state: {e}")))
    }

    /// Turn the imported state into a session.
    ///
    /// All token fields present yields a session, none yields `None`, anything
    /// in between is rejected. A blank or missing client id is regenerated.
    pub fn restore(self) -> Result<RestoredAuth, ClientError> {
        let (client_id, client_id_regenerated) = match non_blank(self.client_id) {
            Some(id) => (id, false),
            None => (Uuid::new_v4().to_string(), true),
        };

        let expires_at = self.expires_at.or_else(|| self.legacy_expiry.and_then(legacy_expiry_to_utc));
        let access_token = non_blank(self.access_token);
        let refresh_token = non_blank(self.refresh_token);

        let session = match (access_token, refresh_token, expires_at) {
            (Some(access_token), Some(refresh_token), Some(expires_at)) => Some(Session {
                access_token,
                refresh_token,
                expires_at,
                identity_id: non_blank(self.identity_id),
                client_id: client_id.clone(),
                endpoint: non_blank(self.endpoint),
                iot_endpoint: non_blank(self.iot_endpoint),
                region: non_blank(self.region),
            }),
            (None, None, None) => None,
            _ => {
                return Err(ClientError::InvalidState(
                    "auth state has only some of access token, refresh token and expiry".into(),
                ))
            }
        };

        Ok(RestoredAuth { session, client_id, client_id_regenerated })
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Legacy blobs stored epoch milliseconds; very old ones stored seconds.
fn legacy_expiry_to_utc(raw: i64) -> Option<DateTime<Utc>> {
    if raw >= 100_000_000_000 {
        Utc.timestamp_millis_opt(raw).single()
    } else {
        Utc.timestamp_opt(raw, 0).single()
    }
}
