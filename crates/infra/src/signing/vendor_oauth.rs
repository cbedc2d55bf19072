//! Vendor OAuth token-endpoint signing
//!
//! `hex(HMAC-SHA256(hex(md5(client_secret)), client_id + timestamp + path + json))`
//! where `json` is the compact serialization of the request object. Field
//! order is whatever the request struct declares; nothing is sorted.

use md5::{Digest, Md5};
use mowerlink_common::SecretString;
use mowerlink_domain::{ClientError, Result};
use serde::Serialize;

use super::hmac_sha256;

/// OAuth client id header
pub const HEADER_CLIENT_ID: &str = "Client-Id";
/// Request timestamp header, epoch milliseconds
pub const HEADER_TIMESTAMP: &str = "Timestamp";
/// Hex signature header
pub const HEADER_SIGNATURE: &str = "Signature";

/// Signature plus the exact body and timestamp it covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OAuthSignature {
    /// Hex HMAC-SHA256 signature
    pub signature: String,
    /// Timestamp covered by the signature
    pub timestamp: String,
    /// Exact JSON body covered by the signature; send it verbatim
    pub body_json: String,
}

impl OAuthSignature {
    /// Headers carrying the signature for `client_id`.
    pub fn headers(&self, client_id: &str) -> Vec<(String, String)> {
        vec![
            (HEADER_CLIENT_ID.to_string(), client_id.to_string()),
            (HEADER_TIMESTAMP.to_string(), self.timestamp.clone()),
            (HEADER_SIGNATURE.to_string(), self.signature.clone()),
        ]
    }
}

/// Token-endpoint signer holding the OAuth client credentials.
#[derive(Debug, Clone)]
pub struct OAuthSigner {
    client_id: String,
    client_secret: SecretString,
}

impl OAuthSigner {
    /// Signer for the given OAuth client.
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<SecretString>) -> Self {
        Self { client_id: client_id.into(), client_secret: client_secret.into() }
    }

    /// OAuth client id.
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Sign `request` as compact JSON for a POST to `path`.
    pub fn sign<T: Serialize>(&self, request: &T, path: &str, timestamp_ms: u64) -> Result<OAuthSignature> {
        let body_json = serde_json::to_string(request)
            .map_err(|e| ClientError::InvalidState(format!("cannot serialize token request: {e}")))?;
        let timestamp = timestamp_ms.to_string();

        let key = hex::encode(Md5::digest(self.client_secret.expose().as_bytes()));
        let message = format!("{}{timestamp}{path}{body_json}", self.client_id);
        let signature = hex::encode(hmac_sha256(key.as_bytes(), message.as_bytes())?);

        Ok(OAuthSignature { signature, timestamp, body_json })
    }
}
