//! Aliyun-style gateway signing
//!
//! `base64(HMAC-SHA256(app_secret, path + "&" + sorted key=value pairs))`.
//! Common parameters (`appKey`, `timestamp`, `nonce`, optionally `iotToken`)
//! are injected before canonicalization.

use std::collections::BTreeMap;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use mowerlink_common::SecretString;
use mowerlink_domain::Result;

use super::hmac_sha256;

/// Base64 signature header
pub const HEADER_SIGNATURE: &str = "X-Ca-Signature";
/// Signature algorithm header
pub const HEADER_SIGNATURE_METHOD: &str = "X-Ca-Signature-Method";
/// Application key header
pub const HEADER_KEY: &str = "X-Ca-Key";
/// Request timestamp header, epoch milliseconds
pub const HEADER_TIMESTAMP: &str = "X-Ca-Timestamp";
/// Per-request nonce header
pub const HEADER_NONCE: &str = "X-Ca-Nonce";
/// Value of the signature method header
pub const SIGNATURE_METHOD: &str = "HmacSHA256";

/// Signed request material: send `params` as the form body with `headers`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedRequest {
    /// Base64 HMAC-SHA256 signature
    pub signature: String,
    /// `X-Ca-*` headers to send
    pub headers: Vec<(String, String)>,
    /// Form parameters, including the added auth fields
    pub params: BTreeMap<String, String>,
}

/// Gateway signer holding the application key pair.
#[derive(Debug, Clone)]
pub struct AliyunSigner {
    app_key: String,
    app_secret: SecretString,
}

impl AliyunSigner {
    /// Signer for the given application key pair.
    pub fn new(app_key: impl Into<String>, app_secret: impl Into<SecretString>) -> Self {
        Self { app_key: app_key.into(), app_secret: app_secret.into() }
    }

    /// Application key sent with each call.
    pub fn app_key(&self) -> &str {
        &self.app_key
    }

    /// Sign a call to `path`.
    ///
    /// `timestamp_ms` and `nonce` must be fresh for every request.
    pub fn sign<I, K, V>(
        &self,
        path: &str,
        params: I,
        iot_token: Option<&str>,
        timestamp_ms: u64,
        nonce: &str,
    ) -> Result<SignedRequest>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut all: BTreeMap<String, String> =
            params.into_iter().map(|(k, v)| (k.into(), v.into())).collect();

        let timestamp = timestamp_ms.to_string();
        all.insert("appKey".into(), self.app_key.clone());
        all.insert("timestamp".into(), timestamp.clone());
        all.insert("nonce".into(), nonce.to_string());
        if let Some(token) = iot_token.filter(|t| !t.is_empty()) {
            all.insert("iotToken".into(), token.to_string());
        }

        let string_to_sign = format!("{path}&{}", canonical_string(&all));
        let signature = STANDARD.encode(hmac_sha256(
            self.app_secret.expose().as_bytes(),
            string_to_sign.as_bytes(),
        )?);

        let headers = vec![
            (HEADER_SIGNATURE.to_string(), signature.clone()),
            (HEADER_SIGNATURE_METHOD.to_string(), SIGNATURE_METHOD.to_string()),
            (HEADER_KEY.to_string(), self.app_key.clone()),
            (HEADER_TIMESTAMP.to_string(), timestamp),
            (HEADER_NONCE.to_string(), nonce.to_string()),
        ];

        Ok(SignedRequest { signature, headers, params: all })
    }
}

/// Sorted `key=value` pairs joined with `&`. Values are not URL-encoded.
pub fn canonical_string(params: &BTreeMap<String, String>) -> String {
    params.iter().map(|(k, v)| format!("{k}={v}")).collect::<Vec<_>>().join("&")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signer() -> AliyunSigner {
        AliyunSigner::new("app-key", "app-secret")
    }

    #[test]
    fn known_signature() {
        let signed = signer()
            .sign(
                "/thing/properties/get",
                [("iotId", "dev-1")],
                Some("tok"),
                1_700_000_000_000,
                "nonce-1",
            )
            .unwrap();

        assert_eq!(
            canonical_string(&signed.params),
            "appKey=app-key&iotId=dev-1&iotToken=tok&nonce=nonce-1&timestamp=1700000000000"
        );
        assert_eq!(signed.signature, "K0otgn5X/1n4WGgyUjR8a6hDfoCTzKbI7bGiYoXxx7w=");
    }

    #[test]
    fn input_order_does_not_matter() {
        let forward = signer()
            .sign("/p", [("b", "2"), ("a", "1"), ("c", "3")], None, 1, "n")
            .unwrap();
        let reverse = signer()
            .sign("/p", [("c", "3"), ("a", "1"), ("b", "2")], None, 1, "n")
            .unwrap();
        assert_eq!(forward, reverse);
    }

    #[test]
    fn nonce_and_timestamp_change_the_signature() {
        let base = signer().sign("/p", [("a", "1")], None, 1, "n1").unwrap();
        let other_nonce = signer().sign("/p", [("a", "1")], None, 1, "n2").unwrap();
        let other_time = signer().sign("/p", [("a", "1")], None, 2, "n1").unwrap();
        assert_ne!(base.signature, other_nonce.signature);
        assert_ne!(base.signature, other_time.signature);
    }

    #[test]
    fn headers_describe_the_signature() {
        let signed = signer().sign("/p", Vec::<(String, String)>::new(), None, 42, "n").unwrap();
        let header = |name: &str| {
            signed.headers.iter().find(|(k, _)| k == name).map(|(_, v)| v.as_str())
        };

        assert_eq!(header(HEADER_SIGNATURE), Some(signed.signature.as_str()));
        assert_eq!(header(HEADER_SIGNATURE_METHOD), Some("HmacSHA256"));
        assert_eq!(header(HEADER_KEY), Some("app-key"));
        assert_eq!(header(HEADER_TIMESTAMP), Some("42"));
        assert_eq!(header(HEADER_NONCE), Some("n"));
        assert!(!signed.params.contains_key("iotToken"));
    }
}
