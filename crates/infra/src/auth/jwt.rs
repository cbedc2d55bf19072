//! IoT endpoint hint carried in the OAuth access token

use base64::engine::general_purpose::{STANDARD_NO_PAD, URL_SAFE_NO_PAD};
use base64::Engine;
use serde_json::Value;

const HINT_KEYS: [&str; 3] = ["iot", "iotEndpoint", "api_endpoint"];

/// Read the endpoint hint from the token's payload segment.
///
/// Returns `None` for opaque tokens, undecodable payloads, or payloads
/// without a hint.
pub fn endpoint_hint(token: &str) -> Option<String> {
    let payload = token.split('.').nth(1)?;
    let trimmed = payload.trim_end_matches('=');
    let bytes = URL_SAFE_NO_PAD.decode(trimmed).or_else(|_| STANDARD_NO_PAD.decode(trimmed)).ok()?;
    let claims: Value = serde_json::from_slice(&bytes).ok()?;

    HINT_KEYS.iter().find_map(|key| {
        claims.get(*key).and_then(Value::as_str).filter(|v| !v.trim().is_empty()).map(normalize_endpoint)
    })
}

/// Hints may be bare hosts; device calls need a scheme.
pub fn normalize_endpoint(raw: &str) -> String {
    let raw = raw.trim().trim_end_matches('/');
    if raw.starts_with("http://") || raw.starts_with("https://") {
        raw.to_string()
    } else {
        format!("https://{raw}")
    }
}
