//! Vendor response envelope: `{"code": .., "message": .., "data": ..}`

use mowerlink_domain::constants::{CODE_SUCCESS, CODE_SUCCESS_ALT};
use mowerlink_domain::{ClientError, Result};
use serde_json::Value;

use super::client::TransportResponse;

/// Envelope result code, accepting numbers and numeric strings.
pub fn vendor_code(body: &Value) -> Option<i64> {
    match body.get("code")? {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Human-readable message, whichever field the endpoint family uses.
pub fn vendor_message(body: &Value) -> Option<String> {
    ["message", "msg", "localizedMsg", "error_description", "error"]
        .iter()
        .find_map(|key| body.get(*key).and_then(Value::as_str))
        .filter(|m| !m.is_empty())
        .map(str::to_string)
}

/// Require a JSON body.
pub fn expect_json(response: TransportResponse) -> Result<Value> {
    match response {
        TransportResponse::Json(value) => Ok(value),
        TransportResponse::Text(text) if text.trim().is_empty() => {
            Err(ClientError::InvalidResponse("empty response body".into()))
        }
        TransportResponse::Text(text) => Err(ClientError::InvalidResponse(format!(
            "expected JSON, got: {}",
            truncate(&text, 120)
        ))),
    }
}

/// Check the envelope code and return the payload.
///
/// A missing `code` is treated as success and the whole body is returned;
/// a success code returns `data` (or `null`).
pub fn unwrap_data(body: Value) -> Result<Value> {
    match vendor_code(&body) {
        None => Ok(body),
        Some(code) if code == CODE_SUCCESS || code == CODE_SUCCESS_ALT => {
            Ok(body.get("data").cloned().unwrap_or(Value::Null))
        }
        Some(code) => {
            let message =
                vendor_message(&body).unwrap_or_else(|| format!("request failed with code {code}"));
            Err(ClientError::from_vendor_code(code, message, Some(body)))
        }
    }
}

/// [`expect_json`] then [`unwrap_data`].
pub fn into_data(response: TransportResponse) -> Result<Value> {
    unwrap_data(expect_json(response)?)
}

fn truncate(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
