//! Device list payload shapes
//!
//! The binding list arrives either as a bare array or wrapped once more in
//! `{"data": [...]}` (so `data.data` in the raw envelope). The IoT endpoint
//! listing uses `list` or `records` instead.

use serde_json::Value;

const LIST_KEYS: [&str; 3] = ["data", "list", "records"];

/// Device entries in an unwrapped payload, in server order.
pub fn device_entries(payload: &Value) -> &[Value] {
    match payload {
        Value::Array(items) => items,
        Value::Object(obj) => LIST_KEYS
            .iter()
            .find_map(|key| match obj.get(*key) {
                Some(Value::Array(items)) => Some(items.as_slice()),
                Some(nested @ Value::Object(_)) => Some(device_entries(nested)),
                _ => None,
            })
            .unwrap_or(&[]),
        _ => &[],
    }
}
