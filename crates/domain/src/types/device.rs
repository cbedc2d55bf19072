//! Device records and status property bags

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::mower::MowerState;
use crate::constants::{
    PROP_BATTERY, PROP_CHARGE_STATE, PROP_ERROR_CODE, PROP_LOCATION, PROP_MOWED_AREA, PROP_SPEED,
    PROP_TOTAL_AREA, PROP_WORK_STATE,
};

/// Read-only device snapshot returned by a device listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceRecord {
    /// Device identifier used by every device call
    pub iot_id: String,
    /// Factory device name
    pub device_name: Option<String>,
    /// Name the owner gave the device
    pub nick_name: Option<String>,
    /// Product line identifier
    pub product_key: Option<String>,
    /// Model name
    pub product_model: Option<String>,
    /// Marketing product name
    pub product_name: Option<String>,
    /// Device category
    pub category_key: Option<String>,
}

/// Wire shape; the two API generations disagree on field names.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawDeviceRecord {
    #[serde(default, alias = "iot_id", alias = "deviceId", alias = "device_id")]
    iot_id: Option<Value>,
    #[serde(default, alias = "device_name", alias = "name")]
    device_name: Option<String>,
    #[serde(default, alias = "nick_name", alias = "nickname")]
    nick_name: Option<String>,
    #[serde(default, alias = "product_key")]
    product_key: Option<String>,
    #[serde(default, alias = "product_model", alias = "model")]
    product_model: Option<String>,
    #[serde(default, alias = "product_name")]
    product_name: Option<String>,
    #[serde(default, alias = "category_key", alias = "category")]
    category_key: Option<String>,
}

impl DeviceRecord {
    /// Parse one listing entry. Entries without an identifier yield `None`.
    pub fn from_value(value: &Value) -> Option<Self> {
        let raw = RawDeviceRecord::deserialize(value).ok()?;
        let iot_id = match raw.iot_id? {
            Value::String(s) if !s.trim().is_empty() => s,
            Value::Number(n) => n.to_string(),
            _ => return None,
        };
        Some(Self {
            iot_id,
            device_name: blank_to_none(raw.device_name),
            nick_name: blank_to_none(raw.nick_name),
            product_key: blank_to_none(raw.product_key),
            product_model: blank_to_none(raw.product_model),
            product_name: blank_to_none(raw.product_name),
            category_key: blank_to_none(raw.category_key),
        })
    }

    /// Parse a listing array, skipping unusable entries.
    pub fn from_values(values: &[Value]) -> Vec<Self> {
        values.iter().filter_map(Self::from_value).collect()
    }

    /// Nickname, then device name, then product name, then the id.
    pub fn display_name(&self) -> &str {
        self.nick_name
            .as_deref()
            .or(self.device_name.as_deref())
            .or(self.product_name.as_deref())
            .unwrap_or(&self.iot_id)
    }
}

fn blank_to_none(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Raw property bag for one device, holding only the keys that were asked for.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeviceStatus {
    /// Device the properties belong to
    pub iot_id: String,
    /// Requested keys as returned by the server
    pub properties: BTreeMap<String, Value>,
}

impl DeviceStatus {
    /// Build a status from a properties payload, keeping only `requested` keys.
    ///
    /// Accepts either a flat object or the thing-model form where each key
    /// maps to `{"value": .., "time": ..}`.
    pub fn from_payload(iot_id: impl Into<String>, payload: &Value, requested: &[&str]) -> Self {
        let properties = payload
            .as_object()
            .map(|obj| {
                obj.iter()
                    .filter(|(key, _)| requested.contains(&key.as_str()))
                    .map(|(key, value)| (key.clone(), value.clone()))
                    .collect()
            })
            .unwrap_or_default();
        Self { iot_id: iot_id.into(), properties }
    }

    /// Raw value for a key, with any `{"value": ..}` wrapper removed.
    pub fn value(&self, key: &str) -> Option<&Value> {
        let value = match self.properties.get(key)? {
            Value::Object(obj) if obj.contains_key("value") => obj.get("value")?,
            other => other,
        };
        (!value.is_null()).then_some(value)
    }

    /// Numeric value as an integer; numeric strings and booleans are accepted.
    pub fn integer(&self, key: &str) -> Option<i64> {
        match self.value(key)? {
            Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
            Value::String(s) => s.trim().parse::<f64>().ok().map(|f| f as i64),
            Value::Bool(b) => Some(i64::from(*b)),
            _ => None,
        }
    }

    /// Numeric value as a float; numeric strings are accepted.
    pub fn float(&self, key: &str) -> Option<f64> {
        match self.value(key)? {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Battery percentage clamped to 0-100.
    pub fn battery_level(&self) -> Option<u8> {
        self.integer(PROP_BATTERY).map(|b| b.clamp(0, 100) as u8)
    }

    /// Raw vendor work-state code.
    pub fn work_state(&self) -> Option<i64> {
        self.integer(PROP_WORK_STATE)
    }

    /// Raw charge-state code.
    pub fn charge_state(&self) -> Option<i64> {
        self.integer(PROP_CHARGE_STATE)
    }

    /// Error code, with zero meaning "no error".
    pub fn error_code(&self) -> Option<i64> {
        self.integer(PROP_ERROR_CODE).filter(|code| *code != 0)
    }

    /// Area of the current job.
    pub fn total_area(&self) -> Option<f64> {
        self.float(PROP_TOTAL_AREA)
    }

    /// Area mowed so far in the current job.
    pub fn mowed_area(&self) -> Option<f64> {
        self.float(PROP_MOWED_AREA)
    }

    /// Current speed.
    pub fn speed(&self) -> Option<f64> {
        self.float(PROP_SPEED)
    }

    /// Location payload, passed through uninterpreted.
    pub fn location(&self) -> Option<&Value> {
        self.value(PROP_LOCATION)
    }

    /// Mowed share of the total area, 0-100.
    pub fn progress_percent(&self) -> Option<u8> {
        let total = self.total_area().filter(|t| *t > 0.0)?;
        let mowed = self.mowed_area()?;
        Some((mowed / total * 100.0).round().clamp(0.0, 100.0) as u8)
    }

    /// Normalized state from the work and charge codes.
    pub fn mower_state(&self) -> MowerState {
        MowerState::normalize(self.work_state(), self.charge_state())
    }
}

/// Normalized view of one poll, ready for display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MowerSnapshot {
    /// Device identifier
    pub iot_id: String,
    /// Normalized state
    pub state: MowerState,
    /// Battery percentage
    pub battery_level: Option<u8>,
    /// Job progress percentage
    pub progress_percent: Option<u8>,
    /// Area mowed so far
    pub mowed_area: Option<f64>,
    /// Area of the current job
    pub total_area: Option<f64>,
    /// Active fault code
    pub error_code: Option<i64>,
    /// False when the device did not answer
    pub online: bool,
}

impl MowerSnapshot {
    /// Snapshot for a device that did not answer.
    pub fn offline(iot_id: impl Into<String>) -> Self {
        Self {
            iot_id: iot_id.into(),
            state: MowerState::Offline,
            battery_level: None,
            progress_percent: None,
            mowed_area: None,
            total_area: None,
            error_code: None,
            online: false,
        }
    }
}

impl From<&DeviceStatus> for MowerSnapshot {
    fn from(status: &DeviceStatus) -> Self {
        Self {
            iot_id: status.iot_id.clone(),
            state: status.mower_state(),
            battery_level: status.battery_level(),
            progress_percent: status.progress_percent(),
            mowed_area: status.mowed_area(),
            total_area: status.total_area(),
            error_code: status.error_code(),
            online: true,
        }
    }
}
