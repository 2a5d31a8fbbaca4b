use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::model::{compact_timestamp, Reading};

const DEFAULT_POWER: i64 = 0;
const DEFAULT_SWITCH: i64 = 0;
const DEFAULT_LIGHT: f64 = 0.0;
const DEFAULT_CURRENT: f64 = 0.0;
const DEFAULT_BATTERY: f64 = 0.0;

/// A device record exactly as the upstream endpoint delivers it.
///
/// Every field is optional and loosely typed; boards in the field disagree
/// about what they send.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawReading {
    #[serde(rename = "dId", default, skip_serializing_if = "Option::is_none")]
    pub device_id: Option<Value>,
    #[serde(rename = "p", default, skip_serializing_if = "Option::is_none")]
    pub power: Option<Value>,
    #[serde(rename = "s", default, skip_serializing_if = "Option::is_none")]
    pub switch_state: Option<Value>,
    #[serde(rename = "l", default, skip_serializing_if = "Option::is_none")]
    pub light: Option<Value>,
    #[serde(rename = "t", default, skip_serializing_if = "Option::is_none")]
    pub time_or_temp: Option<Value>,
    #[serde(rename = "i", default, skip_serializing_if = "Option::is_none")]
    pub current: Option<Value>,
    #[serde(rename = "b", default, skip_serializing_if = "Option::is_none")]
    pub battery: Option<Value>,
    #[serde(rename = "e", default, skip_serializing_if = "Option::is_none")]
    pub extra: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<Value>,
}

/// Produces a canonical reading from a raw record.
///
/// Missing or null fields take their defaults and values that cannot be cast
/// fall back to the default as well, so no record is ever rejected. The
/// timestamp is synthesized from `received_at` only when the record has none.
pub fn normalize(raw: &RawReading, received_at: DateTime<Utc>) -> Reading {
    Reading {
        device_id: as_text(raw.device_id.as_ref()).unwrap_or_default(),
        power: as_integer(raw.power.as_ref()).unwrap_or(DEFAULT_POWER),
        switch_state: as_integer(raw.switch_state.as_ref()).unwrap_or(DEFAULT_SWITCH),
        light: as_number(raw.light.as_ref()).unwrap_or(DEFAULT_LIGHT),
        time_or_temp: as_text(raw.time_or_temp.as_ref()),
        current: as_number(raw.current.as_ref()).unwrap_or(DEFAULT_CURRENT),
        battery: as_number(raw.battery.as_ref()).unwrap_or(DEFAULT_BATTERY),
        extra: as_text(raw.extra.as_ref()),
        timestamp: as_text(raw.timestamp.as_ref())
            .filter(|ts| !ts.is_empty())
            .unwrap_or_else(|| compact_timestamp(received_at)),
    }
}

fn as_number(value: Option<&Value>) -> Option<f64> {
    match value? {
        Value::Number(n) => n.as_f64(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
        _ => None,
    }
}

fn as_integer(value: Option<&Value>) -> Option<i64> {
    match value? {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
        Value::Bool(b) => Some(i64::from(*b)),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}

fn as_text(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
