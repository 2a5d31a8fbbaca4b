use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Width of the compact `YYYYMMDDHHMMSS` timestamp.
pub const COMPACT_TIMESTAMP_LEN: usize = 14;

/// One normalized telemetry sample from a board.
///
/// Field names on the wire are the short keys the boards report (`dId`, `p`,
/// `s`, ...), which the dashboard front-end reads directly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Reading {
    #[serde(rename = "dId")]
    pub device_id: String,
    #[serde(rename = "p")]
    pub power: i64,
    #[serde(rename = "s")]
    pub switch_state: i64,
    #[serde(rename = "l")]
    pub light: f64,
    /// Either a clock time (`HH:MM:SS`) or a temperature.
    #[serde(rename = "t")]
    pub time_or_temp: Option<String>,
    #[serde(rename = "i")]
    #[sqlx(rename = "current_amps")]
    pub current: f64,
    #[serde(rename = "b")]
    pub battery: f64,
    #[serde(rename = "e")]
    pub extra: Option<String>,
    #[sqlx(rename = "ts")]
    pub timestamp: String,
}

/// A reading as persisted, carrying the store-assigned record id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct StoredReading {
    #[serde(rename = "_id")]
    pub id: i64,
    #[serde(flatten)]
    #[sqlx(flatten)]
    pub reading: Reading,
}

/// How the polymorphic `t` field should be read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeOrTemp<'a> {
    Clock(&'a str),
    Temperature(&'a str),
}

impl Reading {
    pub fn time_or_temp(&self) -> Option<TimeOrTemp<'_>> {
        self.time_or_temp.as_deref().map(|value| {
            if value.contains(':') {
                TimeOrTemp::Clock(value)
            } else {
                TimeOrTemp::Temperature(value)
            }
        })
    }
}

/// Formats an instant as `YYYYMMDDHHMMSS`.
pub fn compact_timestamp(at: DateTime<Utc>) -> String {
    at.format("%Y%m%d%H%M%S").to_string()
}

/// Renders a compact timestamp as `YYYY-MM-DD HH:MM:SS`.
///
/// Anything shorter than the compact width is returned unchanged.
pub fn display_timestamp(compact: &str) -> String {
    match (
        compact.get(0..4),
        compact.get(4..6),
        compact.get(6..8),
        compact.get(8..10),
        compact.get(10..12),
        compact.get(12..COMPACT_TIMESTAMP_LEN),
    ) {
        (Some(year), Some(month), Some(day), Some(hour), Some(minute), Some(second)) => {
            format!("{year}-{month}-{day} {hour}:{minute}:{second}")
        }
        _ => compact.to_string(),
    }
}
