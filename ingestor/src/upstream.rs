use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

use crate::errors::{Error, Result};
use crate::normalize::RawReading;

/// The shapes the telemetry endpoint is known to answer with.
#[derive(Debug, Clone, PartialEq)]
pub enum UpstreamPayload {
    /// A list of device records, flat or keyed by device id.
    Readings(Vec<RawReading>),
    /// The alert feed shape, `{"alerts": [...]}`.
    Alerts(Vec<Value>),
    /// Anything else; carries a short description of what arrived.
    Unrecognized(String),
}

impl UpstreamPayload {
    pub fn classify(value: Value) -> Self {
        match value {
            Value::Array(items) => {
                let mut readings = Vec::with_capacity(items.len());
                for item in items {
                    match unwrap_record(item) {
                        Ok(raw) => readings.push(raw),
                        Err(kind) => {
                            return UpstreamPayload::Unrecognized(format!(
                                "array containing {kind}"
                            ))
                        }
                    }
                }
                UpstreamPayload::Readings(readings)
            }
            Value::Object(mut object) => match object.remove("alerts") {
                Some(Value::Array(alerts)) => UpstreamPayload::Alerts(alerts),
                _ => UpstreamPayload::Unrecognized("object".to_string()),
            },
            other => UpstreamPayload::Unrecognized(kind_of(&other).to_string()),
        }
    }

    pub fn into_readings(self) -> Result<Vec<RawReading>> {
        match self {
            UpstreamPayload::Readings(readings) => Ok(readings),
            UpstreamPayload::Alerts(alerts) => Err(Error::UnexpectedPayload(format!(
                "alert feed with {} entries",
                alerts.len()
            ))),
            UpstreamPayload::Unrecognized(kind) => Err(Error::UnexpectedPayload(kind)),
        }
    }
}

// A keyed record is a single-entry object `{"DEV002": {...}}` whose value is
// the record itself. Everything else object-shaped is read as a flat record.
fn unwrap_record(item: Value) -> std::result::Result<RawReading, &'static str> {
    let object = match item {
        Value::Object(object) => object,
        other => return Err(kind_of(&other)),
    };

    let is_keyed = object.len() == 1
        && !object.contains_key("dId")
        && object.values().all(Value::is_object);

    let record = if is_keyed {
        object.into_iter().next().map(|(_, inner)| inner)
    } else {
        Some(Value::Object(object))
    };

    record
        .and_then(|record| serde_json::from_value(record).ok())
        .ok_or("undecodable record")
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Where raw telemetry comes from.
#[async_trait]
pub trait TelemetrySource: Send + Sync {
    async fn fetch(&self) -> Result<UpstreamPayload>;
}

/// Polls the board hub over HTTP.
pub struct HttpSource {
    client: reqwest::Client,
    url: String,
}

impl HttpSource {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl TelemetrySource for HttpSource {
    async fn fetch(&self) -> Result<UpstreamPayload> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await?
            .error_for_status()?;
        let body = response.bytes().await?;
        debug!("Fetched {} bytes from {}", body.len(), self.url);

        let value: Value = serde_json::from_slice(&body)?;
        Ok(UpstreamPayload::classify(value))
    }
}
