use chrono::{DateTime, SecondsFormat, Utc};
use serde::Deserialize;
use serde_json::{Map, Value};

pub const TIMESTAMP_FIELD: &str = "timestamp";

/// A schema-less structured log record
///
/// Only requirement is that the payload is a JSON object; field values are kept as-is.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(transparent)]
pub struct LogRecord(Map<String, Value>);

impl LogRecord {
    /// Decode a request body. Anything but a JSON object is rejected.
    pub fn decode(body: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(body)
    }

    /// Set `timestamp` to `now` unless the caller already supplied one.
    ///
    /// An existing value is never validated or normalized. Returns true if the field was added.
    pub fn ensure_timestamp(&mut self, now: DateTime<Utc>) -> bool {
        if self.0.contains_key(TIMESTAMP_FIELD) {
            return false;
        }
        self.0
            .insert(TIMESTAMP_FIELD.to_string(), Value::String(rfc3339(now)));
        true
    }

    pub fn to_json(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(&self.0)
    }

    #[cfg(test)]
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    pub fn field_count(&self) -> usize {
        self.0.len()
    }
}

/// RFC-3339 with second precision and a `Z` suffix, e.g. `2026-10-17T08:30:00Z`
pub fn rfc3339(time: DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Secs, true)
}
