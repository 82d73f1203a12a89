//! Core types for Fieldwatch

use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Panel identifier - cheaply cloneable
#[derive(Clone, Debug, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub struct PanelKey(Arc<str>);

impl PanelKey {
    pub fn new(s: impl Into<String>) -> Self {
        Self(Arc::from(s.into()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for PanelKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for PanelKey {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<&str> for PanelKey {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// One observed telemetry value.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TelemetrySample {
    pub value: f64,
    /// Client-observed arrival time in epoch milliseconds.
    pub timestamp_ms: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl TelemetrySample {
    pub fn new(value: f64, timestamp_ms: i64) -> Self {
        Self {
            value,
            timestamp_ms,
            label: None,
        }
    }

    /// Sample stamped with the current wall clock.
    pub fn observed(value: f64, label: Option<String>) -> Self {
        Self {
            value,
            timestamp_ms: Utc::now().timestamp_millis(),
            label,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}

/// Connection flag driven by the outcome of the latest request.
///
/// There is no retry state: every poll is an independent attempt, and the flag
/// only reflects the most recent one.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ConnectionState {
    pub connected: bool,
    pub last_success_at: Option<DateTime<Utc>>,
}

impl ConnectionState {
    pub fn record_success(&mut self, at: DateTime<Utc>) {
        self.connected = true;
        self.last_success_at = Some(at);
    }

    pub fn record_failure(&mut self) {
        self.connected = false;
    }
}

/// A parsed status response: the display value plus the opaque body.
#[derive(Clone, Debug, PartialEq)]
pub struct Reading {
    pub value: f64,
    pub label: Option<String>,
    pub extra: serde_json::Value,
}

impl Reading {
    /// Extract a reading from a status body.
    ///
    /// `field` and `label_field` are dotted paths (`metrics.coherence`). The
    /// value must be a JSON number; a missing or non-numeric field is a schema
    /// mismatch and reported as a parse error.
    pub fn extract(body: serde_json::Value, field: &str, label_field: Option<&str>) -> Result<Self> {
        if !body.is_object() {
            return Err(Error::parse(format!("expected JSON object, got {}", json_kind(&body))));
        }
        let value = lookup(&body, field)
            .ok_or_else(|| Error::parse(format!("missing field '{}'", field)))?
            .as_f64()
            .ok_or_else(|| Error::parse(format!("field '{}' is not a number", field)))?;
        let label = label_field
            .and_then(|path| lookup(&body, path))
            .and_then(|v| v.as_str())
            .map(str::to_string);
        Ok(Self {
            value,
            label,
            extra: body,
        })
    }
}

/// Resolve a dotted path inside a JSON value.
pub fn lookup<'a>(value: &'a serde_json::Value, path: &str) -> Option<&'a serde_json::Value> {
    path.split('.')
        .filter(|seg| !seg.is_empty())
        .try_fold(value, |cur, seg| cur.get(seg))
}

/// Shallow-merge `incoming` object keys into `target`.
///
/// Non-object values replace the target wholesale.
pub fn merge_json(target: &mut serde_json::Value, incoming: serde_json::Value) {
    match (target.as_object_mut(), incoming) {
        (Some(existing), serde_json::Value::Object(map)) => {
            for (k, v) in map {
                existing.insert(k, v);
            }
        }
        (_, other) => *target = other,
    }
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "bool",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}
