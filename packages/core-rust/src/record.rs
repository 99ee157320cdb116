use std::error::Error;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::context::Context;
use crate::level::LogLevel;
use crate::scope;

/// Structured fields attached to a record.
pub type Fields = Map<String, Value>;

/// Error message and rendered cause chain captured with an error record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
}

impl ErrorDetail {
    #[must_use]
    pub fn new(message: impl Into<String>, stack: Option<String>) -> Self {
        Self {
            message: message.into(),
            stack,
        }
    }

    /// Captures `err`'s message and its `source()` chain.
    ///
    /// The stack is the top-level message followed by one `caused by:` line
    /// per source.
    #[must_use]
    pub fn from_error(err: &(dyn Error + 'static)) -> Self {
        let mut stack = err.to_string();
        let mut source = err.source();
        while let Some(cause) = source {
            stack.push_str("\n  caused by: ");
            stack.push_str(&cause.to_string());
            source = cause.source();
        }
        Self {
            message: err.to_string(),
            stack: Some(stack),
        }
    }
}

/// One emitted log line.
///
/// Built by [`LogRecord::capture`], which snapshots the ambient context at
/// the call site. Backends receive records by value and never modify them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogRecord {
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub message: String,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub fields: Fields,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorDetail>,
    pub context: Context,
}

impl LogRecord {
    /// Builds a record, reading the ambient context synchronously.
    #[must_use]
    pub fn capture(level: LogLevel, message: impl Into<String>, meta: Option<Value>) -> Self {
        Self {
            timestamp: Utc::now(),
            level,
            message: message.into(),
            fields: meta.map(into_fields).unwrap_or_default(),
            error: None,
            context: scope::current(),
        }
    }

    #[must_use]
    pub fn with_error(mut self, error: ErrorDetail) -> Self {
        self.error = Some(error);
        self
    }

    /// Serializes the record as a single JSON line (no trailing newline).
    ///
    /// Never fails: if serialization is impossible a minimal line carrying
    /// the level, message, and trace id is produced instead.
    #[must_use]
    pub fn to_json_line(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|err| {
            json!({
                "timestamp": self.timestamp.to_rfc3339(),
                "level": self.level,
                "message": self.message,
                "traceId": self.context.trace_id,
                "serializationError": err.to_string(),
            })
            .to_string()
        })
    }
}

/// Normalizes caller metadata into a field map.
///
/// Objects are used as-is, `null` yields no fields, and any other value is
/// kept under the `meta` key.
#[must_use]
pub fn into_fields(meta: Value) -> Fields {
    match meta {
        Value::Object(map) => map,
        Value::Null => Map::new(),
        other => {
            let mut map = Map::new();
            map.insert("meta".to_string(), other);
            map
        }
    }
}

/// Converts arbitrary caller data into metadata, best-effort.
///
/// A value that cannot be serialized becomes
/// `{"serializationError": "<reason>"}` rather than an error.
pub fn to_meta<T: Serialize + ?Sized>(value: &T) -> Value {
    serde_json::to_value(value)
        .unwrap_or_else(|err| json!({ "serializationError": err.to_string() }))
}
