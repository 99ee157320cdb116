use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::ids::{new_request_id, new_span_id, new_trace_id};

/// Correlation identifiers and free-form metadata for one logical unit of
/// work (typically one inbound request).
///
/// A snapshot of the active `Context` is attached to every log record. The
/// ambient, task-scoped copy is managed by [`crate::scope`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Context {
    /// Identifies the whole distributed operation.
    pub trace_id: String,
    /// Identifies one sub-operation within the trace.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub span_id: Option<String>,
    /// Identifies this unit of work.
    pub request_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
    /// Open metadata, mutable for the lifetime of the unit of work.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub metadata: Map<String, Value>,
}

impl Context {
    /// Builds a default context with fresh trace, span, and request ids.
    #[must_use]
    pub fn synthesize() -> Self {
        Self {
            trace_id: new_trace_id(),
            span_id: Some(new_span_id()),
            request_id: new_request_id(),
            user_id: None,
            session_id: None,
            correlation_id: None,
            metadata: Map::new(),
        }
    }

    /// Reads a single identifier field.
    #[must_use]
    pub fn get(&self, field: ContextField) -> Option<&str> {
        match field {
            ContextField::TraceId => Some(&self.trace_id),
            ContextField::SpanId => self.span_id.as_deref(),
            ContextField::RequestId => Some(&self.request_id),
            ContextField::UserId => self.user_id.as_deref(),
            ContextField::SessionId => self.session_id.as_deref(),
            ContextField::CorrelationId => self.correlation_id.as_deref(),
        }
    }

    /// Overwrites a single identifier field.
    pub fn set(&mut self, field: ContextField, value: String) {
        match field {
            ContextField::TraceId => self.trace_id = value,
            ContextField::SpanId => self.span_id = Some(value),
            ContextField::RequestId => self.request_id = value,
            ContextField::UserId => self.user_id = Some(value),
            ContextField::SessionId => self.session_id = Some(value),
            ContextField::CorrelationId => self.correlation_id = Some(value),
        }
    }

    /// Merges one key into the metadata map.
    pub fn add_metadata(&mut self, key: impl Into<String>, value: Value) {
        self.metadata.insert(key.into(), value);
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::synthesize()
    }
}

/// Names of the identifier fields of a [`Context`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContextField {
    TraceId,
    SpanId,
    RequestId,
    UserId,
    SessionId,
    CorrelationId,
}

impl ContextField {
    /// camelCase key as it appears in serialized records.
    #[must_use]
    pub fn key(self) -> &'static str {
        match self {
            ContextField::TraceId => "traceId",
            ContextField::SpanId => "spanId",
            ContextField::RequestId => "requestId",
            ContextField::UserId => "userId",
            ContextField::SessionId => "sessionId",
            ContextField::CorrelationId => "correlationId",
        }
    }
}

/// A possibly-partial set of context fields, used to establish a new scope.
///
/// Missing trace, span, and request ids are generated by [`into_context`].
///
/// [`into_context`]: ContextPatch::into_context
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ContextPatch {
    pub trace_id: Option<String>,
    pub span_id: Option<String>,
    pub request_id: Option<String>,
    pub user_id: Option<String>,
    pub session_id: Option<String>,
    pub correlation_id: Option<String>,
    pub metadata: Option<Map<String, Value>>,
}

impl ContextPatch {
    /// Completes the patch into a full context.
    #[must_use]
    pub fn into_context(self) -> Context {
        Context {
            trace_id: self.trace_id.unwrap_or_else(new_trace_id),
            span_id: Some(self.span_id.unwrap_or_else(new_span_id)),
            request_id: self.request_id.unwrap_or_else(new_request_id),
            user_id: self.user_id,
            session_id: self.session_id,
            correlation_id: self.correlation_id,
            metadata: self.metadata.unwrap_or_default(),
        }
    }
}
