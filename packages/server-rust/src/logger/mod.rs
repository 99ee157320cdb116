//! Logger capability set and its backends.
//!
//! Every backend implements [`Logger`]. Leveled calls capture the ambient
//! context synchronously at the call site (via [`LogRecord::capture`]) and
//! hand the finished record to [`Logger::write`], which never fails and
//! never blocks on I/O.

pub mod central;
pub mod console;
pub mod factory;
pub mod fanout;
pub mod file;
pub mod memory;
pub mod metered;
pub mod transport;

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use logweave_core::{scope, ContextPatch, ErrorDetail, Fields, LogLevel, LogRecord};
use serde::Serialize;
use serde_json::Value;

use crate::error::LoggerError;

pub use central::CentralLogger;
pub use console::ConsoleLogger;
pub use factory::{build_logging, LoggingSystem};
pub use fanout::FanoutLogger;
pub use file::FileLogger;
pub use memory::{InMemoryLogger, MemoryStats};
pub use metered::MeteredLogger;
pub use transport::{BatchTransport, LokiTransport};

// ---------------------------------------------------------------------------
// Logger trait
// ---------------------------------------------------------------------------

/// Uniform logging surface shared by every backend.
#[async_trait]
pub trait Logger: Send + Sync {
    /// Accepts a finished record. Must not block and must not panic.
    fn write(&self, record: LogRecord);

    /// Releases backend resources, flushing anything still buffered.
    /// Closing twice is a no-op.
    async fn close(&self) -> Result<(), LoggerError>;

    /// Whether records at `level` would be emitted.
    fn enabled(&self, _level: LogLevel) -> bool {
        true
    }

    fn log(&self, level: LogLevel, message: &str, meta: Option<Value>) {
        if self.enabled(level) {
            self.write(LogRecord::capture(level, message, meta));
        }
    }

    fn error(&self, message: &str, meta: Option<Value>, error: Option<ErrorDetail>) {
        if !self.enabled(LogLevel::Error) {
            return;
        }
        let record = LogRecord::capture(LogLevel::Error, message, meta);
        self.write(match error {
            Some(detail) => record.with_error(detail),
            None => record,
        });
    }

    fn warn(&self, message: &str, meta: Option<Value>) {
        self.log(LogLevel::Warn, message, meta);
    }

    fn info(&self, message: &str, meta: Option<Value>) {
        self.log(LogLevel::Info, message, meta);
    }

    fn http(&self, message: &str, meta: Option<Value>) {
        self.log(LogLevel::Http, message, meta);
    }

    fn debug(&self, message: &str, meta: Option<Value>) {
        self.log(LogLevel::Debug, message, meta);
    }
}

// ---------------------------------------------------------------------------
// LoggerExt
// ---------------------------------------------------------------------------

/// Conveniences available on a shared logger handle.
pub trait LoggerExt {
    /// Runs `fut` inside a new context scope built from `patch`.
    fn with_context<F>(&self, patch: ContextPatch, fut: F) -> impl Future<Output = F::Output>
    where
        F: Future;

    /// Returns a logger that adds `bindings` to every record it emits.
    fn child(&self, bindings: Fields) -> Arc<dyn Logger>;
}

impl LoggerExt for Arc<dyn Logger> {
    fn with_context<F>(&self, patch: ContextPatch, fut: F) -> impl Future<Output = F::Output>
    where
        F: Future,
    {
        scope::establish(patch, fut)
    }

    fn child(&self, bindings: Fields) -> Arc<dyn Logger> {
        Arc::new(ChildLogger::new(Arc::clone(self), bindings))
    }
}

// ---------------------------------------------------------------------------
// ChildLogger
// ---------------------------------------------------------------------------

/// Logger bound to a fixed set of fields.
///
/// Bound fields are merged into each record; keys supplied at the call site
/// win. Children nest, the innermost binding taking precedence.
pub struct ChildLogger {
    parent: Arc<dyn Logger>,
    bindings: Fields,
}

impl ChildLogger {
    #[must_use]
    pub fn new(parent: Arc<dyn Logger>, bindings: Fields) -> Self {
        Self { parent, bindings }
    }

    #[must_use]
    pub fn bindings(&self) -> &Fields {
        &self.bindings
    }
}

#[async_trait]
impl Logger for ChildLogger {
    fn write(&self, mut record: LogRecord) {
        for (key, value) in &self.bindings {
            if !record.fields.contains_key(key) {
                record.fields.insert(key.clone(), value.clone());
            }
        }
        self.parent.write(record);
    }

    /// The root logger owns the backend.
    async fn close(&self) -> Result<(), LoggerError> {
        Ok(())
    }

    fn enabled(&self, level: LogLevel) -> bool {
        self.parent.enabled(level)
    }
}

// ---------------------------------------------------------------------------
// ServiceInfo
// ---------------------------------------------------------------------------

/// Service identity stamped onto serialized records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceInfo {
    pub service: String,
    pub environment: String,
}

impl ServiceInfo {
    #[must_use]
    pub fn new(service: impl Into<String>, environment: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            environment: environment.into(),
        }
    }

    /// Serializes `record` as one JSON line carrying `service` and
    /// `environment` alongside the record's own keys.
    #[must_use]
    pub fn json_line(&self, record: &LogRecord) -> String {
        #[derive(Serialize)]
        struct Envelope<'a> {
            #[serde(flatten)]
            record: &'a LogRecord,
            service: &'a str,
            environment: &'a str,
        }

        serde_json::to_string(&Envelope {
            record,
            service: &self.service,
            environment: &self.environment,
        })
        .unwrap_or_else(|_| record.to_json_line())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use logweave_core::ContextField;
    use serde_json::json;

    use super::*;

    fn memory() -> Arc<InMemoryLogger> {
        Arc::new(InMemoryLogger::new(100).unwrap())
    }

    fn fields(value: Value) -> Fields {
        match value {
            Value::Object(map) => map,
            _ => Fields::new(),
        }
    }

    #[test]
    fn leveled_calls_capture_level_and_meta() {
        let memory = memory();
        memory.info("hello", Some(json!({"k": 1})));
        memory.error(
            "failed",
            None,
            Some(ErrorDetail::new("boom", Some("trace".to_string()))),
        );

        let records = memory.records();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].level, LogLevel::Info);
        assert_eq!(records[0].fields["k"], 1);
        assert_eq!(records[1].level, LogLevel::Error);
        assert_eq!(records[1].error.as_ref().unwrap().message, "boom");
    }

    #[tokio::test]
    async fn record_carries_ambient_context_across_await() {
        let memory = memory();
        let logger: Arc<dyn Logger> = memory.clone();

        let patch = ContextPatch {
            trace_id: Some("trace-abc".to_string()),
            user_id: Some("u-1".to_string()),
            ..ContextPatch::default()
        };
        logger
            .with_context(patch, async {
                tokio::task::yield_now().await;
                logger.info("inside", None);
                scope::set(ContextField::SessionId, "s-9");
                tokio::task::yield_now().await;
                logger.info("after set", None);
            })
            .await;

        let records = memory.records();
        assert_eq!(records[0].context.trace_id, "trace-abc");
        assert_eq!(records[0].context.user_id.as_deref(), Some("u-1"));
        assert_eq!(records[0].context.session_id, None);
        assert_eq!(records[1].context.session_id.as_deref(), Some("s-9"));
    }

    #[test]
    fn child_merges_bindings_and_call_site_wins() {
        let memory = memory();
        let root: Arc<dyn Logger> = memory.clone();
        let child = root.child(fields(json!({"component": "db", "shard": 1})));
        let grandchild = child.child(fields(json!({"shard": 2})));

        child.info("a", Some(json!({"component": "override"})));
        grandchild.info("b", None);

        let records = memory.records();
        assert_eq!(records[0].fields["component"], "override");
        assert_eq!(records[0].fields["shard"], 1);
        assert_eq!(records[1].fields["component"], "db");
        assert_eq!(records[1].fields["shard"], 2);
    }

    #[tokio::test]
    async fn child_close_does_not_close_parent() {
        let memory = memory();
        let root: Arc<dyn Logger> = memory.clone();
        let child = root.child(Fields::new());
        child.close().await.unwrap();
        root.info("still open", None);
        assert_eq!(memory.records().len(), 1);
    }

    #[test]
    fn json_line_includes_service_identity() {
        let info = ServiceInfo::new("billing", "staging");
        let record = LogRecord::capture(LogLevel::Warn, "careful", Some(json!({"n": 3})));
        let line: Value = serde_json::from_str(&info.json_line(&record)).unwrap();
        assert_eq!(line["service"], "billing");
        assert_eq!(line["environment"], "staging");
        assert_eq!(line["level"], "warn");
        assert_eq!(line["fields"]["n"], 3);
        assert!(line["context"]["traceId"].is_string());
    }
}
