//! Console backend: hands records to the `tracing` formatting engine.

use async_trait::async_trait;
use logweave_core::{LogLevel, LogRecord};
use serde_json::Value;
use tracing::Level;

use super::{Logger, ServiceInfo};
use crate::error::LoggerError;

/// Target of every event emitted by [`ConsoleLogger`].
pub const CONSOLE_TARGET: &str = "logweave";

/// Maps a log level onto the `tracing` level used for console output.
///
/// `tracing` has no `http` level, so `http` and `debug` shift down one step.
#[must_use]
pub fn tracing_level(level: LogLevel) -> Level {
    match level {
        LogLevel::Error => Level::ERROR,
        LogLevel::Warn => Level::WARN,
        LogLevel::Info => Level::INFO,
        LogLevel::Http => Level::DEBUG,
        LogLevel::Debug => Level::TRACE,
    }
}

pub struct ConsoleLogger {
    service: ServiceInfo,
}

impl ConsoleLogger {
    #[must_use]
    pub fn new(service: ServiceInfo) -> Self {
        Self { service }
    }
}

macro_rules! emit {
    ($level:expr, $svc:expr, $r:expr, $fields:expr, $metadata:expr) => {
        tracing::event!(
            target: CONSOLE_TARGET,
            $level,
            service = %$svc.service,
            environment = %$svc.environment,
            log_level = $r.level.as_str(),
            trace_id = %$r.context.trace_id,
            span_id = $r.context.span_id.as_deref(),
            request_id = %$r.context.request_id,
            user_id = $r.context.user_id.as_deref(),
            session_id = $r.context.session_id.as_deref(),
            correlation_id = $r.context.correlation_id.as_deref(),
            fields = $fields,
            metadata = $metadata,
            error = $r.error.as_ref().map(|e| e.message.as_str()),
            stack = $r.error.as_ref().and_then(|e| e.stack.as_deref()),
            "{}",
            $r.message
        )
    };
}

#[async_trait]
impl Logger for ConsoleLogger {
    fn write(&self, record: LogRecord) {
        let fields = (!record.fields.is_empty())
            .then(|| Value::Object(record.fields.clone()).to_string());
        let metadata = (!record.context.metadata.is_empty())
            .then(|| Value::Object(record.context.metadata.clone()).to_string());
        let fields = fields.as_deref();
        let metadata = metadata.as_deref();
        let svc = &self.service;

        // Arms must agree with `tracing_level`.
        match record.level {
            LogLevel::Error => emit!(Level::ERROR, svc, record, fields, metadata),
            LogLevel::Warn => emit!(Level::WARN, svc, record, fields, metadata),
            LogLevel::Info => emit!(Level::INFO, svc, record, fields, metadata),
            LogLevel::Http => emit!(Level::DEBUG, svc, record, fields, metadata),
            LogLevel::Debug => emit!(Level::TRACE, svc, record, fields, metadata),
        }
    }

    async fn close(&self) -> Result<(), LoggerError> {
        Ok(())
    }
}
