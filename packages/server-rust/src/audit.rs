//! Audit trail records.
//!
//! Audit records are ordinary log records tagged with `audit: true`, so any
//! backend can route or retain them separately.

use std::sync::Arc;

use logweave_core::{scope, ContextField, Redactor};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::logger::Logger;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditOutcome {
    Success,
    Failure,
    Denied,
}

impl AuditOutcome {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            AuditOutcome::Success => "success",
            AuditOutcome::Failure => "failure",
            AuditOutcome::Denied => "denied",
        }
    }
}

/// One auditable action.
#[derive(Debug, Clone, PartialEq)]
pub struct AuditEvent {
    pub action: String,
    pub resource: String,
    pub outcome: AuditOutcome,
    /// Defaults to the user id of the active context.
    pub actor: Option<String>,
    pub details: Option<Value>,
}

impl AuditEvent {
    #[must_use]
    pub fn new(action: impl Into<String>, resource: impl Into<String>, outcome: AuditOutcome) -> Self {
        Self {
            action: action.into(),
            resource: resource.into(),
            outcome,
            actor: None,
            details: None,
        }
    }

    #[must_use]
    pub fn actor(mut self, actor: impl Into<String>) -> Self {
        self.actor = Some(actor.into());
        self
    }

    #[must_use]
    pub fn details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }
}

pub struct AuditLogger {
    logger: Arc<dyn Logger>,
    redactor: Redactor,
}

impl AuditLogger {
    #[must_use]
    pub fn new(logger: Arc<dyn Logger>, redactor: Redactor) -> Self {
        Self { logger, redactor }
    }

    /// Logs `event`: success at info, failure and denial at warn.
    pub fn record(&self, event: AuditEvent) {
        let actor = event.actor.or_else(|| scope::get(ContextField::UserId));

        let mut fields = Map::new();
        fields.insert("audit".to_string(), Value::Bool(true));
        fields.insert("action".to_string(), Value::String(event.action.clone()));
        fields.insert("resource".to_string(), Value::String(event.resource.clone()));
        fields.insert("outcome".to_string(), Value::from(event.outcome.as_str()));
        fields.insert("actor".to_string(), actor.map_or(Value::Null, Value::String));
        if let Some(details) = &event.details {
            fields.insert("details".to_string(), self.redactor.redact(details));
        }

        let message = format!("audit: {} {}", event.action, event.resource);
        let meta = Some(Value::Object(fields));
        match event.outcome {
            AuditOutcome::Success => self.logger.info(&message, meta),
            AuditOutcome::Failure | AuditOutcome::Denied => self.logger.warn(&message, meta),
        }
    }
}

#[cfg(test)]
mod tests {
    use logweave_core::{ContextPatch, LogLevel};
    use serde_json::json;

    use super::*;
    use crate::logger::InMemoryLogger;

    fn audit() -> (AuditLogger, Arc<InMemoryLogger>) {
        let memory = Arc::new(InMemoryLogger::new(8).unwrap());
        (AuditLogger::new(memory.clone(), Redactor::default()), memory)
    }

    #[test]
    fn success_is_info_and_actor_comes_from_context() {
        let (audit, memory) = audit();
        scope::establish_sync(
            ContextPatch {
                user_id: Some("alice".to_string()),
                ..ContextPatch::default()
            },
            || audit.record(AuditEvent::new("delete", "invoice/7", AuditOutcome::Success)),
        );

        let record = &memory.records()[0];
        assert_eq!(record.level, LogLevel::Info);
        assert_eq!(record.fields["audit"], true);
        assert_eq!(record.fields["actor"], "alice");
        assert_eq!(record.fields["outcome"], "success");
        assert_eq!(record.message, "audit: delete invoice/7");
    }

    #[test]
    fn denied_is_warn_with_redacted_details() {
        let (audit, memory) = audit();
        audit.record(
            AuditEvent::new("login", "session", AuditOutcome::Denied)
                .actor("mallory")
                .details(json!({"password": "hunter2", "attempts": 3})),
        );

        let record = &memory.records()[0];
        assert_eq!(record.level, LogLevel::Warn);
        assert_eq!(record.fields["actor"], "mallory");
        assert_eq!(record.fields["details"]["password"], "[REDACTED]");
        assert_eq!(record.fields["details"]["attempts"], 3);
    }

    #[test]
    fn missing_actor_outside_scope_is_null() {
        let (audit, memory) = audit();
        audit.record(AuditEvent::new("export", "report", AuditOutcome::Failure));
        assert!(memory.records()[0].fields["actor"].is_null());
    }
}
