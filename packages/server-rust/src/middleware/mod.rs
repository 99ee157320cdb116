//! Request middleware chain.
//!
//! Stages run in this order on the way in (and reverse on the way out):
//!
//! 1. [`request_tracing`] establishes the request's context scope and logs
//!    entry and exit.
//! 2. [`request_body_logging`] logs a redacted copy of write-request bodies.
//! 3. [`request_performance`] measures duration and memory delta.
//! 4. [`user_context`] resolves the acting user into the context.
//! 5. [`error_handling`] turns handler failures and panics into logged,
//!    sanitized JSON responses.
//!
//! [`apply_request_pipeline`] installs all of them on a router.

pub mod body;
pub mod error;
pub mod performance;
pub mod pipeline;
pub mod request_trace;
pub mod user;

use std::sync::Arc;

use axum::extract::Request;
use axum::http::HeaderMap;
use logweave_core::{Redactor, DEFAULT_SENSITIVE_FIELDS};
use serde::Deserialize;

use crate::config::is_production;
use crate::logger::Logger;

pub use body::{request_body_logging, CapturedBody};
pub use error::{error_handling, panic_response, AppError, RequestFailure};
pub use performance::request_performance;
pub use pipeline::apply_request_pipeline;
pub use request_trace::request_tracing;
pub use user::user_context;

// ---------------------------------------------------------------------------
// Header names
// ---------------------------------------------------------------------------

pub const X_TRACE_ID: &str = "x-trace-id";
pub const X_SPAN_ID: &str = "x-span-id";
pub const X_REQUEST_ID: &str = "x-request-id";
pub const X_USER_ID: &str = "x-user-id";
pub const X_SESSION_ID: &str = "x-session-id";
pub const X_CORRELATION_ID: &str = "x-correlation-id";
pub const X_FORWARDED_FOR: &str = "x-forwarded-for";

/// Trimmed, non-empty UTF-8 value of header `name`.
pub(crate) fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_owned)
}

// ---------------------------------------------------------------------------
// PipelineConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Key fragments whose values are redacted from logged bodies.
    pub sensitive_fields: Vec<String>,
    /// Requests slower than this are logged at warn.
    pub slow_request_threshold_ms: u64,
    /// Bodies larger than this are logged as a size placeholder.
    pub max_body_log_bytes: usize,
    /// Environment tag; production responses omit stacks.
    pub environment: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            sensitive_fields: DEFAULT_SENSITIVE_FIELDS
                .iter()
                .map(|f| (*f).to_string())
                .collect(),
            slow_request_threshold_ms: 1_000,
            max_body_log_bytes: 64 * 1024,
            environment: "development".to_string(),
        }
    }
}

impl PipelineConfig {
    #[must_use]
    pub fn is_production(&self) -> bool {
        is_production(&self.environment)
    }
}

// ---------------------------------------------------------------------------
// PipelineState
// ---------------------------------------------------------------------------

/// Resolves the acting user from a request, e.g. from verified auth claims.
pub type UserExtractor = Arc<dyn Fn(&Request) -> Option<String> + Send + Sync>;

/// State shared by every stage.
#[derive(Clone)]
pub struct PipelineState {
    pub logger: Arc<dyn Logger>,
    pub config: Arc<PipelineConfig>,
    pub redactor: Arc<Redactor>,
    pub user_extractor: Option<UserExtractor>,
}

impl PipelineState {
    #[must_use]
    pub fn new(logger: Arc<dyn Logger>, config: PipelineConfig) -> Self {
        let redactor = Redactor::new(config.sensitive_fields.iter().map(String::as_str));
        Self {
            logger,
            config: Arc::new(config),
            redactor: Arc::new(redactor),
            user_extractor: None,
        }
    }

    #[must_use]
    pub fn with_user_extractor(
        mut self,
        extractor: impl Fn(&Request) -> Option<String> + Send + Sync + 'static,
    ) -> Self {
        self.user_extractor = Some(Arc::new(extractor));
        self
    }
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    #[test]
    fn header_value_trims_and_skips_empty() {
        let mut headers = HeaderMap::new();
        headers.insert(X_TRACE_ID, HeaderValue::from_static("  abc "));
        headers.insert(X_USER_ID, HeaderValue::from_static("   "));
        assert_eq!(header_value(&headers, X_TRACE_ID).as_deref(), Some("abc"));
        assert_eq!(header_value(&headers, X_USER_ID), None);
        assert_eq!(header_value(&headers, X_SESSION_ID), None);
    }

    #[test]
    fn default_config_redacts_default_fields() {
        let config = PipelineConfig::default();
        assert!(!config.is_production());
        assert_eq!(config.slow_request_threshold_ms, 1_000);
        let redactor = Redactor::new(config.sensitive_fields.iter().map(String::as_str));
        assert!(redactor.is_sensitive("userPassword"));
        assert!(redactor.is_sensitive("APIKEY"));
    }
}
