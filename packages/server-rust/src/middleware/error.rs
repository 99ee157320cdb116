//! Handler failures: the application error type, panic conversion, and the
//! stage that logs failures and renders the JSON error response.

use std::any::Any;

use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use logweave_core::{scope, ContextField, ErrorDetail};
use serde_json::{json, Value};

use super::{CapturedBody, PipelineState};

// ---------------------------------------------------------------------------
// RequestFailure
// ---------------------------------------------------------------------------

/// Failure description carried in response extensions from the point of
/// failure to [`error_handling`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestFailure {
    pub status: StatusCode,
    pub message: String,
    pub stack: Option<String>,
}

impl RequestFailure {
    fn into_response(self) -> Response {
        let mut response = self.status.into_response();
        response.extensions_mut().insert(self);
        response
    }
}

// ---------------------------------------------------------------------------
// AppError
// ---------------------------------------------------------------------------

/// Error type for handlers.
///
/// Any `anyhow`-compatible error converts with `?` as a 500. The response it
/// produces is only a marker; the body is rendered by [`error_handling`].
#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    error: anyhow::Error,
}

impl AppError {
    pub fn new(status: StatusCode, error: impl Into<anyhow::Error>) -> Self {
        Self {
            status,
            error: error.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, anyhow::Error::msg(message.into()))
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, anyhow::Error::msg(message.into()))
    }

    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, err)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        RequestFailure {
            status: self.status,
            message: self.error.to_string(),
            stack: Some(format!("{:?}", self.error)),
        }
        .into_response()
    }
}

// ---------------------------------------------------------------------------
// Panics
// ---------------------------------------------------------------------------

/// Converts a caught handler panic into a 500 failure.
pub fn panic_response(payload: Box<dyn Any + Send + 'static>) -> Response<Body> {
    let detail = if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    };
    RequestFailure {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        message: "handler panicked".to_string(),
        stack: Some(format!("panic: {detail}")),
    }
    .into_response()
}

// ---------------------------------------------------------------------------
// error_handling stage
// ---------------------------------------------------------------------------

/// Logs a captured failure with full detail, then replaces the response
/// with `{error, statusCode, traceId}` (plus `stack` outside production).
///
/// In production, server errors report only the status's canonical reason.
pub async fn error_handling(
    State(state): State<PipelineState>,
    request: Request,
    next: Next,
) -> Response {
    let method = request.method().to_string();
    let path = request.uri().path().to_owned();
    let body = request
        .extensions()
        .get::<CapturedBody>()
        .map(|CapturedBody(body)| body.clone());

    let response = next.run(request).await;
    let Some(failure) = response.extensions().get::<RequestFailure>().cloned() else {
        return response;
    };

    state.logger.error(
        "request failed",
        Some(json!({
            "statusCode": failure.status.as_u16(),
            "method": method,
            "path": path,
            "body": body,
        })),
        Some(ErrorDetail::new(
            failure.message.clone(),
            failure.stack.clone(),
        )),
    );

    let production = state.config.is_production();
    let message = if production && failure.status.is_server_error() {
        failure
            .status
            .canonical_reason()
            .unwrap_or("Internal Server Error")
            .to_string()
    } else {
        failure.message
    };
    let mut payload = json!({
        "error": message,
        "statusCode": failure.status.as_u16(),
        "traceId": scope::get(ContextField::TraceId),
    });
    if !production {
        if let (Some(stack), Value::Object(map)) = (failure.stack, &mut payload) {
            map.insert("stack".to_string(), Value::String(stack));
        }
    }

    (failure.status, Json(payload)).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn app_error_marks_response_with_failure() {
        let response = AppError::bad_request("missing field").into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let failure = response.extensions().get::<RequestFailure>().unwrap();
        assert_eq!(failure.message, "missing field");
        assert!(failure.stack.is_some());
    }

    #[test]
    fn foreign_errors_convert_to_500() {
        fn parse() -> Result<u32, AppError> {
            Ok("nope".parse::<u32>()?)
        }
        let err = parse().unwrap_err();
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn panic_payloads_are_described() {
        let response = panic_response(Box::new("boom"));
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let failure = response.extensions().get::<RequestFailure>().unwrap();
        assert_eq!(failure.stack.as_deref(), Some("panic: boom"));

        let response = panic_response(Box::new(String::from("owned")));
        let failure = response.extensions().get::<RequestFailure>().unwrap();
        assert_eq!(failure.stack.as_deref(), Some("panic: owned"));
    }
}
