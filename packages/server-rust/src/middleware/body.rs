//! Request body logging for write methods.

use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::header::CONTENT_LENGTH;
use axum::http::{Method, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use logweave_core::Redactor;
use serde_json::{json, Value};

use super::PipelineState;

/// Redacted copy of the request body, left in request extensions for the
/// error stage.
#[derive(Debug, Clone, PartialEq)]
pub struct CapturedBody(pub Value);

fn logs_body(method: &Method) -> bool {
    matches!(*method, Method::POST | Method::PUT | Method::PATCH)
}

/// Loggable form of `bytes`: the redacted JSON document, or a placeholder
/// for oversized and non-JSON bodies.
#[must_use]
pub fn describe_body(bytes: &[u8], redactor: &Redactor, max_bytes: usize) -> Value {
    if bytes.len() > max_bytes {
        return omitted(bytes.len());
    }
    match serde_json::from_slice::<Value>(bytes) {
        Ok(document) => redactor.redact(&document),
        Err(_) => Value::String(format!("[non-JSON body: {} bytes]", bytes.len())),
    }
}

fn omitted(len: usize) -> Value {
    Value::String(format!("[body omitted: {len} bytes]"))
}

fn declared_length(request: &Request) -> Option<usize> {
    request
        .headers()
        .get(CONTENT_LENGTH)?
        .to_str()
        .ok()?
        .parse()
        .ok()
}

fn log_body(state: &PipelineState, method: &Method, path: &str, len: usize, captured: &Value) {
    state.logger.debug(
        "request body",
        Some(json!({
            "method": method.as_str(),
            "path": path,
            "bytes": len,
            "body": captured,
        })),
    );
}

/// Logs the redacted body of write requests and forwards it unchanged.
///
/// A body whose `Content-Length` exceeds `max_body_log_bytes` is not
/// buffered: only its size is logged and the stream passes through.
pub async fn request_body_logging(
    State(state): State<PipelineState>,
    mut request: Request,
    next: Next,
) -> Response {
    if !logs_body(request.method()) {
        return next.run(request).await;
    }

    if let Some(len) = declared_length(&request)
        .filter(|&len| len > state.config.max_body_log_bytes)
    {
        let captured = omitted(len);
        log_body(&state, request.method(), request.uri().path(), len, &captured);
        request.extensions_mut().insert(CapturedBody(captured));
        return next.run(request).await;
    }

    let (mut parts, body) = request.into_parts();
    let bytes: Bytes = match axum::body::to_bytes(body, usize::MAX).await {
        Ok(bytes) => bytes,
        Err(err) => {
            state.logger.warn(
                "failed to read request body",
                Some(json!({ "path": parts.uri.path(), "error": err.to_string() })),
            );
            return StatusCode::BAD_REQUEST.into_response();
        }
    };

    if !bytes.is_empty() {
        let captured = describe_body(&bytes, &state.redactor, state.config.max_body_log_bytes);
        log_body(&state, &parts.method, parts.uri.path(), bytes.len(), &captured);
        parts.extensions.insert(CapturedBody(captured));
    }

    next.run(Request::from_parts(parts, Body::from(bytes))).await
}
