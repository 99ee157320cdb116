//! Outermost stage: context scope, entry and exit logs, correlation headers.

use std::net::SocketAddr;

use axum::extract::{ConnectInfo, Request, State};
use axum::http::{HeaderMap, HeaderName, HeaderValue};
use axum::middleware::Next;
use axum::response::Response;
use logweave_core::{scope, ContextPatch};
use serde_json::{json, Map, Value};
use tokio::time::Instant;

use super::{
    header_value, PipelineState, X_CORRELATION_ID, X_FORWARDED_FOR, X_REQUEST_ID,
    X_SESSION_ID, X_SPAN_ID, X_TRACE_ID, X_USER_ID,
};
use crate::timer::duration_ms;

/// Context patch from the inbound correlation headers.
///
/// An inbound `x-span-id` names the caller's span; it is kept as
/// `parentSpanId` metadata while this request gets a span of its own.
#[must_use]
pub fn patch_from_headers(headers: &HeaderMap) -> ContextPatch {
    let metadata = header_value(headers, X_SPAN_ID).map(|parent| {
        let mut map = Map::new();
        map.insert("parentSpanId".to_string(), Value::String(parent));
        map
    });
    ContextPatch {
        trace_id: header_value(headers, X_TRACE_ID),
        span_id: None,
        request_id: header_value(headers, X_REQUEST_ID),
        user_id: header_value(headers, X_USER_ID),
        session_id: header_value(headers, X_SESSION_ID),
        correlation_id: header_value(headers, X_CORRELATION_ID),
        metadata,
    }
}

/// Peer address from `ConnectInfo`, else the first `x-forwarded-for` hop.
fn remote_addr(request: &Request) -> Option<String> {
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.to_string())
        .or_else(|| {
            header_value(request.headers(), X_FORWARDED_FOR)
                .and_then(|v| v.split(',').next().map(|hop| hop.trim().to_owned()))
        })
}

fn set_header(headers: &mut HeaderMap, name: &'static str, value: &str) {
    if let Ok(value) = HeaderValue::from_str(value) {
        headers.insert(HeaderName::from_static(name), value);
    }
}

pub async fn request_tracing(
    State(state): State<PipelineState>,
    request: Request,
    next: Next,
) -> Response {
    let context = patch_from_headers(request.headers()).into_context();
    let trace_id = context.trace_id.clone();
    let span_id = context.span_id.clone().unwrap_or_default();
    let request_id = context.request_id.clone();

    let method = request.method().to_string();
    let path = request.uri().path().to_owned();
    let query = request.uri().query().map(str::to_owned);
    let user_agent = request
        .headers()
        .get(axum::http::header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);
    let remote = remote_addr(&request);

    scope::establish_with(context, async move {
        let started = Instant::now();
        state.logger.http(
            "incoming request",
            Some(json!({
                "method": method,
                "path": path,
                "query": query,
                "remoteAddr": remote,
                "userAgent": user_agent,
            })),
        );

        let mut response = next.run(request).await;

        state.logger.http(
            "request completed",
            Some(json!({
                "method": method,
                "path": path,
                "statusCode": response.status().as_u16(),
                "durationMs": duration_ms(started.elapsed()),
                "remoteAddr": remote,
                "userAgent": user_agent,
            })),
        );

        let headers = response.headers_mut();
        set_header(headers, X_TRACE_ID, &trace_id);
        set_header(headers, X_SPAN_ID, &span_id);
        set_header(headers, X_REQUEST_ID, &request_id);
        response
    })
    .await
}
