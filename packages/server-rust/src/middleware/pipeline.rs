//! Composition of the request stages into one layer stack.

use axum::middleware::from_fn_with_state;
use axum::Router;
use tower::ServiceBuilder;
use tower_http::catch_panic::CatchPanicLayer;

use super::{
    error_handling, panic_response, request_body_logging, request_performance, request_tracing,
    user_context, PipelineState,
};

/// Wraps every route of `router` in the request pipeline.
///
/// Layer order (outermost to innermost):
/// 1. `request_tracing` -- context scope, entry/exit logs, response headers
/// 2. `request_body_logging` -- redacted body of POST/PUT/PATCH
/// 3. `request_performance` -- duration, memory delta, slow-request warning
/// 4. `user_context` -- acting user into the context
/// 5. `error_handling` -- logs failures, renders the JSON error body
/// 6. `CatchPanicLayer` -- handler panics become 500 failures
///
/// Apply it after all routes are added; routes added later are not wrapped.
pub fn apply_request_pipeline<S>(router: Router<S>, state: PipelineState) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    router.layer(
        ServiceBuilder::new()
            .layer(from_fn_with_state(state.clone(), request_tracing))
            .layer(from_fn_with_state(state.clone(), request_body_logging))
            .layer(from_fn_with_state(state.clone(), request_performance))
            .layer(from_fn_with_state(state.clone(), user_context))
            .layer(from_fn_with_state(state, error_handling))
            .layer(CatchPanicLayer::custom(panic_response)),
    )
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
