//! Acting-user resolution.

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;
use logweave_core::{scope, ContextField};

use super::{header_value, PipelineState, X_USER_ID};

/// Writes the acting user into the active context.
///
/// The configured extractor is consulted first, then the `x-user-id`
/// header. With neither, the context is left untouched.
pub async fn user_context(
    State(state): State<PipelineState>,
    request: Request,
    next: Next,
) -> Response {
    let user = state
        .user_extractor
        .as_ref()
        .and_then(|extract| extract(&request))
        .or_else(|| header_value(request.headers(), X_USER_ID));
    if let Some(user) = user {
        scope::set(ContextField::UserId, user);
    }
    next.run(request).await
}
