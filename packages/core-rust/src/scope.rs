//! Ambient context store.
//!
//! Associates a [`Context`] with a causal chain of asynchronous work rather
//! than with a thread. A scope is established around a future with
//! [`establish`]; every poll of that future (and of everything it awaits)
//! sees the same shared cell, across any number of suspension points and
//! regardless of which worker thread polls it.
//!
//! Work handed to another task does not inherit the scope automatically:
//! wrap it with [`propagate`] (or use [`spawn`]) to carry the cell along.
//!
//! None of the accessors fail. Outside any scope, reads observe a freshly
//! synthesized default context and writes are discarded.

use std::future::Future;
use std::sync::Arc;

use parking_lot::RwLock;
use serde_json::Value;
use tokio::task::JoinHandle;

use crate::context::{Context, ContextField, ContextPatch};

type ContextCell = Arc<RwLock<Context>>;

tokio::task_local! {
    static ACTIVE_CONTEXT: ContextCell;
}

/// Runs `fut` with a new context built from `patch`.
///
/// Missing trace, span, and request ids are generated. The future's output
/// (including any `Err`) is returned unchanged.
pub async fn establish<F>(patch: ContextPatch, fut: F) -> F::Output
where
    F: Future,
{
    establish_with(patch.into_context(), fut).await
}

/// Runs `fut` with `context` active.
pub async fn establish_with<F>(context: Context, fut: F) -> F::Output
where
    F: Future,
{
    ACTIVE_CONTEXT
        .scope(Arc::new(RwLock::new(context)), fut)
        .await
}

/// Runs the synchronous closure `f` with a new context built from `patch`.
pub fn establish_sync<R>(patch: ContextPatch, f: impl FnOnce() -> R) -> R {
    ACTIVE_CONTEXT.sync_scope(Arc::new(RwLock::new(patch.into_context())), f)
}

/// Runs `fut` in a nested scope holding a copy of the current context with a
/// fresh span id. Writes made inside the fork stay inside it.
pub async fn fork_span<F>(fut: F) -> F::Output
where
    F: Future,
{
    let mut forked = current();
    forked.span_id = Some(crate::ids::new_span_id());
    establish_with(forked, fut).await
}

/// Returns `true` if a context scope is active on the current task.
#[must_use]
pub fn is_active() -> bool {
    ACTIVE_CONTEXT.try_with(|_| ()).is_ok()
}

/// Snapshot of the active context, or a freshly synthesized default.
#[must_use]
pub fn current() -> Context {
    ACTIVE_CONTEXT
        .try_with(|cell| cell.read().clone())
        .unwrap_or_else(|_| Context::synthesize())
}

/// Reads one identifier field of the active context.
#[must_use]
pub fn get(field: ContextField) -> Option<String> {
    ACTIVE_CONTEXT
        .try_with(|cell| cell.read().get(field).map(str::to_owned))
        .unwrap_or_else(|_| Context::synthesize().get(field).map(str::to_owned))
}

/// Writes one identifier field of the active context.
///
/// Visible to everything that later runs in the same scope. No-op outside a
/// scope.
pub fn set(field: ContextField, value: impl Into<String>) {
    let value = value.into();
    let _ = ACTIVE_CONTEXT.try_with(|cell| cell.write().set(field, value));
}

/// Merges one key into the active context's metadata.
pub fn add_metadata(key: impl Into<String>, value: Value) {
    let key = key.into();
    let _ = ACTIVE_CONTEXT.try_with(|cell| cell.write().add_metadata(key, value));
}

/// Binds the scope active *now* to `fut`.
///
/// The cell is captured when `propagate` is called, not when the returned
/// future is first polled, so the result can be handed to another task.
/// Mutations made by `fut` are shared with the originating scope.
pub fn propagate<F>(fut: F) -> impl Future<Output = F::Output>
where
    F: Future,
{
    let cell = ACTIVE_CONTEXT.try_with(Arc::clone).ok();
    async move {
        match cell {
            Some(cell) => ACTIVE_CONTEXT.scope(cell, fut).await,
            None => fut.await,
        }
    }
}

/// Spawns `fut` on the tokio runtime inside the current scope.
pub fn spawn<F>(fut: F) -> JoinHandle<F::Output>
where
    F: Future + Send + 'static,
    F::Output: Send + 'static,
{
    tokio::spawn(propagate(fut))
}
