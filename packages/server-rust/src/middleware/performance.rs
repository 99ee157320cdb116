//! Request duration and memory measurement.

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;
use serde_json::json;
use tokio::time::Instant;

use super::PipelineState;
use crate::process::resident_memory_bytes;
use crate::timer::duration_ms;

/// Signed change from `before` to `after`, saturating at the `i64` range.
#[must_use]
pub fn memory_delta(before: u64, after: u64) -> i64 {
    if after >= before {
        i64::try_from(after - before).unwrap_or(i64::MAX)
    } else {
        i64::try_from(before - after).map_or(i64::MIN, |d| -d)
    }
}

pub async fn request_performance(
    State(state): State<PipelineState>,
    request: Request,
    next: Next,
) -> Response {
    let method = request.method().to_string();
    let path = request.uri().path().to_owned();
    let memory_before = resident_memory_bytes();
    let started = Instant::now();

    let response = next.run(request).await;

    let elapsed_ms = duration_ms(started.elapsed());
    let delta = memory_before
        .zip(resident_memory_bytes())
        .map(|(before, after)| memory_delta(before, after));
    let meta = json!({
        "method": method,
        "path": path,
        "statusCode": response.status().as_u16(),
        "durationMs": elapsed_ms,
        "memoryDeltaBytes": delta,
    });

    if elapsed_ms > state.config.slow_request_threshold_ms {
        state.logger.warn("slow request", Some(meta.clone()));
    }
    state.logger.debug("request performance", Some(meta));
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delta_is_signed() {
        assert_eq!(memory_delta(100, 150), 50);
        assert_eq!(memory_delta(150, 100), -50);
        assert_eq!(memory_delta(0, u64::MAX), i64::MAX);
    }
}
