//! Health report and endpoint handlers.
//!
//! The report combines three checks: logger activity (error ratio and
//! dropped records), process memory against a configured limit, and the
//! central backend's circuit breaker. Overall status is the worst of the
//! three.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::logger::LoggingSystem;
use crate::metrics::{LoggerMetrics, MetricsSnapshot};
use crate::process::{self, resident_memory_bytes};
use crate::resilience::{CircuitBreaker, CircuitState};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Ordered from best to worst.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CheckResult {
    pub status: HealthStatus,
    pub detail: String,
}

impl CheckResult {
    fn new(status: HealthStatus, detail: impl Into<String>) -> Self {
        Self {
            status,
            detail: detail.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    pub status: HealthStatus,
    pub checks: BTreeMap<String, CheckResult>,
    pub uptime_secs: u64,
    pub timestamp: DateTime<Utc>,
    pub metrics: MetricsSnapshot,
}

/// Thresholds for the health checks.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct HealthConfig {
    /// Resident memory above this is unhealthy.
    pub memory_limit_bytes: u64,
    /// Fraction of the limit above which memory is degraded.
    pub memory_degraded_ratio: f64,
    /// Error-record ratio above which the logger is degraded.
    pub error_ratio_degraded: f64,
    /// Error-record ratio above which the logger is unhealthy.
    pub error_ratio_unhealthy: f64,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            memory_limit_bytes: 1024 * 1024 * 1024,
            memory_degraded_ratio: 0.8,
            error_ratio_degraded: 0.1,
            error_ratio_unhealthy: 0.5,
        }
    }
}

/// Worst status among `statuses`; healthy when empty.
pub fn overall_status(statuses: impl IntoIterator<Item = HealthStatus>) -> HealthStatus {
    statuses
        .into_iter()
        .max()
        .unwrap_or(HealthStatus::Healthy)
}

// ---------------------------------------------------------------------------
// Checks
// ---------------------------------------------------------------------------

#[must_use]
pub fn logger_check(snapshot: &MetricsSnapshot, config: &HealthConfig) -> CheckResult {
    let ratio = snapshot.error_ratio();
    let detail = format!(
        "{} records, error ratio {ratio:.2}, {} dropped, {} undelivered",
        snapshot.total, snapshot.dropped, snapshot.backend_failures
    );
    let status = if ratio > config.error_ratio_unhealthy {
        HealthStatus::Unhealthy
    } else if ratio > config.error_ratio_degraded
        || snapshot.dropped > 0
        || snapshot.backend_failures > 0
    {
        HealthStatus::Degraded
    } else {
        HealthStatus::Healthy
    };
    CheckResult::new(status, detail)
}

#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn memory_check(rss: Option<u64>, config: &HealthConfig) -> CheckResult {
    let Some(rss) = rss else {
        return CheckResult::new(HealthStatus::Healthy, "resident memory unavailable");
    };
    let limit = config.memory_limit_bytes;
    let detail = format!("{} MiB resident of {} MiB limit", rss >> 20, limit >> 20);
    let status = if rss > limit {
        HealthStatus::Unhealthy
    } else if rss as f64 > limit as f64 * config.memory_degraded_ratio {
        HealthStatus::Degraded
    } else {
        HealthStatus::Healthy
    };
    CheckResult::new(status, detail)
}

#[must_use]
pub fn backend_check(breaker: Option<&CircuitBreaker>) -> CheckResult {
    let Some(breaker) = breaker else {
        return CheckResult::new(HealthStatus::Healthy, "central logging disabled");
    };
    let state = breaker.state();
    let status = match state {
        CircuitState::Closed => HealthStatus::Healthy,
        CircuitState::HalfOpen => HealthStatus::Degraded,
        CircuitState::Open => HealthStatus::Unhealthy,
    };
    CheckResult::new(
        status,
        format!("circuit {state}, {} consecutive failures", breaker.failure_count()),
    )
}

// ---------------------------------------------------------------------------
// HealthState
// ---------------------------------------------------------------------------

/// Shared state behind the health endpoints.
#[derive(Clone)]
pub struct HealthState {
    metrics: Arc<LoggerMetrics>,
    breaker: Option<Arc<CircuitBreaker>>,
    config: Arc<HealthConfig>,
}

impl HealthState {
    #[must_use]
    pub fn new(
        metrics: Arc<LoggerMetrics>,
        breaker: Option<Arc<CircuitBreaker>>,
        config: HealthConfig,
    ) -> Self {
        process::mark_started();
        Self {
            metrics,
            breaker,
            config: Arc::new(config),
        }
    }

    #[must_use]
    pub fn for_system(system: &LoggingSystem, config: HealthConfig) -> Self {
        Self::new(Arc::clone(&system.metrics), system.breaker.clone(), config)
    }

    #[must_use]
    pub fn report(&self) -> HealthReport {
        let metrics = self.metrics.snapshot();
        let mut checks = BTreeMap::new();
        checks.insert("logger".to_string(), logger_check(&metrics, &self.config));
        checks.insert(
            "memory".to_string(),
            memory_check(resident_memory_bytes(), &self.config),
        );
        checks.insert(
            "backend".to_string(),
            backend_check(self.breaker.as_deref()),
        );

        HealthReport {
            status: overall_status(checks.values().map(|c| c.status)),
            checks,
            uptime_secs: process::uptime().as_secs(),
            timestamp: Utc::now(),
            metrics,
        }
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// Full health report. 503 when unhealthy, 200 otherwise.
pub async fn health_handler(State(state): State<HealthState>) -> (StatusCode, Json<HealthReport>) {
    let report = state.report();
    let code = if report.status == HealthStatus::Unhealthy {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::OK
    };
    (code, Json(report))
}

/// Liveness probe: always 200 while the process can serve requests.
pub async fn liveness_handler() -> StatusCode {
    StatusCode::OK
}

/// Mounts `/health` and `/health/live`.
pub fn health_routes(state: HealthState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/health/live", get(liveness_handler))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
