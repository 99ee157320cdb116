//! `Logweave` Server: logger backends, resilience wrappers, axum request
//! middleware, and health reporting on top of `logweave-core`.

pub mod audit;
pub mod config;
pub mod error;
pub mod global;
pub mod health;
pub mod logger;
pub mod metrics;
pub mod middleware;
pub mod process;
pub mod resilience;
pub mod telemetry;
pub mod timer;
pub mod worker;

pub use audit::{AuditEvent, AuditLogger, AuditOutcome};
pub use config::{CentralConfig, ConsoleConfig, FileConfig, LoggingConfig, MemoryConfig};
pub use error::{ConfigError, LoggerError, TransportError};
pub use health::{health_routes, HealthConfig, HealthReport, HealthState, HealthStatus};
pub use logger::{build_logging, ChildLogger, Logger, LoggerExt, LoggingSystem, ServiceInfo};
pub use crate::metrics::{LoggerMetrics, MetricsSnapshot};
pub use middleware::{apply_request_pipeline, AppError, PipelineConfig, PipelineState};
pub use resilience::{
    retry_with_backoff, BreakerConfig, CircuitBreaker, CircuitError, CircuitState, RetryConfig,
};
pub use timer::{timed, Timer};
