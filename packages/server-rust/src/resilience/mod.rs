//! Resilience wrappers for remote operations: retry with backoff and a
//! circuit breaker.

pub mod circuit_breaker;
pub mod retry;

pub use circuit_breaker::{BreakerConfig, CircuitBreaker, CircuitError, CircuitState};
pub use retry::{retry_with_backoff, RetryConfig};
