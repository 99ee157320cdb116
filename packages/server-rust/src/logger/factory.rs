//! Builds the configured logger stack.

use std::sync::Arc;

use tracing::info;

use super::{
    CentralLogger, ConsoleLogger, FanoutLogger, FileLogger, InMemoryLogger, Logger, LokiTransport,
    MeteredLogger, ServiceInfo,
};
use crate::config::LoggingConfig;
use crate::error::LoggerError;
use crate::metrics::LoggerMetrics;
use crate::process;
use crate::resilience::CircuitBreaker;

/// Name of the breaker guarding central shipping.
pub const CENTRAL_BREAKER: &str = "central-logging";

/// Everything produced by [`build_logging`].
#[derive(Clone)]
pub struct LoggingSystem {
    /// Root logger: level filter and counters over every enabled backend.
    pub logger: Arc<dyn Logger>,
    pub metrics: Arc<LoggerMetrics>,
    /// Present when the in-memory backend is enabled.
    pub memory: Option<Arc<InMemoryLogger>>,
    /// Present when the central backend is enabled.
    pub breaker: Option<Arc<CircuitBreaker>>,
}

impl LoggingSystem {
    /// Closes every backend, flushing buffered records.
    ///
    /// # Errors
    ///
    /// The first backend close failure.
    pub async fn shutdown(&self) -> Result<(), LoggerError> {
        self.logger.close().await
    }
}

impl From<&LoggingConfig> for ServiceInfo {
    fn from(config: &LoggingConfig) -> Self {
        ServiceInfo::new(config.service_name.clone(), config.environment.clone())
    }
}

/// Validates `config` and builds the enabled backends.
///
/// Must be called inside a tokio runtime: the file and central backends
/// start background workers.
///
/// # Errors
///
/// Configuration errors (see [`LoggingConfig::validate`]) and the I/O error
/// of opening the log file.
pub async fn build_logging(config: &LoggingConfig) -> Result<LoggingSystem, LoggerError> {
    config.validate()?;
    process::mark_started();

    let service = ServiceInfo::from(config);
    let metrics = Arc::new(LoggerMetrics::new());
    let mut backends: Vec<Arc<dyn Logger>> = Vec::new();
    let mut memory = None;
    let mut breaker = None;

    if config.console.enabled {
        backends.push(Arc::new(ConsoleLogger::new(service.clone())));
    }
    if config.file.enabled {
        let file = FileLogger::open(&config.file, service.clone(), Arc::clone(&metrics)).await?;
        backends.push(Arc::new(file));
    }
    if config.memory.enabled {
        let ring = Arc::new(InMemoryLogger::new(config.memory.max_size)?);
        backends.push(ring.clone());
        memory = Some(ring);
    }
    if config.central.enabled {
        let transport = Arc::new(LokiTransport::new(&config.central, service.clone())?);
        let guard = Arc::new(CircuitBreaker::new(
            CENTRAL_BREAKER,
            config.central.breaker.clone(),
        ));
        let central = CentralLogger::start(
            &config.central,
            transport,
            Arc::clone(&guard),
            Arc::clone(&metrics),
        )?;
        backends.push(Arc::new(central));
        breaker = Some(guard);
    }

    info!(
        service = %service.service,
        environment = %service.environment,
        level = %config.level,
        backends = backends.len(),
        "logging initialized"
    );

    let fanout: Arc<dyn Logger> = Arc::new(FanoutLogger::new(backends));
    Ok(LoggingSystem {
        logger: Arc::new(MeteredLogger::new(fanout, config.level, Arc::clone(&metrics))),
        metrics,
        memory,
        breaker,
    })
}
