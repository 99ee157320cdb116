//! Error types for configuration, logger lifecycle, and central transport.

/// Construction-time configuration errors. Always fatal; never defaulted.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("central logging is enabled but no host is configured")]
    MissingCentralHost,
    #[error("central batch size must be greater than zero")]
    ZeroBatchSize,
    #[error("central queue capacity must be greater than zero")]
    ZeroQueueCapacity,
    #[error("in-memory logger capacity must be greater than zero")]
    ZeroCapacity,
    #[error("file rotation size must be greater than zero")]
    ZeroFileSize,
    #[error("backoff multiplier must be finite and at least 1.0, got {0}")]
    InvalidBackoffMultiplier(f64),
    #[error("circuit breaker failure threshold must be greater than zero")]
    ZeroFailureThreshold,
    #[error("failed to build HTTP client: {0}")]
    HttpClient(#[source] reqwest::Error),
    #[error("failed to install tracing subscriber: {0}")]
    Subscriber(String),
    #[error("global logger is already installed")]
    AlreadyInstalled,
}

/// Errors from building or closing a logger backend.
#[derive(Debug, thiserror::Error)]
pub enum LoggerError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("log file I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("background worker stopped unexpectedly")]
    WorkerStopped,
}

/// Errors shipping a batch to the aggregation backend.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("request to aggregation backend failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("aggregation backend responded with status {status}")]
    Status { status: u16 },
    #[error("failed to encode batch: {0}")]
    Encode(#[from] serde_json::Error),
}
