//! Configuration types for the logging system.
//!
//! All structs deserialize with `#[serde(default)]`, so a partial document
//! (or none at all) yields a working console-only setup. Loading from files,
//! environment, or CLI flags is left to the host application.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use logweave_core::LogLevel;
use serde::Deserialize;

use crate::error::ConfigError;
use crate::resilience::{BreakerConfig, RetryConfig};

/// Top-level logging configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Service name attached to every record and central label set.
    pub service_name: String,
    /// Deployment environment tag (e.g. `development`, `production`).
    pub environment: String,
    /// Minimum level emitted by the root logger.
    pub level: LogLevel,
    pub console: ConsoleConfig,
    pub file: FileConfig,
    pub memory: MemoryConfig,
    pub central: CentralConfig,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            service_name: "app".to_string(),
            environment: "development".to_string(),
            level: LogLevel::Info,
            console: ConsoleConfig::default(),
            file: FileConfig::default(),
            memory: MemoryConfig::default(),
            central: CentralConfig::default(),
        }
    }
}

impl LoggingConfig {
    /// Checks construction-time requirements of every enabled backend.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError`] found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.memory.enabled && self.memory.max_size == 0 {
            return Err(ConfigError::ZeroCapacity);
        }
        if self.file.enabled && self.file.max_size_bytes == 0 {
            return Err(ConfigError::ZeroFileSize);
        }
        if self.central.enabled {
            if self.central.host.as_deref().map_or(true, str::is_empty) {
                return Err(ConfigError::MissingCentralHost);
            }
            if self.central.batch_size == 0 {
                return Err(ConfigError::ZeroBatchSize);
            }
            if self.central.queue_capacity == 0 {
                return Err(ConfigError::ZeroQueueCapacity);
            }
            self.central.retry.validate()?;
            self.central.breaker.validate()?;
        }
        Ok(())
    }

    /// Whether the environment tag names a production deployment.
    #[must_use]
    pub fn is_production(&self) -> bool {
        is_production(&self.environment)
    }
}

/// `true` for `production` / `prod`, compared case-insensitively.
#[must_use]
pub fn is_production(environment: &str) -> bool {
    environment.eq_ignore_ascii_case("production") || environment.eq_ignore_ascii_case("prod")
}

/// Console output through the `tracing` formatting engine.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ConsoleConfig {
    pub enabled: bool,
    /// Emit JSON lines instead of the human-readable format.
    pub json: bool,
    /// ANSI colors in the human-readable format.
    pub colorize: bool,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            json: false,
            colorize: true,
        }
    }
}

/// JSON-lines file output with size-based rotation.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub enabled: bool,
    pub path: PathBuf,
    /// Rotate once the active file reaches this size.
    pub max_size_bytes: u64,
    /// Number of rotated files kept (`app.log.1` .. `app.log.N`).
    pub max_files: usize,
    /// Interval between buffer flushes.
    pub flush_interval_ms: u64,
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            path: PathBuf::from("logs/app.log"),
            max_size_bytes: 10 * 1024 * 1024,
            max_files: 5,
            flush_interval_ms: 1_000,
        }
    }
}

impl FileConfig {
    #[must_use]
    pub fn flush_interval(&self) -> Duration {
        Duration::from_millis(self.flush_interval_ms)
    }
}

/// Bounded in-memory ring.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    pub enabled: bool,
    /// Maximum records retained; the oldest are discarded first.
    pub max_size: usize,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            max_size: 1_000,
        }
    }
}

/// Remote aggregation backend (Loki push API).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CentralConfig {
    pub enabled: bool,
    /// Required when enabled.
    pub host: Option<String>,
    pub port: u16,
    /// `http` or `https`.
    pub protocol: String,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Static labels added to every stream.
    pub labels: BTreeMap<String, String>,
    /// Records per shipped batch.
    pub batch_size: usize,
    /// Maximum time a partial batch waits before shipping.
    pub flush_interval_ms: u64,
    /// Per-request timeout.
    pub timeout_ms: u64,
    /// Records buffered between callers and the shipping worker.
    pub queue_capacity: usize,
    pub retry: RetryConfig,
    pub breaker: BreakerConfig,
}

impl Default for CentralConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            host: None,
            port: 3100,
            protocol: "http".to_string(),
            username: None,
            password: None,
            labels: BTreeMap::new(),
            batch_size: 100,
            flush_interval_ms: 5_000,
            timeout_ms: 10_000,
            queue_capacity: 10_000,
            retry: RetryConfig::default(),
            breaker: BreakerConfig::default(),
        }
    }
}

impl CentralConfig {
    /// Full push endpoint URL, or `None` when no host is configured.
    #[must_use]
    pub fn push_url(&self) -> Option<String> {
        let host = self.host.as_deref().filter(|h| !h.is_empty())?;
        Some(format!(
            "{}://{}:{}/loki/api/v1/push",
            self.protocol, host, self.port
        ))
    }

    #[must_use]
    pub fn flush_interval(&self) -> Duration {
        Duration::from_millis(self.flush_interval_ms)
    }

    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_console_only() {
        let config = LoggingConfig::default();
        assert!(config.console.enabled);
        assert!(!config.file.enabled);
        assert!(!config.memory.enabled);
        assert!(!config.central.enabled);
        assert_eq!(config.level, LogLevel::Info);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn central_without_host_is_rejected() {
        let mut config = LoggingConfig::default();
        config.central.enabled = true;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MissingCentralHost)
        ));

        config.central.host = Some(String::new());
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MissingCentralHost)
        ));

        config.central.host = Some("loki.internal".to_string());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn zero_sizes_are_rejected() {
        let mut config = LoggingConfig::default();
        config.memory.enabled = true;
        config.memory.max_size = 0;
        assert!(matches!(config.validate(), Err(ConfigError::ZeroCapacity)));

        let mut config = LoggingConfig::default();
        config.central.enabled = true;
        config.central.host = Some("h".to_string());
        config.central.batch_size = 0;
        assert!(matches!(config.validate(), Err(ConfigError::ZeroBatchSize)));
    }

    #[test]
    fn central_resilience_settings_are_validated() {
        let central = |config: &mut LoggingConfig| {
            config.central.enabled = true;
            config.central.host = Some("loki".to_string());
        };

        let mut config = LoggingConfig::default();
        central(&mut config);
        config.central.retry.backoff_multiplier = f64::INFINITY;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidBackoffMultiplier(_))
        ));

        let mut config = LoggingConfig::default();
        central(&mut config);
        config.central.retry.backoff_multiplier = 0.5;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidBackoffMultiplier(_))
        ));

        let mut config = LoggingConfig::default();
        central(&mut config);
        config.central.breaker.failure_threshold = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ZeroFailureThreshold)
        ));
    }

    #[test]
    fn level_names_parse_case_insensitively() {
        let config: LoggingConfig = serde_json::from_str(r#"{"level": "WARNING"}"#).unwrap();
        assert_eq!(config.level, LogLevel::Warn);

        let err = serde_json::from_str::<LoggingConfig>(r#"{"level": "loud"}"#).unwrap_err();
        assert!(err.to_string().contains("unknown log level"), "{err}");
    }

    #[test]
    fn push_url_format() {
        let config = CentralConfig {
            host: Some("loki.internal".to_string()),
            protocol: "https".to_string(),
            port: 443,
            ..CentralConfig::default()
        };
        assert_eq!(
            config.push_url().as_deref(),
            Some("https://loki.internal:443/loki/api/v1/push")
        );
        assert_eq!(CentralConfig::default().push_url(), None);
    }

    #[test]
    fn deserializes_partial_document() {
        let config: LoggingConfig = serde_json::from_str(
            r#"{
                "service_name": "billing",
                "level": "debug",
                "memory": {"enabled": true, "max_size": 10},
                "central": {"host": "loki", "labels": {"team": "core"}}
            }"#,
        )
        .unwrap();

        assert_eq!(config.service_name, "billing");
        assert_eq!(config.level, LogLevel::Debug);
        assert_eq!(config.memory.max_size, 10);
        assert_eq!(config.central.port, 3100);
        assert_eq!(config.central.labels["team"], "core");
        assert_eq!(config.central.retry.max_retries, 3);
    }

    #[test]
    fn production_detection() {
        assert!(is_production("Production"));
        assert!(is_production("prod"));
        assert!(!is_production("staging"));
    }
}
