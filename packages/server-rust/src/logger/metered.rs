//! Root wrapper that applies the minimum level and counts emitted records.

use std::sync::Arc;

use async_trait::async_trait;
use logweave_core::{LogLevel, LogRecord};

use super::Logger;
use crate::error::LoggerError;
use crate::metrics::LoggerMetrics;

pub struct MeteredLogger {
    inner: Arc<dyn Logger>,
    threshold: LogLevel,
    metrics: Arc<LoggerMetrics>,
}

impl MeteredLogger {
    #[must_use]
    pub fn new(inner: Arc<dyn Logger>, threshold: LogLevel, metrics: Arc<LoggerMetrics>) -> Self {
        Self {
            inner,
            threshold,
            metrics,
        }
    }

    #[must_use]
    pub fn threshold(&self) -> LogLevel {
        self.threshold
    }
}

#[async_trait]
impl Logger for MeteredLogger {
    fn write(&self, record: LogRecord) {
        if !self.enabled(record.level) {
            return;
        }
        self.metrics.record(record.level);
        self.inner.write(record);
    }

    async fn close(&self) -> Result<(), LoggerError> {
        self.inner.close().await
    }

    fn enabled(&self, level: LogLevel) -> bool {
        level.enabled_at(self.threshold) && self.inner.enabled(level)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logger::InMemoryLogger;

    #[test]
    fn filters_below_threshold_and_counts_the_rest() {
        let memory = Arc::new(InMemoryLogger::new(10).unwrap());
        let metrics = Arc::new(LoggerMetrics::new());
        let logger = MeteredLogger::new(memory.clone(), LogLevel::Info, Arc::clone(&metrics));

        logger.error("e", None, None);
        logger.info("i", None);
        logger.http("h", None);
        logger.debug("d", None);

        assert_eq!(memory.len(), 2);
        assert!(!logger.enabled(LogLevel::Http));
        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.total, 2);
        assert_eq!(snapshot.by_level[&LogLevel::Error], 1);
        assert_eq!(snapshot.by_level[&LogLevel::Debug], 0);
    }
}
