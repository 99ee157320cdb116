//! Forwards each record to several backends.

use std::sync::Arc;

use async_trait::async_trait;
use logweave_core::{LogLevel, LogRecord};
use tracing::error;

use super::Logger;
use crate::error::LoggerError;

#[derive(Default)]
pub struct FanoutLogger {
    targets: Vec<Arc<dyn Logger>>,
}

impl FanoutLogger {
    #[must_use]
    pub fn new(targets: Vec<Arc<dyn Logger>>) -> Self {
        Self { targets }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.targets.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}

#[async_trait]
impl Logger for FanoutLogger {
    fn write(&self, record: LogRecord) {
        let Some((last, rest)) = self.targets.split_last() else {
            return;
        };
        for target in rest {
            if target.enabled(record.level) {
                target.write(record.clone());
            }
        }
        if last.enabled(record.level) {
            last.write(record);
        }
    }

    /// Closes every target; the first failure is returned after all have
    /// been attempted.
    async fn close(&self) -> Result<(), LoggerError> {
        let mut first = None;
        for target in &self.targets {
            if let Err(err) = target.close().await {
                error!(error = %err, "failed to close log backend");
                first.get_or_insert(err);
            }
        }
        first.map_or(Ok(()), Err)
    }

    fn enabled(&self, level: LogLevel) -> bool {
        self.targets.iter().any(|t| t.enabled(level))
    }
}
