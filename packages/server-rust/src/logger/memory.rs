//! Bounded in-memory backend, used for diagnostics endpoints and tests.

use std::collections::{BTreeMap, VecDeque};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use logweave_core::{LogLevel, LogRecord};
use parking_lot::Mutex;
use regex::Regex;
use serde::Serialize;

use super::Logger;
use crate::error::{ConfigError, LoggerError};

/// Summary of the records currently retained.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryStats {
    pub total: usize,
    pub capacity: usize,
    pub by_level: BTreeMap<LogLevel, usize>,
    pub oldest: Option<DateTime<Utc>>,
    pub newest: Option<DateTime<Utc>>,
}

/// FIFO ring of the most recent `capacity` records.
pub struct InMemoryLogger {
    capacity: usize,
    records: Mutex<VecDeque<LogRecord>>,
}

impl InMemoryLogger {
    /// # Errors
    ///
    /// [`ConfigError::ZeroCapacity`] when `capacity` is zero.
    pub fn new(capacity: usize) -> Result<Self, ConfigError> {
        if capacity == 0 {
            return Err(ConfigError::ZeroCapacity);
        }
        Ok(Self {
            capacity,
            records: Mutex::new(VecDeque::with_capacity(capacity)),
        })
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }

    /// All retained records, oldest first.
    #[must_use]
    pub fn records(&self) -> Vec<LogRecord> {
        self.records.lock().iter().cloned().collect()
    }

    fn filtered(&self, predicate: impl Fn(&LogRecord) -> bool) -> Vec<LogRecord> {
        self.records
            .lock()
            .iter()
            .filter(|r| predicate(r))
            .cloned()
            .collect()
    }

    #[must_use]
    pub fn by_level(&self, level: LogLevel) -> Vec<LogRecord> {
        self.filtered(|r| r.level == level)
    }

    #[must_use]
    pub fn by_trace_id(&self, trace_id: &str) -> Vec<LogRecord> {
        self.filtered(|r| r.context.trace_id == trace_id)
    }

    #[must_use]
    pub fn by_user_id(&self, user_id: &str) -> Vec<LogRecord> {
        self.filtered(|r| r.context.user_id.as_deref() == Some(user_id))
    }

    /// Records whose message matches `pattern`.
    #[must_use]
    pub fn matching(&self, pattern: &Regex) -> Vec<LogRecord> {
        self.filtered(|r| pattern.is_match(&r.message))
    }

    /// The `n` most recent records, oldest first.
    #[must_use]
    pub fn recent(&self, n: usize) -> Vec<LogRecord> {
        let records = self.records.lock();
        let skip = records.len().saturating_sub(n);
        records.iter().skip(skip).cloned().collect()
    }

    #[must_use]
    pub fn stats(&self) -> MemoryStats {
        let records = self.records.lock();
        let mut by_level = BTreeMap::new();
        for record in records.iter() {
            *by_level.entry(record.level).or_insert(0) += 1;
        }
        MemoryStats {
            total: records.len(),
            capacity: self.capacity,
            by_level,
            oldest: records.front().map(|r| r.timestamp),
            newest: records.back().map(|r| r.timestamp),
        }
    }

    /// Retained records as a pretty-printed JSON array.
    #[must_use]
    pub fn export_json(&self) -> String {
        let records = self.records.lock();
        serde_json::to_string_pretty(&*records).unwrap_or_else(|_| "[]".to_string())
    }

    pub fn clear(&self) {
        self.records.lock().clear();
    }
}

#[async_trait]
impl Logger for InMemoryLogger {
    fn write(&self, record: LogRecord) {
        let mut records = self.records.lock();
        while records.len() >= self.capacity {
            records.pop_front();
        }
        records.push_back(record);
    }

    async fn close(&self) -> Result<(), LoggerError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use logweave_core::{scope, ContextPatch};
    use proptest::prelude::*;
    use serde_json::Value;

    use super::*;

    #[test]
    fn zero_capacity_is_a_config_error() {
        assert!(matches!(
            InMemoryLogger::new(0),
            Err(ConfigError::ZeroCapacity)
        ));
    }

    #[test]
    fn oldest_records_are_evicted_first() {
        let logger = InMemoryLogger::new(3).unwrap();
        for n in 0..5 {
            logger.info(&format!("m{n}"), None);
        }
        let messages: Vec<_> = logger.records().into_iter().map(|r| r.message).collect();
        assert_eq!(messages, ["m2", "m3", "m4"]);
    }

    #[test]
    fn queries_filter_by_level_trace_user_and_pattern() {
        let logger = InMemoryLogger::new(10).unwrap();
        logger.info("user signed in", None);
        logger.warn("disk nearly full", None);
        scope::establish_sync(
            ContextPatch {
                trace_id: Some("t-1".to_string()),
                user_id: Some("alice".to_string()),
                ..ContextPatch::default()
            },
            || logger.info("user signed out", None),
        );

        assert_eq!(logger.by_level(LogLevel::Warn).len(), 1);
        assert_eq!(logger.by_trace_id("t-1").len(), 1);
        assert_eq!(logger.by_user_id("alice")[0].message, "user signed out");
        let pattern = Regex::new(r"^user signed (in|out)$").unwrap();
        assert_eq!(logger.matching(&pattern).len(), 2);
        assert_eq!(logger.recent(1)[0].message, "user signed out");
    }

    #[test]
    fn stats_export_and_clear() {
        let logger = InMemoryLogger::new(10).unwrap();
        assert_eq!(logger.stats().oldest, None);

        logger.info("a", None);
        logger.info("b", None);
        logger.debug("c", None);

        let stats = logger.stats();
        assert_eq!(stats.total, 3);
        assert_eq!(stats.capacity, 10);
        assert_eq!(stats.by_level[&LogLevel::Info], 2);
        assert_eq!(stats.by_level[&LogLevel::Debug], 1);
        assert!(stats.oldest <= stats.newest);

        let exported: Value = serde_json::from_str(&logger.export_json()).unwrap();
        assert_eq!(exported.as_array().unwrap().len(), 3);
        assert_eq!(exported[2]["message"], "c");

        logger.clear();
        assert!(logger.is_empty());
    }

    proptest! {
        #[test]
        fn ring_keeps_exactly_the_latest(capacity in 1usize..20, writes in 0usize..60) {
            let logger = InMemoryLogger::new(capacity).unwrap();
            for n in 0..writes {
                logger.info(&n.to_string(), None);
            }
            let kept: Vec<usize> = logger
                .records()
                .iter()
                .map(|r| r.message.parse().unwrap())
                .collect();
            let expected: Vec<usize> = (writes.saturating_sub(capacity)..writes).collect();
            prop_assert_eq!(kept, expected);
        }
    }
}
