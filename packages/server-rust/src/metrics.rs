//! Process-local logger activity counters.
//!
//! Counters are kept in atomics for the health report and mirrored to the
//! `metrics` facade so an installed exporter (if any) sees them too.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

use logweave_core::LogLevel;
use serde::Serialize;

const RECORDS_TOTAL: &str = "logweave_records_total";
const RECORDS_DROPPED_TOTAL: &str = "logweave_records_dropped_total";
const BACKEND_FAILURES_TOTAL: &str = "logweave_backend_failures_total";

#[derive(Debug, Default)]
pub struct LoggerMetrics {
    per_level: [AtomicU64; LogLevel::ALL.len()],
    dropped: AtomicU64,
    backend_failures: AtomicU64,
}

/// Point-in-time copy of [`LoggerMetrics`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshot {
    pub total: u64,
    pub by_level: BTreeMap<LogLevel, u64>,
    pub dropped: u64,
    pub backend_failures: u64,
}

impl MetricsSnapshot {
    /// Share of emitted records at `error` level, `0.0` when nothing was
    /// emitted.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn error_ratio(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        let errors = self.by_level.get(&LogLevel::Error).copied().unwrap_or(0);
        errors as f64 / self.total as f64
    }
}

impl LoggerMetrics {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(level: LogLevel) -> usize {
        usize::from(level.severity())
    }

    /// Counts one emitted record.
    pub fn record(&self, level: LogLevel) {
        self.per_level[Self::slot(level)].fetch_add(1, Ordering::Relaxed);
        ::metrics::counter!(RECORDS_TOTAL, "level" => level.as_str()).increment(1);
    }

    /// Counts records a backend discarded without queueing them: its queue
    /// was full or its worker had stopped.
    pub fn record_dropped(&self, count: u64) {
        self.dropped.fetch_add(count, Ordering::Relaxed);
        ::metrics::counter!(RECORDS_DROPPED_TOTAL).increment(count);
    }

    /// Counts records a backend failed to deliver.
    pub fn record_backend_failure(&self, count: u64) {
        self.backend_failures.fetch_add(count, Ordering::Relaxed);
        ::metrics::counter!(BACKEND_FAILURES_TOTAL).increment(count);
    }

    #[must_use]
    pub fn count(&self, level: LogLevel) -> u64 {
        self.per_level[Self::slot(level)].load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        let by_level: BTreeMap<_, _> = LogLevel::ALL
            .iter()
            .map(|&level| (level, self.count(level)))
            .collect();
        MetricsSnapshot {
            total: by_level.values().sum(),
            by_level,
            dropped: self.dropped.load(Ordering::Relaxed),
            backend_failures: self.backend_failures.load(Ordering::Relaxed),
        }
    }
}
