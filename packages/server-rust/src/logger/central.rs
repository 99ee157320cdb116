//! Central aggregation backend.
//!
//! `write` only enqueues. A background worker collects records into batches
//! of `batch_size` (or whatever has accumulated when the flush interval
//! ticks) and ships each batch through the circuit breaker, which in turn
//! wraps retry with backoff. A batch that still fails is counted and
//! reported through `tracing`; the logging caller never sees the error.

use std::sync::Arc;

use async_trait::async_trait;
use logweave_core::LogRecord;
use tokio::sync::oneshot;
use tracing::{debug, error};

use super::transport::BatchTransport;
use super::Logger;
use crate::config::CentralConfig;
use crate::error::{ConfigError, LoggerError};
use crate::metrics::LoggerMetrics;
use crate::resilience::{retry_with_backoff, CircuitBreaker, RetryConfig};
use crate::worker::{BackgroundRunnable, BackgroundWorker};

pub enum CentralTask {
    Record(LogRecord),
    Flush(oneshot::Sender<()>),
}

struct Shipper {
    transport: Arc<dyn BatchTransport>,
    breaker: Arc<CircuitBreaker>,
    retry: RetryConfig,
    batch_size: usize,
    pending: Vec<LogRecord>,
    metrics: Arc<LoggerMetrics>,
}

impl Shipper {
    async fn ship(&mut self) {
        if self.pending.is_empty() {
            return;
        }
        let batch = std::mem::replace(&mut self.pending, Vec::with_capacity(self.batch_size));
        let transport = &self.transport;
        let retry = &self.retry;

        let result = self
            .breaker
            .call(|| retry_with_backoff(retry, || transport.send(&batch)))
            .await;
        match result {
            Ok(()) => debug!(records = batch.len(), "shipped log batch"),
            Err(err) => {
                self.metrics.record_backend_failure(batch.len() as u64);
                error!(
                    records = batch.len(),
                    breaker = %self.breaker.state(),
                    error = %err,
                    "failed to ship log batch"
                );
            }
        }
    }
}

#[async_trait]
impl BackgroundRunnable for Shipper {
    type Task = CentralTask;

    async fn run(&mut self, task: CentralTask) {
        match task {
            CentralTask::Record(record) => {
                self.pending.push(record);
                if self.pending.len() >= self.batch_size {
                    self.ship().await;
                }
            }
            CentralTask::Flush(done) => {
                self.ship().await;
                let _ = done.send(());
            }
        }
    }

    async fn on_tick(&mut self) {
        self.ship().await;
    }

    async fn shutdown(&mut self) {
        self.ship().await;
    }
}

pub struct CentralLogger {
    worker: BackgroundWorker<Shipper>,
    breaker: Arc<CircuitBreaker>,
    metrics: Arc<LoggerMetrics>,
}

impl CentralLogger {
    /// Starts the shipping worker. Must be called inside a tokio runtime.
    ///
    /// # Errors
    ///
    /// [`ConfigError::ZeroBatchSize`], [`ConfigError::ZeroQueueCapacity`],
    /// or an invalid retry or breaker setting.
    pub fn start(
        config: &CentralConfig,
        transport: Arc<dyn BatchTransport>,
        breaker: Arc<CircuitBreaker>,
        metrics: Arc<LoggerMetrics>,
    ) -> Result<Self, ConfigError> {
        if config.batch_size == 0 {
            return Err(ConfigError::ZeroBatchSize);
        }
        if config.queue_capacity == 0 {
            return Err(ConfigError::ZeroQueueCapacity);
        }
        config.retry.validate()?;
        config.breaker.validate()?;
        let shipper = Shipper {
            transport,
            breaker: Arc::clone(&breaker),
            retry: config.retry.clone(),
            batch_size: config.batch_size,
            pending: Vec::with_capacity(config.batch_size),
            metrics: Arc::clone(&metrics),
        };
        Ok(Self {
            worker: BackgroundWorker::start(shipper, config.flush_interval(), config.queue_capacity),
            breaker,
            metrics,
        })
    }

    #[must_use]
    pub fn breaker(&self) -> &Arc<CircuitBreaker> {
        &self.breaker
    }

    /// Ships everything queued so far and waits for the attempt to finish.
    pub async fn flush(&self) {
        let (tx, rx) = oneshot::channel();
        if self.worker.submit(CentralTask::Flush(tx)).await.is_ok() {
            let _ = rx.await;
        }
    }
}

#[async_trait]
impl Logger for CentralLogger {
    fn write(&self, record: LogRecord) {
        if self.worker.try_submit(CentralTask::Record(record)).is_err() {
            self.metrics.record_dropped(1);
        }
    }

    async fn close(&self) -> Result<(), LoggerError> {
        self.worker.stop().await
    }
}
