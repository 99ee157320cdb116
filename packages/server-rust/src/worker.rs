//! Background worker that owns a runnable and feeds it queued tasks.
//!
//! Callers hand tasks over with a non-blocking [`BackgroundWorker::try_submit`];
//! the worker task runs them in order, calls `on_tick` at a fixed interval,
//! and on [`BackgroundWorker::stop`] drains whatever is still queued before
//! calling `shutdown`.

use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::error::LoggerError;

// ---------------------------------------------------------------------------
// BackgroundRunnable trait
// ---------------------------------------------------------------------------

/// Task handler executed by [`BackgroundWorker`].
#[async_trait]
pub trait BackgroundRunnable: Send + 'static {
    type Task: Send + 'static;

    /// Process a single task.
    async fn run(&mut self, task: Self::Task);

    /// Called on each tick interval. Default is a no-op.
    async fn on_tick(&mut self) {}

    /// Called once after the queue has been drained on stop.
    async fn shutdown(&mut self) {}
}

// ---------------------------------------------------------------------------
// SubmitError
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SubmitError {
    #[error("worker queue is full")]
    Full,
    #[error("worker is stopped")]
    Closed,
}

// ---------------------------------------------------------------------------
// BackgroundWorker
// ---------------------------------------------------------------------------

pub struct BackgroundWorker<R: BackgroundRunnable> {
    tx: mpsc::Sender<R::Task>,
    shutdown_tx: Mutex<Option<oneshot::Sender<()>>>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl<R: BackgroundRunnable> BackgroundWorker<R> {
    /// Spawns the worker task. Must be called inside a tokio runtime.
    ///
    /// `capacity` bounds the queue between callers and the worker; a zero
    /// capacity is raised to one.
    pub fn start(mut runnable: R, tick: Duration, capacity: usize) -> Self {
        let (tx, mut rx) = mpsc::channel::<R::Task>(capacity.max(1));
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(tick);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // Skip the immediate first tick.
            ticker.tick().await;

            loop {
                tokio::select! {
                    task = rx.recv() => match task {
                        Some(t) => runnable.run(t).await,
                        None => break,
                    },
                    _ = ticker.tick() => runnable.on_tick().await,
                    _ = &mut shutdown_rx => break,
                }
            }

            rx.close();
            while let Ok(task) = rx.try_recv() {
                runnable.run(task).await;
            }
            runnable.shutdown().await;
        });

        Self {
            tx,
            shutdown_tx: Mutex::new(Some(shutdown_tx)),
            handle: Mutex::new(Some(handle)),
        }
    }

    /// Queues `task` without waiting.
    ///
    /// # Errors
    ///
    /// [`SubmitError::Full`] when the queue is at capacity, and
    /// [`SubmitError::Closed`] once the worker has stopped.
    pub fn try_submit(&self, task: R::Task) -> Result<(), SubmitError> {
        self.tx.try_send(task).map_err(|err| match err {
            mpsc::error::TrySendError::Full(_) => SubmitError::Full,
            mpsc::error::TrySendError::Closed(_) => SubmitError::Closed,
        })
    }

    /// Queues `task`, waiting for space.
    ///
    /// # Errors
    ///
    /// [`SubmitError::Closed`] once the worker has stopped.
    pub async fn submit(&self, task: R::Task) -> Result<(), SubmitError> {
        self.tx.send(task).await.map_err(|_| SubmitError::Closed)
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        !self.tx.is_closed()
    }

    /// Stops the worker and waits until queued tasks and `shutdown` have run.
    /// Calling it again is a no-op.
    ///
    /// # Errors
    ///
    /// [`LoggerError::WorkerStopped`] when the worker task had already died
    /// (panicked or was cancelled), so queued tasks may not have run.
    pub async fn stop(&self) -> Result<(), LoggerError> {
        if let Some(tx) = self.shutdown_tx.lock().take() {
            let _ = tx.send(());
        }
        let handle = self.handle.lock().take();
        let Some(handle) = handle else {
            return Ok(());
        };
        handle.await.map_err(|err| {
            tracing::error!(error = %err, "background worker task failed");
            LoggerError::WorkerStopped
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    use super::*;

    #[derive(Default, Clone)]
    struct Counters {
        runs: Arc<AtomicU32>,
        ticks: Arc<AtomicU32>,
        shutdowns: Arc<AtomicU32>,
    }

    struct CountingRunnable(Counters);

    #[async_trait]
    impl BackgroundRunnable for CountingRunnable {
        type Task = u32;

        async fn run(&mut self, _task: u32) {
            self.0.runs.fetch_add(1, Ordering::SeqCst);
        }

        async fn on_tick(&mut self) {
            self.0.ticks.fetch_add(1, Ordering::SeqCst);
        }

        async fn shutdown(&mut self) {
            self.0.shutdowns.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn stop_drains_queued_tasks_before_shutdown() {
        let counters = Counters::default();
        let worker =
            BackgroundWorker::start(CountingRunnable(counters.clone()), Duration::from_secs(60), 16);

        for n in 0..10 {
            worker.try_submit(n).unwrap();
        }
        worker.stop().await.unwrap();

        assert_eq!(counters.runs.load(Ordering::SeqCst), 10);
        assert_eq!(counters.shutdowns.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn tick_fires_periodically() {
        let counters = Counters::default();
        let worker =
            BackgroundWorker::start(CountingRunnable(counters.clone()), Duration::from_millis(20), 4);

        tokio::time::sleep(Duration::from_millis(105)).await;
        worker.stop().await.unwrap();

        assert!(counters.ticks.load(Ordering::SeqCst) >= 4);
    }

    #[tokio::test]
    async fn full_queue_is_reported() {
        let counters = Counters::default();
        let worker =
            BackgroundWorker::start(CountingRunnable(counters.clone()), Duration::from_secs(60), 1);

        // The worker has not been polled yet on this single-threaded runtime.
        worker.try_submit(1).unwrap();
        assert_eq!(worker.try_submit(2), Err(SubmitError::Full));

        worker.stop().await.unwrap();
        assert_eq!(counters.runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn submit_after_stop_is_rejected_and_stop_is_idempotent() {
        let counters = Counters::default();
        let worker =
            BackgroundWorker::start(CountingRunnable(counters.clone()), Duration::from_secs(60), 4);

        worker.stop().await.unwrap();
        worker.stop().await.unwrap();

        assert!(!worker.is_running());
        assert_eq!(worker.try_submit(1), Err(SubmitError::Closed));
        assert_eq!(worker.submit(1).await, Err(SubmitError::Closed));
        assert_eq!(counters.shutdowns.load(Ordering::SeqCst), 1);
    }

    struct PanickingRunnable;

    #[async_trait]
    impl BackgroundRunnable for PanickingRunnable {
        type Task = u32;

        async fn run(&mut self, task: u32) {
            assert!(task != 0, "cannot process task zero");
        }
    }

    #[tokio::test]
    async fn stop_reports_a_dead_worker() {
        let worker = BackgroundWorker::start(PanickingRunnable, Duration::from_secs(60), 4);
        worker.try_submit(0).unwrap();
        while worker.is_running() {
            tokio::task::yield_now().await;
        }

        assert_eq!(worker.try_submit(1), Err(SubmitError::Closed));
        assert!(matches!(
            worker.stop().await,
            Err(LoggerError::WorkerStopped)
        ));
        assert!(worker.stop().await.is_ok());
    }
}
