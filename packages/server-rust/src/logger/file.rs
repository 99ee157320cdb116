//! JSON-lines file backend with size-based rotation.
//!
//! Records are serialized on the caller's side and handed to a background
//! worker, which owns the open file. When appending a line would push the
//! active file past `max_size_bytes`, the file is rotated first:
//! `app.log` becomes `app.log.1`, `app.log.1` becomes `app.log.2`, and so on,
//! dropping anything beyond `max_files`.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use logweave_core::LogRecord;
use tokio::fs::{self, File, OpenOptions};
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio::sync::oneshot;
use tracing::{error, warn};

use super::{Logger, ServiceInfo};
use crate::config::FileConfig;
use crate::error::{ConfigError, LoggerError};
use crate::metrics::LoggerMetrics;
use crate::worker::{BackgroundRunnable, BackgroundWorker};

/// Lines buffered between callers and the file writer.
const QUEUE_CAPACITY: usize = 4_096;

// ---------------------------------------------------------------------------
// FileTask / FileWriter
// ---------------------------------------------------------------------------

pub enum FileTask {
    Line(String),
    Flush(oneshot::Sender<()>),
}

struct FileWriter {
    path: PathBuf,
    max_size: u64,
    max_files: usize,
    out: Option<BufWriter<File>>,
    size: u64,
    metrics: Arc<LoggerMetrics>,
}

impl FileWriter {
    async fn open(path: &Path) -> std::io::Result<(BufWriter<File>, u64)> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await?;
        let size = file.metadata().await?.len();
        Ok((BufWriter::new(file), size))
    }

    fn rotated(&self, index: usize) -> PathBuf {
        let mut name = self.path.clone().into_os_string();
        name.push(format!(".{index}"));
        PathBuf::from(name)
    }

    async fn rotate(&mut self) -> std::io::Result<()> {
        if let Some(mut out) = self.out.take() {
            out.flush().await?;
        }
        if self.max_files == 0 {
            fs::remove_file(&self.path).await?;
        } else {
            for index in (1..self.max_files).rev() {
                let from = self.rotated(index);
                if fs::try_exists(&from).await? {
                    fs::rename(&from, self.rotated(index + 1)).await?;
                }
            }
            fs::rename(&self.path, self.rotated(1)).await?;
        }
        let (out, size) = Self::open(&self.path).await?;
        self.out = Some(out);
        self.size = size;
        Ok(())
    }

    async fn append(&mut self, line: &str) -> std::io::Result<()> {
        let len = line.len() as u64 + 1;
        if self.size > 0 && self.size + len > self.max_size {
            self.rotate().await?;
        }
        if self.out.is_none() {
            let (out, size) = Self::open(&self.path).await?;
            self.out = Some(out);
            self.size = size;
        }
        if let Some(out) = self.out.as_mut() {
            out.write_all(line.as_bytes()).await?;
            out.write_all(b"\n").await?;
            self.size += len;
        }
        Ok(())
    }

    async fn flush(&mut self) {
        if let Some(out) = self.out.as_mut() {
            if let Err(err) = out.flush().await {
                error!(path = %self.path.display(), error = %err, "log file flush failed");
            }
        }
    }
}

#[async_trait]
impl BackgroundRunnable for FileWriter {
    type Task = FileTask;

    async fn run(&mut self, task: FileTask) {
        match task {
            FileTask::Line(line) => {
                if let Err(err) = self.append(&line).await {
                    self.metrics.record_backend_failure(1);
                    // Reopen on the next line.
                    self.out = None;
                    error!(path = %self.path.display(), error = %err, "log file write failed");
                }
            }
            FileTask::Flush(done) => {
                self.flush().await;
                let _ = done.send(());
            }
        }
    }

    async fn on_tick(&mut self) {
        self.flush().await;
    }

    async fn shutdown(&mut self) {
        self.flush().await;
        if let Some(out) = self.out.take() {
            if let Err(err) = out.get_ref().sync_all().await {
                warn!(path = %self.path.display(), error = %err, "log file sync failed");
            }
        }
    }
}

// ---------------------------------------------------------------------------
// FileLogger
// ---------------------------------------------------------------------------

pub struct FileLogger {
    service: ServiceInfo,
    path: PathBuf,
    worker: BackgroundWorker<FileWriter>,
    metrics: Arc<LoggerMetrics>,
}

impl FileLogger {
    /// Creates the parent directory, opens the log file and starts the
    /// writer. Must be called inside a tokio runtime.
    ///
    /// # Errors
    ///
    /// [`ConfigError::ZeroFileSize`] for a zero rotation size, or the I/O
    /// error from creating the directory or opening the file.
    pub async fn open(
        config: &FileConfig,
        service: ServiceInfo,
        metrics: Arc<LoggerMetrics>,
    ) -> Result<Self, LoggerError> {
        if config.max_size_bytes == 0 {
            return Err(ConfigError::ZeroFileSize.into());
        }
        if let Some(parent) = config.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }
        let (out, size) = FileWriter::open(&config.path).await?;

        let writer = FileWriter {
            path: config.path.clone(),
            max_size: config.max_size_bytes,
            max_files: config.max_files,
            out: Some(out),
            size,
            metrics: Arc::clone(&metrics),
        };
        Ok(Self {
            service,
            path: config.path.clone(),
            worker: BackgroundWorker::start(writer, config.flush_interval(), QUEUE_CAPACITY),
            metrics,
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Waits until every line queued so far has been written and flushed.
    pub async fn flush(&self) {
        let (tx, rx) = oneshot::channel();
        if self.worker.submit(FileTask::Flush(tx)).await.is_ok() {
            let _ = rx.await;
        }
    }
}

#[async_trait]
impl Logger for FileLogger {
    fn write(&self, record: LogRecord) {
        let line = self.service.json_line(&record);
        if self.worker.try_submit(FileTask::Line(line)).is_err() {
            self.metrics.record_dropped(1);
        }
    }

    async fn close(&self) -> Result<(), LoggerError> {
        self.worker.stop().await
    }
}

#[cfg(test)]
mod tests {
    use serde_json::{json, Value};

    use super::*;

    fn config(dir: &Path, max_size_bytes: u64, max_files: usize) -> FileConfig {
        FileConfig {
            enabled: true,
            path: dir.join("nested").join("app.log"),
            max_size_bytes,
            max_files,
            flush_interval_ms: 50,
        }
    }

    async fn open(config: &FileConfig) -> FileLogger {
        FileLogger::open(
            config,
            ServiceInfo::new("app", "test"),
            Arc::new(LoggerMetrics::new()),
        )
        .await
        .unwrap()
    }

    async fn lines(path: &Path) -> Vec<Value> {
        fs::read_to_string(path)
            .await
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect()
    }

    #[tokio::test]
    async fn writes_json_lines_and_close_drains_queue() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path(), 1024 * 1024, 3);
        let logger = open(&config).await;

        for n in 0..20 {
            logger.info("entry", Some(json!({"n": n})));
        }
        logger.close().await.unwrap();
        logger.close().await.unwrap();

        let lines = lines(&config.path).await;
        assert_eq!(lines.len(), 20);
        assert_eq!(lines[0]["service"], "app");
        assert_eq!(lines[0]["level"], "info");
        assert_eq!(lines[19]["fields"]["n"], 19);
    }

    #[tokio::test]
    async fn flush_makes_lines_visible() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path(), 1024 * 1024, 3);
        let logger = open(&config).await;

        logger.warn("first", None);
        logger.flush().await;
        assert_eq!(lines(&config.path).await.len(), 1);
        logger.close().await.unwrap();
    }

    #[tokio::test]
    async fn rotates_and_keeps_bounded_backups() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path(), 600, 2);
        let logger = open(&config).await;

        for n in 0..40 {
            logger.info("rotation filler message", Some(json!({"n": n})));
        }
        logger.close().await.unwrap();

        let active = lines(&config.path).await;
        let newest_backup = lines(&config.path.with_file_name("app.log.1")).await;
        assert!(!active.is_empty());
        assert!(!newest_backup.is_empty());
        assert!(fs::try_exists(config.path.with_file_name("app.log.2")).await.unwrap());
        assert!(!fs::try_exists(config.path.with_file_name("app.log.3")).await.unwrap());

        let last_backup = newest_backup.last().unwrap()["fields"]["n"].as_u64().unwrap();
        let first_active = active[0]["fields"]["n"].as_u64().unwrap();
        assert_eq!(first_active, last_backup + 1);
        assert_eq!(active.last().unwrap()["fields"]["n"], 39);

        for path in [config.path.clone(), config.path.with_file_name("app.log.1")] {
            let size = fs::metadata(&path).await.unwrap().len();
            assert!(size <= 600, "{} is {size} bytes", path.display());
        }
    }

    #[tokio::test]
    async fn zero_size_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let result = FileLogger::open(
            &config(dir.path(), 0, 1),
            ServiceInfo::new("app", "test"),
            Arc::new(LoggerMetrics::new()),
        )
        .await;
        assert!(matches!(
            result,
            Err(LoggerError::Config(ConfigError::ZeroFileSize))
        ));
    }
}
