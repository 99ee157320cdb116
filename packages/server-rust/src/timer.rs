//! Duration logging helpers.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde_json::{Map, Value};
use tokio::time::Instant;

use crate::logger::Logger;

/// Measures one operation and logs its duration when finished.
pub struct Timer {
    logger: Arc<dyn Logger>,
    label: String,
    started: Instant,
}

impl Timer {
    #[must_use]
    pub fn start(logger: Arc<dyn Logger>, label: impl Into<String>) -> Self {
        Self {
            logger,
            label: label.into(),
            started: Instant::now(),
        }
    }

    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Logs `"{label} completed"` at info with `durationMs` merged into
    /// `meta`, and returns the elapsed time.
    pub fn done(self, meta: Option<Value>) -> Duration {
        let elapsed = self.elapsed();
        let mut fields = match meta {
            Some(Value::Object(map)) => map,
            Some(Value::Null) | None => Map::new(),
            Some(other) => Map::from_iter([("meta".to_string(), other)]),
        };
        fields.insert("label".to_string(), Value::from(self.label.as_str()));
        fields.insert("durationMs".to_string(), Value::from(duration_ms(elapsed)));
        self.logger.info(
            &format!("{} completed", self.label),
            Some(Value::Object(fields)),
        );
        elapsed
    }
}

/// Awaits `fut` and logs how long it took.
pub async fn timed<F>(logger: Arc<dyn Logger>, label: impl Into<String>, fut: F) -> F::Output
where
    F: Future,
{
    let timer = Timer::start(logger, label);
    let output = fut.await;
    timer.done(None);
    output
}

/// Whole milliseconds, saturating.
#[must_use]
pub fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
