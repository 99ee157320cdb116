//! Shipping batches of records to the aggregation backend.

use std::collections::BTreeMap;

use async_trait::async_trait;
use logweave_core::{LogLevel, LogRecord};
use serde::Serialize;

use super::ServiceInfo;
use crate::config::CentralConfig;
use crate::error::{ConfigError, TransportError};

/// Delivers one batch of records to a remote backend.
#[async_trait]
pub trait BatchTransport: Send + Sync + 'static {
    async fn send(&self, batch: &[LogRecord]) -> Result<(), TransportError>;
}

// ---------------------------------------------------------------------------
// Loki push payload
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct PushRequest {
    pub streams: Vec<Stream>,
}

#[derive(Debug, Serialize)]
pub struct Stream {
    pub stream: BTreeMap<String, String>,
    /// `[timestamp in nanoseconds, line]` pairs.
    pub values: Vec<[String; 2]>,
}

// ---------------------------------------------------------------------------
// LokiTransport
// ---------------------------------------------------------------------------

/// Posts batches to a Loki-compatible `/loki/api/v1/push` endpoint.
///
/// Records are grouped into one stream per level; every stream carries the
/// configured static labels plus `service`, `environment` and `level`.
pub struct LokiTransport {
    client: reqwest::Client,
    url: String,
    credentials: Option<(String, Option<String>)>,
    labels: BTreeMap<String, String>,
    service: ServiceInfo,
}

impl LokiTransport {
    /// # Errors
    ///
    /// [`ConfigError::MissingCentralHost`] when no host is configured, or
    /// [`ConfigError::HttpClient`] if the HTTP client cannot be built.
    pub fn new(config: &CentralConfig, service: ServiceInfo) -> Result<Self, ConfigError> {
        let url = config.push_url().ok_or(ConfigError::MissingCentralHost)?;
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(ConfigError::HttpClient)?;
        Ok(Self {
            client,
            url,
            credentials: config
                .username
                .clone()
                .map(|user| (user, config.password.clone())),
            labels: config.labels.clone(),
            service,
        })
    }

    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Builds the push payload for `batch`.
    #[must_use]
    pub fn payload(&self, batch: &[LogRecord]) -> PushRequest {
        let mut by_level: BTreeMap<LogLevel, Vec<[String; 2]>> = BTreeMap::new();
        for record in batch {
            let nanos = record
                .timestamp
                .timestamp_nanos_opt()
                .unwrap_or_default()
                .to_string();
            by_level
                .entry(record.level)
                .or_default()
                .push([nanos, self.service.json_line(record)]);
        }

        let streams = by_level
            .into_iter()
            .map(|(level, values)| {
                let mut stream = self.labels.clone();
                stream.insert("service".to_string(), self.service.service.clone());
                stream.insert(
                    "environment".to_string(),
                    self.service.environment.clone(),
                );
                stream.insert("level".to_string(), level.as_str().to_string());
                Stream { stream, values }
            })
            .collect();
        PushRequest { streams }
    }
}

#[async_trait]
impl BatchTransport for LokiTransport {
    async fn send(&self, batch: &[LogRecord]) -> Result<(), TransportError> {
        let body = serde_json::to_vec(&self.payload(batch))?;
        let mut request = self
            .client
            .post(&self.url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body);
        if let Some((user, password)) = &self.credentials {
            request = request.basic_auth(user, password.as_ref());
        }

        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(TransportError::Status {
                status: status.as_u16(),
            })
        }
    }
}
