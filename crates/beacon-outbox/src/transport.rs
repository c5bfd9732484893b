//! Network transport for batch delivery.

use crate::event::BatchEnvelope;
use crate::{Event, OutboxError, OutboxResult, ReporterConfig};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use reqwest::Client;
use tracing::debug;

/// A single network send of one batch. No retry or persistence policy.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Deliver `events` once. `Ok` means the collector accepted them.
    async fn deliver(&self, events: &[Event]) -> OutboxResult<()>;
}

/// HTTP transport: POSTs the batch as JSON.
pub struct HttpTransport {
    client: Client,
    report_url: String,
    headers: HeaderMap,
}

impl HttpTransport {
    /// Create a transport from the reporter configuration.
    pub fn new(config: &ReporterConfig) -> OutboxResult<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| OutboxError::Config(format!("failed to create HTTP client: {}", e)))?;

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        for (name, value) in &config.headers {
            let name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| {
                OutboxError::Config(format!("invalid header name {:?}: {}", name, e))
            })?;
            let value = HeaderValue::from_str(value).map_err(|e| {
                OutboxError::Config(format!("invalid header value for {}: {}", name, e))
            })?;
            headers.insert(name, value);
        }

        Ok(Self {
            client,
            report_url: config.report_url.clone(),
            headers,
        })
    }

    /// The configured endpoint.
    pub fn report_url(&self) -> &str {
        &self.report_url
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn deliver(&self, events: &[Event]) -> OutboxResult<()> {
        debug!(url = %self.report_url, events = events.len(), "Sending batch");

        let response = self
            .client
            .post(&self.report_url)
            .headers(self.headers.clone())
            .json(&BatchEnvelope::new(events))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(OutboxError::Transport(format!("HTTP {}: {}", status, body)));
        }

        Ok(())
    }
}
