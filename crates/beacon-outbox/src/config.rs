//! Reporter configuration.

use crate::{OutboxError, OutboxResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;
use tracing::warn;
use url::Url;

/// Default number of events per batch.
pub const DEFAULT_BATCH_SIZE: usize = 10;
/// Default idle flush interval in milliseconds.
pub const DEFAULT_REPORT_INTERVAL_MS: u64 = 5000;
/// Default in-process retries after the first attempt.
pub const DEFAULT_MAX_RETRIES: u32 = 3;
/// Default linear backoff step in milliseconds.
pub const DEFAULT_RETRY_BACKOFF_MS: u64 = 1000;
/// Default in-memory queue ceiling.
pub const DEFAULT_MAX_QUEUE_SIZE: usize = 1000;
/// Default request timeout in seconds.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
/// Default key of the persisted queue.
pub const DEFAULT_STORAGE_KEY: &str = "offline_events";

/// Configuration consumed by the delivery core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReporterConfig {
    /// Collector endpoint.
    pub report_url: String,
    /// Flush threshold and maximum events per batch.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Milliseconds between the first queued event and a timed flush.
    #[serde(default = "default_report_interval_ms")]
    pub report_interval_ms: u64,
    /// Extra request headers.
    #[serde(default)]
    pub headers: HashMap<String, String>,
    /// Retries after the first failed attempt.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Backoff before retry `n` is `retry_backoff_ms * n`.
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
    /// In-memory queue ceiling; the oldest events are dropped beyond it.
    #[serde(default = "default_max_queue_size")]
    pub max_queue_size: usize,
    /// HTTP request timeout.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Key holding the persisted queue.
    #[serde(default = "default_storage_key")]
    pub storage_key: String,
}

fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}

fn default_report_interval_ms() -> u64 {
    DEFAULT_REPORT_INTERVAL_MS
}

fn default_max_retries() -> u32 {
    DEFAULT_MAX_RETRIES
}

fn default_retry_backoff_ms() -> u64 {
    DEFAULT_RETRY_BACKOFF_MS
}

fn default_max_queue_size() -> usize {
    DEFAULT_MAX_QUEUE_SIZE
}

fn default_request_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

fn default_storage_key() -> String {
    DEFAULT_STORAGE_KEY.to_string()
}

impl ReporterConfig {
    /// Create a configuration with default values for everything but the endpoint.
    pub fn new(report_url: impl Into<String>) -> Self {
        Self {
            report_url: report_url.into(),
            batch_size: DEFAULT_BATCH_SIZE,
            report_interval_ms: DEFAULT_REPORT_INTERVAL_MS,
            headers: HashMap::new(),
            max_retries: DEFAULT_MAX_RETRIES,
            retry_backoff_ms: DEFAULT_RETRY_BACKOFF_MS,
            max_queue_size: DEFAULT_MAX_QUEUE_SIZE,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            storage_key: DEFAULT_STORAGE_KEY.to_string(),
        }
    }

    /// Load configuration from a JSON file, then apply environment overrides.
    pub fn load_from_file(path: &Path) -> OutboxResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| OutboxError::Config(format!("{}: {}", path.display(), e)))?;
        let mut config: ReporterConfig = serde_json::from_str(&content)?;
        config.apply_env();
        Ok(config)
    }

    /// Override fields from `BEACON_*` environment variables.
    ///
    /// Values that do not parse are ignored with a warning.
    pub fn apply_env(&mut self) {
        if let Ok(url) = std::env::var("BEACON_REPORT_URL") {
            self.report_url = url;
        }
        if let Some(value) = parse_env("BEACON_BATCH_SIZE") {
            self.batch_size = value;
        }
        if let Some(value) = parse_env("BEACON_REPORT_INTERVAL_MS") {
            self.report_interval_ms = value;
        }
        if let Some(value) = parse_env("BEACON_MAX_RETRIES") {
            self.max_retries = value;
        }
    }

    /// Check that a delivery path can exist with this configuration.
    pub fn validate(&self) -> OutboxResult<()> {
        if self.report_url.trim().is_empty() {
            return Err(OutboxError::Config("report_url is required".to_string()));
        }

        let url = Url::parse(&self.report_url).map_err(|e| {
            OutboxError::Config(format!("invalid report_url {:?}: {}", self.report_url, e))
        })?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(OutboxError::Config(format!(
                "report_url must be http or https, got {}",
                url.scheme()
            )));
        }

        if self.batch_size == 0 {
            return Err(OutboxError::Config("batch_size must be positive".to_string()));
        }
        if self.max_queue_size < self.batch_size {
            return Err(OutboxError::Config(format!(
                "max_queue_size ({}) must be at least batch_size ({})",
                self.max_queue_size, self.batch_size
            )));
        }
        if self.storage_key.is_empty() {
            return Err(OutboxError::Config("storage_key must not be empty".to_string()));
        }

        Ok(())
    }

    pub fn report_interval(&self) -> Duration {
        Duration::from_millis(self.report_interval_ms)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

fn parse_env<T: std::str::FromStr>(name: &str) -> Option<T> {
    let raw = std::env::var(name).ok()?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(variable = name, value = %raw, "Ignoring unparseable environment override");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_config() {
        let config = ReporterConfig::new("https://collect.example.com/events");
        assert_eq!(config.batch_size, 10);
        assert_eq!(config.report_interval(), Duration::from_millis(5000));
        assert!(config.headers.is_empty());
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.retry_backoff(), Duration::from_millis(1000));
        assert_eq!(config.max_queue_size, 1000);
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
        assert_eq!(config.storage_key, "offline_events");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_load_from_file_fills_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("beacon.json");
        std::fs::write(
            &path,
            r#"{
                "report_url": "https://collect.example.com/events",
                "batch_size": 25,
                "headers": {"X-App": "shop"}
            }"#,
        )
        .unwrap();

        let config = ReporterConfig::load_from_file(&path).unwrap();
        assert_eq!(config.batch_size, 25);
        assert_eq!(config.headers.get("X-App").map(String::as_str), Some("shop"));
        assert_eq!(config.report_interval_ms, DEFAULT_REPORT_INTERVAL_MS);
        assert_eq!(config.max_retries, DEFAULT_MAX_RETRIES);
    }

    #[test]
    fn test_config_load_missing_file_is_config_error() {
        let dir = tempdir().unwrap();
        let result = ReporterConfig::load_from_file(&dir.path().join("missing.json"));
        assert!(matches!(result, Err(OutboxError::Config(_))));
    }

    #[test]
    fn test_config_load_requires_report_url() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("beacon.json");
        std::fs::write(&path, r#"{"batch_size": 5}"#).unwrap();

        let result = ReporterConfig::load_from_file(&path);
        assert!(matches!(result, Err(OutboxError::Json(_))));
    }

    #[test]
    fn test_validate_rejects_empty_url() {
        let config = ReporterConfig::new("  ");
        assert!(matches!(config.validate(), Err(OutboxError::Config(_))));
    }

    #[test]
    fn test_validate_rejects_unparseable_url() {
        let config = ReporterConfig::new("not a url");
        assert!(matches!(config.validate(), Err(OutboxError::Config(_))));
    }

    #[test]
    fn test_validate_rejects_non_http_scheme() {
        let config = ReporterConfig::new("ftp://collect.example.com");
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("http or https"));
    }

    #[test]
    fn test_validate_rejects_zero_batch_size() {
        let mut config = ReporterConfig::new("http://localhost:8080");
        config.batch_size = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_ceiling_below_batch_size() {
        let mut config = ReporterConfig::new("http://localhost:8080");
        config.batch_size = 50;
        config.max_queue_size = 10;
        assert!(config.validate().is_err());
    }
}
