//! Tracker configuration.

use crate::{TrackerError, TrackerResult};
use beacon_outbox::ReporterConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default sampling rate: keep everything.
pub const DEFAULT_SAMPLING_RATE: f64 = 1.0;

/// Everything the delivery core needs plus tracker-level settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackerConfig {
    #[serde(flatten)]
    pub reporter: ReporterConfig,
    /// Application identifier stamped on every event.
    pub app_id: String,
    /// Fraction of events kept, in `0.0..=1.0`.
    #[serde(default = "default_sampling_rate")]
    pub sampling_rate: f64,
    /// Log every tracked event at info level.
    #[serde(default)]
    pub debug: bool,
}

fn default_sampling_rate() -> f64 {
    DEFAULT_SAMPLING_RATE
}

impl TrackerConfig {
    pub fn new(report_url: impl Into<String>, app_id: impl Into<String>) -> Self {
        Self {
            reporter: ReporterConfig::new(report_url),
            app_id: app_id.into(),
            sampling_rate: DEFAULT_SAMPLING_RATE,
            debug: false,
        }
    }

    /// Load from a JSON file; `BEACON_*` overrides apply to the reporter part.
    pub fn load_from_file(path: &Path) -> TrackerResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| TrackerError::Config(format!("{}: {}", path.display(), e)))?;
        let mut config: TrackerConfig = serde_json::from_str(&content)
            .map_err(|e| TrackerError::Config(format!("{}: {}", path.display(), e)))?;
        config.reporter.apply_env();
        Ok(config)
    }

    pub fn validate(&self) -> TrackerResult<()> {
        self.reporter.validate()?;
        if self.app_id.trim().is_empty() {
            return Err(TrackerError::Config("app_id is required".to_string()));
        }
        if !(0.0..=1.0).contains(&self.sampling_rate) {
            return Err(TrackerError::Config(format!(
                "sampling_rate must be within 0..=1, got {}",
                self.sampling_rate
            )));
        }
        Ok(())
    }
}
