//! # beacon-observability
//!
//! Logging setup for pagebeacon hosts.
//!
//! The library crates are **log producers** only: they use the standard
//! `tracing` macros and never install a subscriber. A host process calls
//! [`init`] or [`init_with_config`] once at startup to decide where those
//! logs go:
//!
//! - structured JSONL to a file (`log_path`), one object per line, rolled
//!   over to `<log_path>.1` past `max_file_bytes`
//! - compact human-readable lines on stderr
//!
//! ```rust,ignore
//! beacon_observability::init_with_config(beacon_observability::LogConfig {
//!     service_name: "checkout-page".into(),
//!     default_level: "debug".into(),
//!     log_path: Some("/var/log/beacon.jsonl".into()),
//!     also_stderr: true,
//!     ..Default::default()
//! })?;
//! ```

mod json_layer;
mod log_file;

pub use json_layer::{JsonLayer, LogEntry};
pub use log_file::{RollingLogFile, DEFAULT_MAX_LOG_BYTES};

use std::io;
use std::path::PathBuf;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Configuration for the logging system.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Name of the service, included in every JSONL line.
    pub service_name: String,

    /// Default log level filter (e.g., "debug", "info", "warn").
    /// Can be overridden by `RUST_LOG` environment variable.
    pub default_level: String,

    /// JSONL output file. No file output when unset.
    pub log_path: Option<PathBuf>,

    /// Also emit logs to stderr. Stderr is always used when no
    /// `log_path` is configured.
    pub also_stderr: bool,

    /// Size at which the log file rolls over. 0 disables rollover.
    pub max_file_bytes: u64,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            service_name: "pagebeacon".into(),
            default_level: "info".into(),
            log_path: None,
            also_stderr: false,
            max_file_bytes: DEFAULT_MAX_LOG_BYTES,
        }
    }
}

/// Initialize logging to stderr for `service_name`.
pub fn init(service_name: &str) -> io::Result<()> {
    init_with_config(LogConfig {
        service_name: service_name.into(),
        ..Default::default()
    })
}

/// Initialize logging with custom configuration.
///
/// Returns an error only if the log file cannot be opened. Calling this a
/// second time leaves the first subscriber in place.
pub fn init_with_config(config: LogConfig) -> io::Result<()> {
    let json_layer = match &config.log_path {
        Some(path) => {
            let file = RollingLogFile::open(path, config.max_file_bytes)?;
            Some(
                JsonLayer::new(config.service_name.clone(), file)
                    .with_filter(env_filter(&config.default_level)),
            )
        }
        None => None,
    };

    let stderr_layer = if config.also_stderr || config.log_path.is_none() {
        Some(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .compact()
                .with_writer(io::stderr)
                .with_filter(env_filter(&config.default_level)),
        )
    } else {
        None
    };

    let installed = tracing_subscriber::registry()
        .with(json_layer)
        .with(stderr_layer)
        .try_init()
        .is_ok();

    if installed {
        tracing::info!(
            service = %config.service_name,
            log_path = ?config.log_path,
            "logging initialized"
        );
    }
    Ok(())
}

fn env_filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
}

/// Parse a log level string into a tracing Level.
pub fn parse_level(level: &str) -> tracing::Level {
    match level.to_lowercase().as_str() {
        "trace" => tracing::Level::TRACE,
        "debug" => tracing::Level::DEBUG,
        "info" => tracing::Level::INFO,
        "warn" | "warning" => tracing::Level::WARN,
        "error" => tracing::Level::ERROR,
        _ => tracing::Level::INFO,
    }
}
