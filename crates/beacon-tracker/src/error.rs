//! Tracker error types.

use beacon_outbox::OutboxError;
use thiserror::Error;

/// Tracker error type.
#[derive(Error, Debug)]
pub enum TrackerError {
    /// `init` called on a running tracker
    #[error("Tracker has already been initialized")]
    AlreadyInitialized,

    /// Operation needs a running tracker
    #[error("Tracker not initialized")]
    NotInitialized,

    /// Invalid tracker-level configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Delivery core rejected the configuration
    #[error(transparent)]
    Outbox(#[from] OutboxError),
}

/// Result type alias using TrackerError.
pub type TrackerResult<T> = Result<T, TrackerError>;
