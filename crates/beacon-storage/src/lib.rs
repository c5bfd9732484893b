//! Key/value storage for pagebeacon.
//!
//! This crate provides the durable medium used by the delivery core and the
//! identity facade:
//! - **MemoryStore**: process-local map, optionally with a byte quota
//! - **FileStore**: a single JSON document on disk, written atomically
//! - **PrefixedStorage**: prefix-scoped typed facade for user identity data

mod file;
mod memory;
mod prefixed;
mod traits;

pub use file::FileStore;
pub use memory::MemoryStore;
pub use prefixed::{PrefixedStorage, DEFAULT_PREFIX};
pub use traits::KeyValueStore;

use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tracing::warn;

/// Error type for storage operations.
#[derive(Error, Debug)]
pub enum StorageError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Stored document could not be encoded or decoded
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Backend cannot be used right now
    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    /// Write would exceed the configured quota
    #[error("Quota exceeded writing {key} (limit {limit} bytes)")]
    QuotaExceeded { key: String, limit: usize },
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Which backend [`open_storage`] should try first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageKind {
    /// File-backed storage, falling back to memory when unavailable.
    File,
    /// Process-local storage.
    Memory,
}

/// Open a storage backend.
///
/// A file store that cannot be opened degrades to a [`MemoryStore`] with a
/// warning, so callers always get a usable store.
pub fn open_storage(kind: StorageKind, path: Option<&Path>) -> Arc<dyn KeyValueStore> {
    match (kind, path) {
        (StorageKind::File, Some(path)) => match FileStore::open(path) {
            Ok(store) => Arc::new(store),
            Err(e) => {
                warn!(
                    path = %path.display(),
                    error = %e,
                    "File storage not available, falling back to memory"
                );
                Arc::new(MemoryStore::new())
            }
        },
        (StorageKind::File, None) => {
            warn!("No storage path configured, falling back to memory");
            Arc::new(MemoryStore::new())
        }
        (StorageKind::Memory, _) => Arc::new(MemoryStore::new()),
    }
}
