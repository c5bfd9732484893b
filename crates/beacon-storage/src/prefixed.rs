//! Prefix-scoped typed storage used for user identity data.

use crate::KeyValueStore;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, warn};

/// Default key prefix for identity data.
pub const DEFAULT_PREFIX: &str = "tracker_";

/// Typed JSON facade over a [`KeyValueStore`] that only touches keys under
/// its prefix.
///
/// Failures are logged and swallowed: a read that fails or does not decode
/// yields `None`, a failed write is dropped.
#[derive(Clone)]
pub struct PrefixedStorage {
    store: Arc<dyn KeyValueStore>,
    prefix: String,
}

impl PrefixedStorage {
    /// Create a facade scoped to `prefix`.
    pub fn new(store: Arc<dyn KeyValueStore>, prefix: impl Into<String>) -> Self {
        Self {
            store,
            prefix: prefix.into(),
        }
    }

    /// Create a facade with [`DEFAULT_PREFIX`].
    pub fn with_default_prefix(store: Arc<dyn KeyValueStore>) -> Self {
        Self::new(store, DEFAULT_PREFIX)
    }

    /// The key prefix.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    fn full_key(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key)
    }

    /// Read and decode a value.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let full_key = self.full_key(key);
        let raw = match self.store.get(&full_key) {
            Ok(raw) => raw?,
            Err(e) => {
                error!(key = %full_key, error = %e, "Storage get failed");
                return None;
            }
        };

        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(key = %full_key, error = %e, "Stored value does not decode");
                None
            }
        }
    }

    /// Encode and store a value.
    pub fn set<T: Serialize>(&self, key: &str, value: &T) {
        let full_key = self.full_key(key);
        let encoded = match serde_json::to_string(value) {
            Ok(encoded) => encoded,
            Err(e) => {
                error!(key = %full_key, error = %e, "Value does not encode");
                return;
            }
        };

        if let Err(e) = self.store.set(&full_key, &encoded) {
            error!(key = %full_key, error = %e, "Storage set failed");
        }
    }

    /// Remove a value.
    pub fn remove(&self, key: &str) {
        let full_key = self.full_key(key);
        if let Err(e) = self.store.remove(&full_key) {
            error!(key = %full_key, error = %e, "Storage remove failed");
        }
    }

    /// Remove every key under the prefix, leaving other keys alone.
    pub fn clear(&self) {
        let keys = match self.store.keys_with_prefix(&self.prefix) {
            Ok(keys) => keys,
            Err(e) => {
                error!(prefix = %self.prefix, error = %e, "Storage clear failed");
                return;
            }
        };

        for key in keys {
            if let Err(e) = self.store.remove(&key) {
                error!(key = %key, error = %e, "Storage remove failed");
            }
        }
    }
}
