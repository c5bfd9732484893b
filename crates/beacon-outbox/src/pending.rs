//! Persisted queue of undelivered events.
//!
//! One storage key holds a JSON array of events in FIFO order. Every
//! operation is read-modify-write on that key; callers must serialize
//! mutations (the reporter worker is the only writer). Storage failures are
//! logged here and never propagated.

use crate::Event;
use beacon_storage::{KeyValueStore, StorageResult};
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Durable FIFO of events awaiting a later delivery attempt.
#[derive(Clone)]
pub struct PersistentQueue {
    store: Arc<dyn KeyValueStore>,
    key: String,
}

impl PersistentQueue {
    /// Create a queue stored under `key`.
    pub fn new(store: Arc<dyn KeyValueStore>, key: impl Into<String>) -> Self {
        Self {
            store,
            key: key.into(),
        }
    }

    /// Storage key of the queue.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Append `events` after everything already persisted.
    ///
    /// When the stored sequence cannot be read the store is left untouched
    /// and `events` are logged as lost.
    pub fn append(&self, events: Vec<Event>) {
        if events.is_empty() {
            return;
        }
        let added = events.len();
        let Some(mut merged) = self.read_for_update(added) else {
            return;
        };
        merged.extend(events);
        self.write(&merged, added);
    }

    /// Put `events` ahead of everything already persisted.
    ///
    /// Used when a replay fails: the replayed events are older than anything
    /// persisted while the replay was running.
    pub fn prepend(&self, events: Vec<Event>) {
        if events.is_empty() {
            return;
        }
        let added = events.len();
        let Some(existing) = self.read_for_update(added) else {
            return;
        };
        let mut merged = events;
        merged.extend(existing);
        self.write(&merged, added);
    }

    /// Return the full persisted sequence and clear the store.
    ///
    /// A failed read returns nothing and keeps the stored value for a later
    /// drain.
    pub fn drain_all(&self) -> Vec<Event> {
        let events = match self.read() {
            Ok(events) => events,
            Err(e) => {
                error!(key = %self.key, error = %e, "Failed to read persisted queue, keeping it");
                return Vec::new();
            }
        };
        if let Err(e) = self.store.remove(&self.key) {
            error!(key = %self.key, error = %e, "Failed to clear persisted queue");
        }
        if !events.is_empty() {
            debug!(key = %self.key, count = events.len(), "Drained persisted queue");
        }
        events
    }

    /// Read the persisted sequence without clearing it.
    pub fn snapshot(&self) -> Vec<Event> {
        self.read().unwrap_or_else(|e| {
            error!(key = %self.key, error = %e, "Failed to read persisted queue");
            Vec::new()
        })
    }

    /// Number of persisted events.
    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Read and decode the stored array. A corrupt value reads as empty so
    /// the next write replaces it; storage errors are returned.
    fn read(&self) -> StorageResult<Vec<Event>> {
        let Some(raw) = self.store.get(&self.key)? else {
            return Ok(Vec::new());
        };

        match serde_json::from_str(&raw) {
            Ok(events) => Ok(events),
            Err(e) => {
                warn!(key = %self.key, error = %e, "Persisted queue is corrupt, discarding it");
                Ok(Vec::new())
            }
        }
    }

    /// Current sequence ahead of a rewrite, or `None` (with the incoming
    /// events logged as lost) when the store cannot be read.
    fn read_for_update(&self, added: usize) -> Option<Vec<Event>> {
        match self.read() {
            Ok(events) => Some(events),
            Err(e) => {
                error!(
                    key = %self.key,
                    error = %e,
                    lost = added,
                    "Failed to read persisted queue, dropping new events"
                );
                None
            }
        }
    }

    fn write(&self, events: &[Event], added: usize) {
        let encoded = match serde_json::to_string(events) {
            Ok(encoded) => encoded,
            Err(e) => {
                error!(
                    key = %self.key,
                    error = %e,
                    lost = added,
                    "Failed to encode persisted queue"
                );
                return;
            }
        };

        match self.store.set(&self.key, &encoded) {
            Ok(()) => debug!(
                key = %self.key,
                added,
                total = events.len(),
                "Persisted events"
            ),
            Err(e) => error!(
                key = %self.key,
                error = %e,
                lost = added,
                "Failed to persist events, dropping them"
            ),
        }
    }
}
