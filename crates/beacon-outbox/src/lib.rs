//! # beacon-outbox: batched, retrying, offline-tolerant event delivery
//!
//! Takes event records from in-page producers, groups them into batches and
//! ships them to a collector endpoint. Batches that cannot be delivered are
//! kept in a persisted queue and replayed once connectivity returns.
//!
//! ## Architecture
//!
//! ```text
//! add()/track()
//!      │
//! ┌────▼───────────┐  batch   ┌────────────────┐  POST   ┌───────────┐
//! │ BatchScheduler │─────────▶│ DeliveryEngine │────────▶│ Transport │
//! └────────────────┘          └───────┬────────┘         └───────────┘
//!                                     │ exhausted / offline
//!                             ┌───────▼─────────┐  reconnect  ┌────────────────────┐
//!                             │ PersistentQueue │◀───────────▶│ OfflineCoordinator │
//!                             └─────────────────┘    replay   └────────────────────┘
//! ```
//!
//! - **Batching**: a flush happens when `batch_size` events are queued or
//!   `report_interval_ms` after the first event of an idle queue, whichever
//!   comes first.
//! - **Retry**: up to `max_retries` retries with linear backoff
//!   (`retry_backoff_ms * n`).
//! - **Offline**: while offline, batches skip the network and go straight to
//!   the persisted queue. A reconnect replays the whole queue as one batch.
//! - **Teardown**: [`Reporter::destroy`] cancels pending backoff and makes a
//!   final best-effort flush. Nothing is silently lost.
//!
//! ## Example
//!
//! ```ignore
//! use beacon_outbox::{ConnectivitySignal, EventKind, Reporter, ReporterConfig};
//! use beacon_storage::MemoryStore;
//! use std::sync::Arc;
//!
//! let connectivity = ConnectivitySignal::online();
//! let reporter = Reporter::start_http(
//!     ReporterConfig::new("https://collector.example.com/events"),
//!     Arc::new(MemoryStore::new()),
//!     &connectivity,
//! )?;
//!
//! reporter.track(EventKind::Click, serde_json::Map::new());
//! connectivity.set_offline();
//! reporter.destroy().await;
//! ```

mod config;
mod connectivity;
mod delivery;
mod error;
mod event;
mod pending;
mod reporter;
mod scheduler;
mod transport;

#[cfg(test)]
mod tests;

pub use config::{
    ReporterConfig, DEFAULT_BATCH_SIZE, DEFAULT_MAX_QUEUE_SIZE, DEFAULT_MAX_RETRIES,
    DEFAULT_REPORT_INTERVAL_MS, DEFAULT_REQUEST_TIMEOUT_SECS, DEFAULT_RETRY_BACKOFF_MS,
    DEFAULT_STORAGE_KEY,
};
pub use connectivity::{Connectivity, ConnectivitySignal, OfflineCoordinator, Transition};
pub use delivery::{DeliveryEngine, DeliveryFailure, DeliveryOutcome, DeliveryStats, PersistReason};
pub use error::{OutboxError, OutboxResult};
pub use event::{Event, EventData, EventKind};
pub use pending::PersistentQueue;
pub use reporter::{EventSink, Reporter, ReporterStats};
pub use scheduler::{AfterFlush, BatchScheduler, FlushState, PushOutcome};
pub use transport::{HttpTransport, Transport};
