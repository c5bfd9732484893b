//! # beacon-tracker: client telemetry SDK surface
//!
//! Wraps the delivery core from `beacon-outbox` with what a host page needs:
//! sampling, enrichment with page context and stored identity, typed helpers
//! for the built-in event kinds and explicit event sources.
//!
//! ## Example
//!
//! ```ignore
//! use beacon_outbox::ConnectivitySignal;
//! use beacon_storage::{open_storage, PrefixedStorage, StorageKind};
//! use beacon_tracker::{Tracker, TrackerConfig, UserInfo};
//!
//! let store = open_storage(StorageKind::File, Some(&data_dir.join("beacon.json")));
//! let tracker = Tracker::new(PrefixedStorage::with_default_prefix(store.clone()));
//! tracker.init_http(
//!     TrackerConfig::new("https://collector.example.com/events", "shop"),
//!     store,
//!     &ConnectivitySignal::online(),
//! )?;
//!
//! tracker.set_user(UserInfo::with_user_id("u-42"));
//! tracker.track_page_view("/cart", None);
//! tracker.destroy().await;
//! ```

mod config;
mod error;
mod model;
mod performance;
mod source;
mod tracker;

pub use config::{TrackerConfig, DEFAULT_SAMPLING_RATE};
pub use error::{TrackerError, TrackerResult};
pub use model::{
    element_path, ClickTarget, ElementDescriptor, ErrorKind, ErrorReport, PageContext, UserInfo,
};
pub use performance::{
    LayoutShift, NavigationTiming, PerformanceMetrics, PerformanceMonitor, DEFAULT_SESSION_GAP_MS,
    DEFAULT_SESSION_WINDOW_MS,
};
pub use source::{ChannelSource, EventSource};
pub use tracker::Tracker;
