//! The tracker facade.

use crate::model::{to_data, ClickTarget, ErrorReport, PageContext, UserInfo};
use crate::performance::PerformanceMetrics;
use crate::source::EventSource;
use crate::{TrackerConfig, TrackerError, TrackerResult};
use beacon_outbox::{
    ConnectivitySignal, Event, EventData, EventKind, EventSink, Reporter, Transport,
};
use beacon_storage::{KeyValueStore, PrefixedStorage};
use parking_lot::{Mutex, RwLock};
use rand::Rng;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Identity key inside the prefixed namespace.
const USER_KEY: &str = "user";

struct Active {
    config: TrackerConfig,
    reporter: Reporter,
}

struct TrackerInner {
    identity: PrefixedStorage,
    active: RwLock<Option<Active>>,
    page: RwLock<PageContext>,
    sources: Mutex<Vec<Box<dyn EventSource>>>,
}

/// Entry point for hosts: track events, manage identity, own the reporter.
///
/// Cheap to clone. Nothing is sent until [`Tracker::init`].
#[derive(Clone)]
pub struct Tracker {
    inner: Arc<TrackerInner>,
}

impl Tracker {
    /// Create an uninitialised tracker keeping identity in `identity`.
    pub fn new(identity: PrefixedStorage) -> Self {
        Self {
            inner: Arc::new(TrackerInner {
                identity,
                active: RwLock::new(None),
                page: RwLock::new(PageContext::default()),
                sources: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Validate `config` and start delivering through `transport`.
    pub fn init(
        &self,
        config: TrackerConfig,
        transport: Arc<dyn Transport>,
        store: Arc<dyn KeyValueStore>,
        connectivity: &ConnectivitySignal,
    ) -> TrackerResult<()> {
        let mut active = self.inner.active.write();
        if active.is_some() {
            warn!("Tracker has already been initialized");
            return Err(TrackerError::AlreadyInitialized);
        }
        config.validate()?;

        let reporter = Reporter::start(config.reporter.clone(), transport, store, connectivity)?;
        info!(app_id = %config.app_id, sampling_rate = config.sampling_rate, "Tracker initialized");
        if config.debug {
            info!(config = ?config, "Tracker debug mode on");
        }
        *active = Some(Active { config, reporter });
        Ok(())
    }

    /// [`Tracker::init`] with the HTTP transport.
    pub fn init_http(
        &self,
        config: TrackerConfig,
        store: Arc<dyn KeyValueStore>,
        connectivity: &ConnectivitySignal,
    ) -> TrackerResult<()> {
        config.validate()?;
        let transport = Arc::new(beacon_outbox::HttpTransport::new(&config.reporter)?);
        self.init(config, transport, store, connectivity)
    }

    pub fn is_initialized(&self) -> bool {
        self.inner.active.read().is_some()
    }

    /// Sample, enrich and queue an event. Never fails.
    pub fn track(&self, kind: EventKind, data: EventData) {
        self.submit(Event::new(kind, data));
    }

    pub fn track_page_view(&self, path: &str, performance: Option<PerformanceMetrics>) {
        let mut data = EventData::new();
        data.insert("path".to_string(), json!(path));
        data.insert(
            "performance".to_string(),
            Value::Object(performance.map(|m| to_data(&m)).unwrap_or_default()),
        );
        self.track(EventKind::PageView, data);
    }

    pub fn track_click(&self, target: &ClickTarget) {
        self.track(EventKind::Click, to_data(target));
    }

    pub fn track_error(&self, report: &ErrorReport) {
        self.track(EventKind::Error, to_data(report));
    }

    pub fn track_performance(&self, metrics: &PerformanceMetrics) {
        self.track(EventKind::Performance, to_data(metrics));
    }

    pub fn set_page_context(&self, page: PageContext) {
        *self.inner.page.write() = page;
    }

    /// Merge `update` into the stored user.
    pub fn set_user(&self, update: UserInfo) {
        let merged = self.user().unwrap_or_default().merge(update);
        self.inner.identity.set(USER_KEY, &merged);
    }

    pub fn user(&self) -> Option<UserInfo> {
        self.inner.identity.get(USER_KEY)
    }

    pub fn clear_user(&self) {
        self.inner.identity.remove(USER_KEY);
    }

    /// Subscribe to a producer. Its events go through sampling and enrichment.
    pub fn attach_source(&self, mut source: Box<dyn EventSource>) -> TrackerResult<()> {
        if !self.is_initialized() {
            return Err(TrackerError::NotInitialized);
        }
        source.attach(Arc::new(self.clone()));
        debug!(source = source.name(), "Event source attached");
        self.inner.sources.lock().push(source);
        Ok(())
    }

    pub fn reporter(&self) -> Option<Reporter> {
        self.inner.active.read().as_ref().map(|a| a.reporter.clone())
    }

    /// Detach sources, run the reporter's final flush and clear identity.
    /// A no-op when not initialised.
    pub async fn destroy(&self) {
        let Some(active) = self.inner.active.write().take() else {
            return;
        };

        let sources: Vec<Box<dyn EventSource>> = std::mem::take(&mut *self.inner.sources.lock());
        for mut source in sources {
            source.detach();
        }

        active.reporter.destroy().await;
        self.inner.identity.clear();
        info!(app_id = %active.config.app_id, "Tracker destroyed");
    }

    /// Page context, then app id, then stored user on top of `data`.
    /// Sample, enrich and queue `event`. Id and timestamp are kept as the
    /// producer set them.
    fn submit(&self, event: Event) {
        let active = self.inner.active.read();
        let Some(active) = active.as_ref() else {
            warn!(kind = event.kind().as_str(), "Tracker not initialized, dropping event");
            return;
        };

        if !sampled(active.config.sampling_rate) {
            debug!(kind = event.kind().as_str(), "Event sampled out");
            return;
        }

        let event = event.map_data(|data| self.enrich(data, &active.config.app_id));
        if active.config.debug {
            info!(event_id = %event.id(), kind = event.kind().as_str(), "Event tracked");
        }
        active.reporter.add(event);
    }

    fn enrich(&self, mut data: EventData, app_id: &str) -> EventData {
        data.extend(to_data(&*self.inner.page.read()));
        data.insert("appId".to_string(), json!(app_id));
        if let Some(user) = self.user() {
            data.extend(to_data(&user));
        }
        data
    }
}

impl EventSink for Tracker {
    fn on_event(&self, event: Event) {
        self.submit(event);
    }
}

fn sampled(rate: f64) -> bool {
    if rate >= 1.0 {
        return true;
    }
    if rate <= 0.0 {
        return false;
    }
    rand::thread_rng().gen::<f64>() < rate
}
