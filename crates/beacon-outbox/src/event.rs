//! Event records.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::atomic::{AtomicI64, Ordering};

/// Kind of tracked occurrence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    PageView,
    Click,
    Custom,
    Performance,
    Error,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::PageView => "page_view",
            EventKind::Click => "click",
            EventKind::Custom => "custom",
            EventKind::Performance => "performance",
            EventKind::Error => "error",
        }
    }
}

/// Structured payload of an event.
pub type EventData = Map<String, Value>;

static LAST_TIMESTAMP: AtomicI64 = AtomicI64::new(0);

/// Wall-clock milliseconds, never lower than a previously issued value.
fn monotonic_millis() -> i64 {
    let now = chrono::Utc::now().timestamp_millis();
    let previous = LAST_TIMESTAMP.fetch_max(now, Ordering::SeqCst);
    previous.max(now)
}

/// An immutable tracked occurrence.
///
/// Created once by a producer, then moved through the pipeline by value.
/// There are no mutators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    id: String,
    #[serde(rename = "type")]
    kind: EventKind,
    timestamp: i64,
    data: EventData,
}

impl Event {
    /// Create an event with a fresh id and timestamp.
    pub fn new(kind: EventKind, data: EventData) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            kind,
            timestamp: monotonic_millis(),
            data,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn kind(&self) -> EventKind {
        self.kind
    }

    /// Milliseconds since the Unix epoch.
    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    pub fn data(&self) -> &EventData {
        &self.data
    }

    /// Rewrite the payload, keeping id, kind and timestamp.
    pub fn map_data(mut self, f: impl FnOnce(EventData) -> EventData) -> Self {
        self.data = f(std::mem::take(&mut self.data));
        self
    }
}

/// Request body sent to the collector.
#[derive(Debug, Serialize)]
pub(crate) struct BatchEnvelope<'a> {
    pub events: &'a [Event],
    pub timestamp: i64,
}

impl<'a> BatchEnvelope<'a> {
    pub fn new(events: &'a [Event]) -> Self {
        Self {
            events,
            timestamp: chrono::Utc::now().timestamp_millis(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn data(value: Value) -> EventData {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_event_ids_are_unique() {
        let a = Event::new(EventKind::Click, EventData::new());
        let b = Event::new(EventKind::Click, EventData::new());
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn test_timestamps_never_go_backwards() {
        let mut last = 0;
        for _ in 0..1000 {
            let event = Event::new(EventKind::Custom, EventData::new());
            assert!(event.timestamp() >= last);
            last = event.timestamp();
        }
    }

    #[test]
    fn test_map_data_keeps_identity() {
        let event = Event::new(EventKind::Click, data(json!({"x": 1})));
        let (id, timestamp) = (event.id().to_string(), event.timestamp());

        let mapped = event.map_data(|mut d| {
            d.insert("appId".to_string(), json!("shop"));
            d
        });
        assert_eq!(mapped.id(), id);
        assert_eq!(mapped.timestamp(), timestamp);
        assert_eq!(mapped.kind(), EventKind::Click);
        assert_eq!(mapped.data()["x"], 1);
        assert_eq!(mapped.data()["appId"], "shop");
    }

    #[test]
    fn test_event_wire_shape() {
        let event = Event::new(EventKind::PageView, data(json!({"path": "/home"})));
        let value = serde_json::to_value(&event).unwrap();

        assert_eq!(value["type"], "page_view");
        assert_eq!(value["data"]["path"], "/home");
        assert_eq!(value["id"], event.id());
        assert!(value["timestamp"].is_i64());
    }

    #[test]
    fn test_event_kind_names_match_serde() {
        for kind in [
            EventKind::PageView,
            EventKind::Click,
            EventKind::Custom,
            EventKind::Performance,
            EventKind::Error,
        ] {
            let serialized = serde_json::to_value(kind).unwrap();
            assert_eq!(serialized, kind.as_str());
        }
    }

    #[test]
    fn test_envelope_wraps_events() {
        let events = vec![
            Event::new(EventKind::Click, EventData::new()),
            Event::new(EventKind::Error, EventData::new()),
        ];
        let body = serde_json::to_value(BatchEnvelope::new(&events)).unwrap();

        assert_eq!(body["events"].as_array().unwrap().len(), 2);
        assert_eq!(body["events"][0]["id"], events[0].id());
        assert!(body["timestamp"].is_i64());
    }
}
