//! Lifecycle: start, flush, destroy, events after teardown.

use super::harness::{events, ids, test_config, wait_until, MockTransport, TestHarness};
use crate::{ConnectivitySignal, EventKind, EventSink, OutboxError, Reporter, ReporterConfig};
use beacon_storage::{KeyValueStore, MemoryStore};
use std::sync::Arc;
use std::time::{Duration, Instant};

#[tokio::test]
async fn flush_sends_immediately() {
    let harness = TestHarness::new();
    let reporter = harness.start(test_config(10, 60_000));
    let batch = events(3);

    for event in batch.clone() {
        reporter.add(event);
    }
    reporter.flush().await;

    assert_eq!(harness.transport.call_count(), 1);
    assert_eq!(ids(&harness.transport.delivered_events()), ids(&batch));
    assert_eq!(reporter.stats().queued, 0);

    reporter.destroy().await;
}

#[tokio::test]
async fn flush_on_empty_queue_sends_nothing() {
    let harness = TestHarness::new();
    let reporter = harness.start(test_config(10, 60_000));

    reporter.flush().await;
    assert_eq!(harness.transport.call_count(), 0);

    reporter.destroy().await;
}

#[tokio::test]
async fn destroy_flushes_in_memory_events() {
    let harness = TestHarness::new();
    let reporter = harness.start(test_config(10, 60_000));
    let batch = events(3);

    for event in batch.clone() {
        reporter.add(event);
    }
    reporter.destroy().await;

    assert_eq!(ids(&harness.transport.delivered_events()), ids(&batch));
    assert!(reporter.pending_events().is_empty());
}

#[tokio::test]
async fn destroy_makes_one_attempt_per_batch_and_persists_failures() {
    let harness = TestHarness::with_transport(MockTransport::failing());
    let reporter = harness.start(test_config(10, 60_000));
    let batch = events(25);

    // The worker does not run until destroy yields, so every batch is
    // flushed after teardown has started
    for event in batch.clone() {
        reporter.add(event);
    }
    reporter.destroy().await;

    assert!(harness.transport.delivered_batches().is_empty());
    assert_eq!(harness.transport.call_count(), 3);
    assert_eq!(ids(&reporter.pending_events()), ids(&batch));
}

#[tokio::test]
async fn destroy_cuts_retry_backoff_short() {
    let harness = TestHarness::with_transport(MockTransport::failing());
    let mut config = test_config(2, 60_000);
    config.retry_backoff_ms = 60_000;
    let reporter = harness.start(config);
    let batch = events(2);

    for event in batch.clone() {
        reporter.add(event);
    }
    assert!(wait_until(Duration::from_secs(1), || harness.transport.call_count() == 1).await);

    let started = Instant::now();
    reporter.destroy().await;

    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(harness.transport.call_count(), 1);
    assert_eq!(ids(&reporter.pending_events()), ids(&batch));
}

#[tokio::test]
async fn destroy_while_offline_persists_without_sending() {
    let harness = TestHarness::new().offline();
    let reporter = harness.start(test_config(10, 60_000));
    let batch = events(4);

    for event in batch.clone() {
        reporter.add(event);
    }
    reporter.destroy().await;

    assert_eq!(harness.transport.call_count(), 0);
    assert_eq!(ids(&reporter.pending_events()), ids(&batch));
}

#[tokio::test]
async fn events_after_destroy_are_ignored() {
    let harness = TestHarness::new();
    let reporter = harness.start(test_config(1, 60_000));

    reporter.destroy().await;
    assert!(reporter.is_destroyed());

    reporter.add(events(1).remove(0));
    reporter.track(EventKind::Click, Default::default());
    reporter.flush().await;

    assert_eq!(reporter.stats().queued, 0);
    assert_eq!(harness.transport.call_count(), 0);
    assert!(reporter.pending_events().is_empty());
}

#[tokio::test]
async fn destroy_is_idempotent() {
    let harness = TestHarness::new();
    let reporter = harness.start(test_config(10, 60_000));
    reporter.add(events(1).remove(0));

    reporter.destroy().await;
    reporter.clone().destroy().await;

    assert_eq!(harness.transport.call_count(), 1);
}

#[tokio::test]
async fn connectivity_changes_after_destroy_are_ignored() {
    let harness = TestHarness::new().offline();
    let reporter = harness.start(test_config(10, 60_000));
    reporter.add(events(1).remove(0));
    reporter.destroy().await;
    assert_eq!(reporter.pending_events().len(), 1);

    harness.connectivity.set_online();
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert_eq!(harness.transport.call_count(), 0);
    assert_eq!(reporter.pending_events().len(), 1);
}

#[tokio::test]
async fn event_sink_forwards_to_reporter() {
    let harness = TestHarness::new();
    let reporter = harness.start(test_config(10, 60_000));
    let sink: Arc<dyn EventSink> = Arc::new(reporter.clone());

    for event in events(2) {
        sink.on_event(event);
    }
    assert_eq!(reporter.stats().queued, 2);

    reporter.destroy().await;
    assert_eq!(harness.transport.delivered_events().len(), 2);
}

#[tokio::test]
async fn invalid_config_is_rejected_at_start() {
    let harness = TestHarness::new();
    let store: Arc<dyn KeyValueStore> = harness.store.clone();

    let result = Reporter::start(
        ReporterConfig::new("not a url"),
        harness.transport.clone(),
        store,
        &harness.connectivity,
    );
    assert!(matches!(result, Err(OutboxError::Config(_))));
}

#[test]
fn start_outside_runtime_is_a_config_error() {
    let result = Reporter::start(
        ReporterConfig::new("http://collector.test/events"),
        Arc::new(MockTransport::new()),
        Arc::new(MemoryStore::new()),
        &ConnectivitySignal::online(),
    );
    assert!(matches!(result, Err(OutboxError::Config(_))));
}

#[tokio::test]
async fn stats_track_attempts_and_outcomes() {
    let transport = MockTransport::new();
    transport.fail_next(1);
    let harness = TestHarness::with_transport(transport);
    let reporter = harness.start(test_config(2, 60_000));

    for event in events(4) {
        reporter.add(event);
    }
    assert!(wait_until(Duration::from_secs(2), || reporter.stats().delivered == 4).await);

    let stats = reporter.stats();
    assert_eq!(stats.attempts, 3);
    assert_eq!(stats.persisted, 0);
    assert_eq!(stats.dropped, 0);

    reporter.destroy().await;
}
