//! Retry: linear backoff, exhaustion, no silent loss.

use super::harness::{
    events, ids, test_config, wait_until, MockTransport, TestHarness, TransportResponse,
};
use std::collections::HashSet;
use std::time::{Duration, Instant};

#[tokio::test]
async fn fails_twice_then_succeeds() {
    let transport = MockTransport::new();
    transport.fail_next(2);
    let harness = TestHarness::with_transport(transport);
    let mut config = test_config(2, 60_000);
    config.max_retries = 3;
    let reporter = harness.start(config);

    for event in events(2) {
        reporter.add(event);
    }

    let transport = harness.transport.clone();
    assert!(wait_until(Duration::from_secs(2), || transport.delivered_batches().len() == 1).await);
    assert_eq!(harness.transport.call_count(), 3);
    assert!(reporter.pending_events().is_empty());

    let stats = reporter.stats();
    assert_eq!(stats.delivered, 2);
    assert_eq!(stats.persisted, 0);
    assert_eq!(stats.attempts, 3);

    reporter.destroy().await;
}

#[tokio::test]
async fn always_failing_transport_persists_full_batch() {
    let harness = TestHarness::with_transport(MockTransport::failing());
    let mut config = test_config(3, 60_000);
    config.max_retries = 3;
    let reporter = harness.start(config);
    let batch = events(3);

    for event in batch.clone() {
        reporter.add(event);
    }

    assert!(wait_until(Duration::from_secs(2), || reporter.pending_events().len() == 3).await);
    assert_eq!(harness.transport.call_count(), 4);
    assert!(harness.transport.delivered_batches().is_empty());
    assert_eq!(ids(&reporter.pending_events()), ids(&batch));
    assert_eq!(reporter.pending_events(), batch);

    reporter.destroy().await;
}

#[tokio::test]
async fn zero_retries_makes_a_single_attempt() {
    let harness = TestHarness::with_transport(MockTransport::failing());
    let mut config = test_config(1, 60_000);
    config.max_retries = 0;
    let reporter = harness.start(config);

    reporter.add(events(1).remove(0));

    assert!(wait_until(Duration::from_secs(1), || reporter.pending_events().len() == 1).await);
    assert_eq!(harness.transport.call_count(), 1);

    reporter.destroy().await;
}

#[tokio::test]
async fn backoff_grows_linearly_between_attempts() {
    let harness = TestHarness::with_transport(MockTransport::failing());
    let mut config = test_config(1, 60_000);
    config.max_retries = 3;
    config.retry_backoff_ms = 20;
    let reporter = harness.start(config);

    let started = Instant::now();
    reporter.add(events(1).remove(0));
    assert!(wait_until(Duration::from_secs(2), || reporter.pending_events().len() == 1).await);

    // 20 + 40 + 60 ms of backoff before the three retries
    assert!(started.elapsed() >= Duration::from_millis(120));
    assert_eq!(harness.transport.call_count(), 4);

    reporter.destroy().await;
}

#[tokio::test]
async fn later_batch_may_overtake_a_deferred_one() {
    let transport = MockTransport::new();
    transport.fail_next(2);
    let harness = TestHarness::with_transport(transport);
    let mut config = test_config(2, 60_000);
    config.max_retries = 1;
    let reporter = harness.start(config);
    let batch = events(4);

    for event in batch.clone() {
        reporter.add(event);
    }

    let transport = harness.transport.clone();
    assert!(wait_until(Duration::from_secs(2), || transport.delivered_batches().len() == 1).await);
    assert_eq!(ids(&harness.transport.delivered_events()), ids(&batch[2..]));
    assert_eq!(ids(&reporter.pending_events()), ids(&batch[..2]));

    reporter.destroy().await;
}

#[tokio::test]
async fn every_event_is_delivered_or_persisted() {
    let transport = MockTransport::new();
    for response in [
        TransportResponse::Reject,
        TransportResponse::Accept,
        TransportResponse::Reject,
        TransportResponse::Reject,
        TransportResponse::Accept,
    ] {
        transport.queue_response(response);
    }
    transport.set_default_response(TransportResponse::Reject);
    let harness = TestHarness::with_transport(transport);
    let mut config = test_config(4, 20);
    config.max_retries = 1;
    let reporter = harness.start(config);
    let added = events(23);

    for (i, event) in added.iter().cloned().enumerate() {
        reporter.add(event);
        if i % 5 == 0 {
            tokio::time::sleep(Duration::from_millis(3)).await;
        }
    }
    reporter.destroy().await;

    let mut seen: Vec<String> = ids(&harness.transport.delivered_events());
    seen.extend(ids(&reporter.pending_events()));
    let unique: HashSet<&String> = seen.iter().collect();
    assert_eq!(seen.len(), added.len());
    assert_eq!(unique.len(), added.len());
    for id in ids(&added) {
        assert!(unique.contains(&id));
    }
}
