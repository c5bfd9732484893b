//! Scenario tests for the delivery pipeline.
//!
//! - `harness.rs`     - Mock transport, in-memory store and reporter setup
//! - `batching.rs`    - Threshold and interval flushes, FIFO batches, overflow
//! - `retry.rs`       - Linear backoff, exhaustion, no silent loss
//! - `offline.rs`     - Offline deferral, reconnect replay
//! - `persistence.rs` - Persisted queue across reporter instances
//! - `lifecycle.rs`   - flush, destroy, events after teardown

mod lifecycle;
mod retry;
