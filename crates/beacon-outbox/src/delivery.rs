//! Delivery of one batch with bounded retry.

use crate::connectivity::OfflineCoordinator;
use crate::{Event, OutboxError, PersistentQueue, Transport};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{error, info, warn};

/// Why a batch ended up in the persisted queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersistReason {
    /// Offline before (or between) attempts.
    Offline,
    /// Every attempt failed.
    RetriesExhausted,
    /// Teardown interrupted the retry loop.
    ShutDown,
}

/// Terminal state of one [`DeliveryEngine::send`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Delivered { attempts: u32 },
    Persisted { reason: PersistReason, attempts: u32 },
}

/// A retry loop that ended without delivering.
#[derive(Debug)]
pub struct DeliveryFailure {
    pub attempts: u32,
    pub reason: PersistReason,
    pub error: OutboxError,
}

/// Event counters shared with the reporter handle.
#[derive(Debug, Default)]
pub struct DeliveryStats {
    delivered: AtomicU64,
    persisted: AtomicU64,
    attempts: AtomicU64,
}

impl DeliveryStats {
    /// Events acknowledged by the collector.
    pub fn delivered(&self) -> u64 {
        self.delivered.load(Ordering::Relaxed)
    }

    /// Events handed to the persisted queue.
    pub fn persisted(&self) -> u64 {
        self.persisted.load(Ordering::Relaxed)
    }

    /// Transport calls made.
    pub fn attempts(&self) -> u64 {
        self.attempts.load(Ordering::Relaxed)
    }
}

/// Sends batches through a [`Transport`], retrying with linear backoff and
/// falling back to the [`PersistentQueue`].
pub struct DeliveryEngine {
    transport: Arc<dyn Transport>,
    pending: PersistentQueue,
    max_retries: u32,
    backoff_step: Duration,
    shutdown: watch::Receiver<bool>,
    stats: Arc<DeliveryStats>,
}

impl DeliveryEngine {
    pub fn new(
        transport: Arc<dyn Transport>,
        pending: PersistentQueue,
        max_retries: u32,
        backoff_step: Duration,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            transport,
            pending,
            max_retries,
            backoff_step,
            shutdown,
            stats: Arc::new(DeliveryStats::default()),
        }
    }

    pub fn stats(&self) -> Arc<DeliveryStats> {
        self.stats.clone()
    }

    pub fn pending(&self) -> &PersistentQueue {
        &self.pending
    }

    /// Delay before retry number `retry` (starting at 1).
    pub fn backoff_for(&self, retry: u32) -> Duration {
        self.backoff_step.saturating_mul(retry)
    }

    fn is_shutting_down(&self) -> bool {
        *self.shutdown.borrow()
    }

    /// Deliver `batch`, or persist it.
    ///
    /// Offline skips the network entirely. Once teardown has started only a
    /// single attempt is made. Failures never escape; they are logged and
    /// the batch is appended to the persisted queue in its original order.
    pub async fn send(
        &self,
        batch: Vec<Event>,
        connectivity: &OfflineCoordinator,
    ) -> DeliveryOutcome {
        if batch.is_empty() {
            return DeliveryOutcome::Delivered { attempts: 0 };
        }
        let count = batch.len();

        if !connectivity.is_online() {
            info!(count, "Offline, persisting batch without sending");
            self.persist(batch);
            return DeliveryOutcome::Persisted {
                reason: PersistReason::Offline,
                attempts: 0,
            };
        }

        match self.attempt_with_retry(&batch, connectivity).await {
            Ok(attempts) => {
                self.record_delivered(count);
                info!(count, attempts, "Batch delivered");
                DeliveryOutcome::Delivered { attempts }
            }
            Err(failure) => {
                match failure.reason {
                    PersistReason::RetriesExhausted => error!(
                        count,
                        attempts = failure.attempts,
                        error = %failure.error,
                        "Max retries exceeded, persisting batch"
                    ),
                    reason => warn!(
                        count,
                        attempts = failure.attempts,
                        reason = ?reason,
                        error = %failure.error,
                        "Delivery interrupted, persisting batch"
                    ),
                }
                self.persist(batch);
                DeliveryOutcome::Persisted {
                    reason: failure.reason,
                    attempts: failure.attempts,
                }
            }
        }
    }

    /// Try the transport up to `1 + max_retries` times.
    ///
    /// Sleeps `backoff_step * n` before retry `n`. Stops early when the
    /// device goes offline or teardown starts (the backoff sleep is cut short
    /// in that case). Returns the number of attempts made on success.
    pub async fn attempt_with_retry(
        &self,
        events: &[Event],
        connectivity: &OfflineCoordinator,
    ) -> Result<u32, DeliveryFailure> {
        let max_attempts = if self.is_shutting_down() {
            1
        } else {
            self.max_retries.saturating_add(1)
        };
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            self.stats.attempts.fetch_add(1, Ordering::Relaxed);

            let error = match self.transport.deliver(events).await {
                Ok(()) => return Ok(attempt),
                Err(e) => e,
            };

            let stop = if attempt >= max_attempts {
                Some(if self.is_shutting_down() {
                    PersistReason::ShutDown
                } else {
                    PersistReason::RetriesExhausted
                })
            } else if self.is_shutting_down() {
                Some(PersistReason::ShutDown)
            } else if !connectivity.is_online() {
                Some(PersistReason::Offline)
            } else {
                None
            };
            if let Some(reason) = stop {
                return Err(DeliveryFailure {
                    attempts: attempt,
                    reason,
                    error,
                });
            }

            let delay = self.backoff_for(attempt);
            warn!(
                attempt,
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "Send failed, retrying"
            );

            if !self.backoff(delay).await {
                return Err(DeliveryFailure {
                    attempts: attempt,
                    reason: PersistReason::ShutDown,
                    error,
                });
            }
            if !connectivity.is_online() {
                return Err(DeliveryFailure {
                    attempts: attempt,
                    reason: PersistReason::Offline,
                    error,
                });
            }
        }
    }

    /// Sleep for `delay`. Returns `false` if teardown interrupted the sleep.
    async fn backoff(&self, delay: Duration) -> bool {
        let mut shutdown = self.shutdown.clone();
        if *shutdown.borrow() {
            return false;
        }

        tokio::select! {
            _ = tokio::time::sleep(delay) => true,
            _ = async {
                let signalled = shutdown.wait_for(|stop| *stop).await.is_ok();
                // A dropped sender never signals teardown
                if !signalled {
                    std::future::pending::<()>().await;
                }
            } => false,
        }
    }

    fn persist(&self, batch: Vec<Event>) {
        self.record_persisted(batch.len());
        self.pending.append(batch);
    }

    pub(crate) fn record_delivered(&self, count: usize) {
        self.stats.delivered.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_persisted(&self, count: usize) {
        self.stats.persisted.fetch_add(count as u64, Ordering::Relaxed);
    }
}
