//! Reporter facade and its worker task.
//!
//! The handle side is synchronous: `add` pushes into the [`BatchScheduler`]
//! under a short lock and only pokes the worker when the push asked for a
//! timer or a flush. The worker task owns everything else (the interval
//! timer, the [`DeliveryEngine`], the [`OfflineCoordinator`] and the
//! persisted queue), so flush cycles, timer expiry and connectivity changes
//! never interleave.

use crate::connectivity::{ConnectivitySignal, OfflineCoordinator, Transition};
use crate::delivery::{DeliveryEngine, DeliveryStats};
use crate::scheduler::{AfterFlush, BatchScheduler, PushOutcome};
use crate::{Event, EventData, EventKind, HttpTransport, OutboxError, OutboxResult, PersistentQueue};
use crate::{ReporterConfig, Transport};
use beacon_storage::KeyValueStore;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info};

/// Narrow capability handed to event producers.
///
/// Producers (error monitors, performance observers, interaction handlers)
/// push finished events; nothing is ever called back on them.
pub trait EventSink: Send + Sync {
    fn on_event(&self, event: Event);
}

/// Point-in-time counters for a reporter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReporterStats {
    /// Events waiting in memory.
    pub queued: usize,
    /// Events dropped by the in-memory overflow policy.
    pub dropped: u64,
    /// Events acknowledged by the collector.
    pub delivered: u64,
    /// Events handed to the persisted queue.
    pub persisted: u64,
    /// Transport calls made.
    pub attempts: u64,
}

enum Command {
    ArmTimer,
    FlushNow,
    Flush(oneshot::Sender<()>),
    Shutdown,
}

/// Scheduler plus the closed flag, guarded together so no event slips in
/// after teardown has drained the queue.
struct Intake {
    scheduler: BatchScheduler,
    closed: bool,
}

struct Shared {
    intake: Arc<Mutex<Intake>>,
    commands: mpsc::UnboundedSender<Command>,
    shutdown: watch::Sender<bool>,
    stats: Arc<DeliveryStats>,
    pending: PersistentQueue,
    worker: Mutex<Option<JoinHandle<()>>>,
}

/// Batches events and delivers them in the background.
///
/// Cheap to clone; all clones drive the same worker. Must be started inside a
/// tokio runtime.
#[derive(Clone)]
pub struct Reporter {
    shared: Arc<Shared>,
}

impl Reporter {
    /// Validate `config` and spawn the worker.
    ///
    /// Configuration problems are the only errors surfaced here; everything
    /// after start is absorbed and logged.
    pub fn start(
        config: ReporterConfig,
        transport: Arc<dyn Transport>,
        store: Arc<dyn KeyValueStore>,
        connectivity: &ConnectivitySignal,
    ) -> OutboxResult<Self> {
        config.validate()?;
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| OutboxError::Config(format!("reporter needs a tokio runtime: {}", e)))?;

        let pending = PersistentQueue::new(store, config.storage_key.clone());
        let (shutdown, shutdown_rx) = watch::channel(false);
        let engine = DeliveryEngine::new(
            transport,
            pending.clone(),
            config.max_retries,
            config.retry_backoff(),
            shutdown_rx,
        );
        let stats = engine.stats();

        let intake = Arc::new(Mutex::new(Intake {
            scheduler: BatchScheduler::new(config.batch_size, config.max_queue_size),
            closed: false,
        }));
        let (commands, receiver) = mpsc::unbounded_channel();

        let worker = Worker {
            intake: intake.clone(),
            engine,
            coordinator: OfflineCoordinator::attach(connectivity),
            interval: config.report_interval(),
            batch_size: config.batch_size,
            deadline: None,
            commands: receiver,
        };
        let handle = runtime.spawn(worker.run());

        info!(
            report_url = %config.report_url,
            batch_size = config.batch_size,
            report_interval_ms = config.report_interval_ms,
            max_retries = config.max_retries,
            "Reporter started"
        );

        Ok(Self {
            shared: Arc::new(Shared {
                intake,
                commands,
                shutdown,
                stats,
                pending,
                worker: Mutex::new(Some(handle)),
            }),
        })
    }

    /// [`Reporter::start`] with an [`HttpTransport`] built from `config`.
    pub fn start_http(
        config: ReporterConfig,
        store: Arc<dyn KeyValueStore>,
        connectivity: &ConnectivitySignal,
    ) -> OutboxResult<Self> {
        config.validate()?;
        let transport = Arc::new(HttpTransport::new(&config)?);
        Self::start(config, transport, store, connectivity)
    }

    /// Queue an event. Never fails; ignored once destroyed.
    pub fn add(&self, event: Event) {
        let outcome = {
            let mut intake = self.shared.intake.lock();
            if intake.closed {
                debug!(event_id = %event.id(), "Reporter destroyed, ignoring event");
                return;
            }
            intake.scheduler.push(event)
        };

        let command = match outcome {
            PushOutcome::FlushNow => Command::FlushNow,
            PushOutcome::ArmTimer => Command::ArmTimer,
            PushOutcome::Queued | PushOutcome::Coalesced => return,
        };
        if self.shared.commands.send(command).is_err() {
            debug!("Reporter worker gone, event stays queued");
        }
    }

    /// Build an event from `kind` and `data` and queue it.
    pub fn track(&self, kind: EventKind, data: EventData) {
        self.add(Event::new(kind, data));
    }

    /// Run one flush cycle now, regardless of timer or threshold, and wait
    /// for it to finish.
    pub async fn flush(&self) {
        if self.is_destroyed() {
            return;
        }
        let (ack, done) = oneshot::channel();
        if self.shared.commands.send(Command::Flush(ack)).is_err() {
            return;
        }
        let _ = done.await;
    }

    /// Tear down: cut short any retry backoff, stop the timer, detach from
    /// connectivity and make one final attempt per in-memory batch. Anything
    /// that cannot be delivered is persisted. Idempotent.
    pub async fn destroy(&self) {
        {
            let mut intake = self.shared.intake.lock();
            if intake.closed {
                debug!("Reporter already destroyed");
                return;
            }
            intake.closed = true;
        }

        info!("Destroying reporter");
        self.shared.shutdown.send_replace(true);
        let _ = self.shared.commands.send(Command::Shutdown);

        let handle = self.shared.worker.lock().take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                error!(error = %e, "Reporter worker failed");
            }
        }
        info!("Reporter destroyed");
    }

    pub fn is_destroyed(&self) -> bool {
        self.shared.intake.lock().closed
    }

    pub fn stats(&self) -> ReporterStats {
        let (queued, dropped) = {
            let intake = self.shared.intake.lock();
            (intake.scheduler.len(), intake.scheduler.dropped())
        };
        ReporterStats {
            queued,
            dropped,
            delivered: self.shared.stats.delivered(),
            persisted: self.shared.stats.persisted(),
            attempts: self.shared.stats.attempts(),
        }
    }

    /// Events currently in the persisted queue, oldest first.
    pub fn pending_events(&self) -> Vec<Event> {
        self.shared.pending.snapshot()
    }
}

impl EventSink for Reporter {
    fn on_event(&self, event: Event) {
        self.add(event);
    }
}

struct Worker {
    intake: Arc<Mutex<Intake>>,
    engine: DeliveryEngine,
    coordinator: OfflineCoordinator,
    interval: Duration,
    batch_size: usize,
    deadline: Option<Instant>,
    commands: mpsc::UnboundedReceiver<Command>,
}

impl Worker {
    async fn run(mut self) {
        // Events left behind by a previous instance go out before new ones
        if self.coordinator.is_online() && !self.engine.pending().is_empty() {
            self.coordinator.replay(&self.engine, self.engine.pending()).await;
        }

        loop {
            let deadline = self.deadline;
            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(Command::ArmTimer) => self.arm_timer(),
                    Some(Command::FlushNow) => {
                        debug!("Batch threshold reached");
                        self.flush_cycle().await;
                    }
                    Some(Command::Flush(ack)) => {
                        self.flush_cycle().await;
                        let _ = ack.send(());
                    }
                    Some(Command::Shutdown) | None => {
                        self.shutdown().await;
                        return;
                    }
                },
                _ = wait_until(deadline) => {
                    debug!("Report interval elapsed");
                    self.deadline = None;
                    self.flush_cycle().await;
                }
                transition = self.coordinator.changed() => {
                    if transition == Transition::Reconnected {
                        self.coordinator.replay(&self.engine, self.engine.pending()).await;
                    }
                }
            }
        }
    }

    fn arm_timer(&mut self) {
        if self.deadline.is_none() && !self.intake.lock().scheduler.is_empty() {
            self.deadline = Some(Instant::now() + self.interval);
        }
    }

    /// Flush batches until the scheduler says stop. Re-arms the timer when a
    /// remainder below the threshold is left.
    async fn flush_cycle(&mut self) {
        loop {
            let batch = self.intake.lock().scheduler.begin_flush();
            let Some(batch) = batch else {
                return;
            };
            self.deadline = None;

            self.engine.send(batch, &self.coordinator).await;

            let next = self.intake.lock().scheduler.finish_flush();
            match next {
                AfterFlush::FlushAgain => continue,
                AfterFlush::ArmTimer => {
                    self.arm_timer();
                    return;
                }
                AfterFlush::Idle => return,
            }
        }
    }

    async fn shutdown(&mut self) {
        self.deadline = None;
        self.coordinator.detach();

        let remaining = self.intake.lock().scheduler.drain_all();
        if remaining.is_empty() {
            return;
        }
        info!(count = remaining.len(), "Final flush");
        for batch in remaining.chunks(self.batch_size) {
            self.engine.send(batch.to_vec(), &self.coordinator).await;
        }
    }
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
