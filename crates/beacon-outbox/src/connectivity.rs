//! Connectivity tracking and replay of the persisted queue.

use crate::delivery::DeliveryEngine;
use crate::PersistentQueue;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Network reachability as reported by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Connectivity {
    Online,
    Offline,
}

/// Host-side handle for reporting connectivity changes.
///
/// Cloneable; hosts call [`ConnectivitySignal::report`] from whatever
/// callback tells them the network came or went.
#[derive(Debug, Clone)]
pub struct ConnectivitySignal {
    sender: watch::Sender<Connectivity>,
}

impl ConnectivitySignal {
    pub fn new(initial: Connectivity) -> Self {
        let (sender, _) = watch::channel(initial);
        Self { sender }
    }

    /// A signal that starts online.
    pub fn online() -> Self {
        Self::new(Connectivity::Online)
    }

    /// Report the current state. Repeating the current state does not wake
    /// subscribers.
    pub fn report(&self, state: Connectivity) {
        self.sender.send_if_modified(|current| {
            if *current == state {
                false
            } else {
                *current = state;
                true
            }
        });
    }

    pub fn set_online(&self) {
        self.report(Connectivity::Online);
    }

    pub fn set_offline(&self) {
        self.report(Connectivity::Offline);
    }

    pub fn current(&self) -> Connectivity {
        *self.sender.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<Connectivity> {
        self.sender.subscribe()
    }
}

impl Default for ConnectivitySignal {
    fn default() -> Self {
        Self::online()
    }
}

/// Result of observing a connectivity value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// `Offline -> Online`: replay is due.
    Reconnected,
    /// `Online -> Offline`: later flushes skip the network.
    Disconnected,
    /// Same state as before.
    Unchanged,
}

/// Tracks `ONLINE`/`OFFLINE` and replays the persisted queue on reconnect.
#[derive(Debug)]
pub struct OfflineCoordinator {
    receiver: Option<watch::Receiver<Connectivity>>,
    state: Connectivity,
}

impl OfflineCoordinator {
    /// Attach to `signal`, taking its current value as the initial state.
    pub fn attach(signal: &ConnectivitySignal) -> Self {
        let receiver = signal.subscribe();
        let state = *receiver.borrow();
        Self {
            receiver: Some(receiver),
            state,
        }
    }

    /// Last observed state.
    pub fn state(&self) -> Connectivity {
        self.state
    }

    /// Live reading of the signal (falls back to the last observed state
    /// once detached).
    pub fn is_online(&self) -> bool {
        match &self.receiver {
            Some(receiver) => *receiver.borrow() == Connectivity::Online,
            None => self.state == Connectivity::Online,
        }
    }

    /// Record `next` and classify the transition.
    pub fn observe(&mut self, next: Connectivity) -> Transition {
        let previous = std::mem::replace(&mut self.state, next);
        match (previous, next) {
            (Connectivity::Offline, Connectivity::Online) => {
                info!("Connectivity restored");
                Transition::Reconnected
            }
            (Connectivity::Online, Connectivity::Offline) => {
                info!("Connectivity lost, deferring delivery");
                Transition::Disconnected
            }
            _ => Transition::Unchanged,
        }
    }

    /// Wait for the next signal change and classify it.
    ///
    /// Pends forever once detached or when the signal's owner is gone, so it
    /// can sit in a `select!` unconditionally.
    pub async fn changed(&mut self) -> Transition {
        let next = match self.receiver.as_mut() {
            Some(receiver) => match receiver.changed().await {
                Ok(()) => *receiver.borrow_and_update(),
                Err(_) => {
                    debug!("Connectivity signal dropped, detaching");
                    self.receiver = None;
                    return std::future::pending().await;
                }
            },
            None => return std::future::pending().await,
        };
        if next == self.state && next == Connectivity::Online {
            // Went offline and back between two observations
            info!("Connectivity bounced");
            return Transition::Reconnected;
        }
        self.observe(next)
    }

    /// Stop listening to the signal.
    pub fn detach(&mut self) {
        if self.receiver.take().is_some() {
            debug!("Connectivity listener detached");
        }
    }

    pub fn is_attached(&self) -> bool {
        self.receiver.is_some()
    }

    /// Drain the persisted queue and redeliver it as one batch.
    ///
    /// On failure the drained events are put back ahead of anything persisted
    /// in the meantime. Returns the number of events delivered.
    pub async fn replay(&self, engine: &DeliveryEngine, pending: &PersistentQueue) -> usize {
        let events = pending.drain_all();
        if events.is_empty() {
            return 0;
        }

        let count = events.len();
        info!(count, "Replaying persisted events");

        match engine.attempt_with_retry(&events, self).await {
            Ok(attempts) => {
                engine.record_delivered(count);
                info!(count, attempts, "Replay delivered");
                count
            }
            Err(failure) => {
                warn!(
                    count,
                    attempts = failure.attempts,
                    error = %failure.error,
                    "Replay failed, re-persisting events"
                );
                pending.prepend(events);
                0
            }
        }
    }
}
