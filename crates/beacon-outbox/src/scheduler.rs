//! In-memory batching.
//!
//! `BatchScheduler` is a plain state machine. It decides *when* a flush is
//! due; the reporter worker owns the timer and performs the flush.

use crate::Event;
use std::collections::VecDeque;
use tracing::{debug, warn};

/// Whether a flush is currently in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushState {
    Idle,
    Flushing,
}

/// What the caller should do after [`BatchScheduler::push`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    /// Threshold reached: flush now and cancel any timer.
    FlushNow,
    /// First event in an idle queue: arm the interval timer.
    ArmTimer,
    /// Nothing to do; a timer is already pending.
    Queued,
    /// Threshold reached during a flush; the current cycle will pick it up.
    Coalesced,
}

/// What the caller should do after [`BatchScheduler::finish_flush`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AfterFlush {
    /// Start another cycle right away.
    FlushAgain,
    /// Events remain below the threshold: re-arm the timer.
    ArmTimer,
    /// Queue is empty.
    Idle,
}

/// FIFO of events waiting to be flushed.
#[derive(Debug)]
pub struct BatchScheduler {
    queue: VecDeque<Event>,
    batch_size: usize,
    max_queue_size: usize,
    dropped: u64,
    state: FlushState,
    dirty: bool,
}

impl BatchScheduler {
    pub fn new(batch_size: usize, max_queue_size: usize) -> Self {
        Self {
            queue: VecDeque::new(),
            batch_size: batch_size.max(1),
            max_queue_size: max_queue_size.max(batch_size.max(1)),
            dropped: 0,
            state: FlushState::Idle,
            dirty: false,
        }
    }

    /// Queue an event and report which trigger, if any, it fired.
    pub fn push(&mut self, event: Event) -> PushOutcome {
        let was_empty = self.queue.is_empty();
        self.queue.push_back(event);

        while self.queue.len() > self.max_queue_size {
            if let Some(oldest) = self.queue.pop_front() {
                self.dropped += 1;
                warn!(
                    event_id = %oldest.id(),
                    dropped_total = self.dropped,
                    max_queue_size = self.max_queue_size,
                    "Queue full, dropping oldest event"
                );
            }
        }

        if self.queue.len() >= self.batch_size {
            if self.state == FlushState::Flushing {
                self.dirty = true;
                return PushOutcome::Coalesced;
            }
            return PushOutcome::FlushNow;
        }

        if was_empty && self.state == FlushState::Idle {
            PushOutcome::ArmTimer
        } else {
            PushOutcome::Queued
        }
    }

    /// Take the next batch of up to `batch_size` events.
    ///
    /// Returns `None` when the queue is empty, or when a flush is already in
    /// flight (the request is recorded and served by that flush's next cycle).
    pub fn begin_flush(&mut self) -> Option<Vec<Event>> {
        if self.state == FlushState::Flushing {
            self.dirty = true;
            debug!("Flush already in flight, coalescing request");
            return None;
        }
        if self.queue.is_empty() {
            return None;
        }

        let take = self.queue.len().min(self.batch_size);
        let batch: Vec<Event> = self.queue.drain(..take).collect();
        self.state = FlushState::Flushing;
        self.dirty = false;

        debug!(batch_size = batch.len(), remaining = self.queue.len(), "Created batch");
        Some(batch)
    }

    /// Mark the in-flight flush as finished and decide what follows.
    pub fn finish_flush(&mut self) -> AfterFlush {
        self.state = FlushState::Idle;
        let dirty = std::mem::take(&mut self.dirty);

        if self.queue.is_empty() {
            AfterFlush::Idle
        } else if dirty || self.queue.len() >= self.batch_size {
            AfterFlush::FlushAgain
        } else {
            AfterFlush::ArmTimer
        }
    }

    /// Remove every queued event (teardown).
    pub fn drain_all(&mut self) -> Vec<Event> {
        self.dirty = false;
        self.queue.drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Events dropped by the overflow policy so far.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    pub fn state(&self) -> FlushState {
        self.state
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }
}
