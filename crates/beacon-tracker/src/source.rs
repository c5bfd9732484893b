//! Event sources: producers the tracker subscribes to explicitly.

use beacon_outbox::{Event, EventSink};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// A producer of events (error monitor, performance observer, interaction
/// handler). Attached with a sink while the tracker runs, detached on
/// teardown.
pub trait EventSource: Send {
    fn name(&self) -> &str;

    /// Start forwarding events into `sink`.
    fn attach(&mut self, sink: Arc<dyn EventSink>);

    /// Stop forwarding. Must be safe to call more than once.
    fn detach(&mut self);
}

/// Source fed through a channel, for producers living elsewhere in the host.
pub struct ChannelSource {
    name: String,
    receiver: Option<mpsc::UnboundedReceiver<Event>>,
    task: Option<JoinHandle<()>>,
}

impl ChannelSource {
    /// Create a source and the sender producers push into.
    pub fn new(name: impl Into<String>) -> (Self, mpsc::UnboundedSender<Event>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let source = Self {
            name: name.into(),
            receiver: Some(receiver),
            task: None,
        };
        (source, sender)
    }

    pub fn is_attached(&self) -> bool {
        self.task.is_some()
    }
}

impl EventSource for ChannelSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn attach(&mut self, sink: Arc<dyn EventSink>) {
        let Some(mut receiver) = self.receiver.take() else {
            warn!(source = %self.name, "Source already attached once");
            return;
        };
        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(runtime) => runtime,
            Err(e) => {
                warn!(source = %self.name, error = %e, "No runtime, source not attached");
                self.receiver = Some(receiver);
                return;
            }
        };

        let name = self.name.clone();
        self.task = Some(runtime.spawn(async move {
            while let Some(event) = receiver.recv().await {
                sink.on_event(event);
            }
            debug!(source = %name, "Source channel closed");
        }));
        debug!(source = %self.name, "Source attached");
    }

    fn detach(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            debug!(source = %self.name, "Source detached");
        }
    }
}

impl Drop for ChannelSource {
    fn drop(&mut self) {
        self.detach();
    }
}
