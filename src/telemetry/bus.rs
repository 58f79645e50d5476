//! In-process event bus for channel telemetry.

use serde_json::Value;
use tokio::sync::broadcast;

use crate::telemetry::events::ChannelEvent;

const DEFAULT_CAPACITY: usize = 256;

/// Fan-out bus; emitting with no subscribers is not an error.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<ChannelEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChannelEvent> {
        self.sender.subscribe()
    }

    pub fn emit_best_effort(&self, event_type: impl Into<String>, data: Value) {
        let _ = self.sender.send(ChannelEvent::with_now(event_type, data));
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
