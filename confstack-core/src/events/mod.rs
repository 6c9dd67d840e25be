//! Configuration change notification.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::broadcast;

/// Dispatched exactly once per completed `set`, after the mutation reached
/// every backing store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigChangeEvent {
    pub path: String,
    pub old_value: Option<Value>,
    pub new_value: Value,
}

/// Multicast change stream. Subscribers only see events published after they
/// subscribed; the stream never completes on its own.
#[derive(Clone)]
pub struct ChangeBus {
    sender: broadcast::Sender<ConfigChangeEvent>,
}

impl ChangeBus {
    pub fn new(buffer_size: usize) -> Self {
        let (sender, _) = broadcast::channel(buffer_size.max(1));
        Self { sender }
    }

    pub fn publish(&self, event: ConfigChangeEvent) {
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ConfigChangeEvent> {
        self.sender.subscribe()
    }
}

impl Default for ChangeBus {
    fn default() -> Self {
        Self::new(16)
    }
}
