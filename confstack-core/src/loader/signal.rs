use std::sync::Arc;

use tokio::sync::watch;

/// One-shot "environment loaded" signal.
///
/// Fired exactly once per load; `wait` may be awaited any number of times and
/// returns immediately once the signal has fired.
#[derive(Debug, Clone)]
pub struct LoadedSignal {
    sender: Arc<watch::Sender<bool>>,
    receiver: watch::Receiver<bool>,
}

impl LoadedSignal {
    pub fn new() -> Self {
        let (sender, receiver) = watch::channel(false);
        Self {
            sender: Arc::new(sender),
            receiver,
        }
    }

    pub(crate) fn fire(&self) {
        let _ = self.sender.send(true);
    }

    pub fn is_loaded(&self) -> bool {
        *self.receiver.borrow()
    }

    pub async fn wait(&self) {
        let mut receiver = self.receiver.clone();
        let _ = receiver.wait_for(|loaded| *loaded).await;
    }
}

impl Default for LoadedSignal {
    fn default() -> Self {
        Self::new()
    }
}
