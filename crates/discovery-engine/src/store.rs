use tokio::sync::watch;

use crate::view::ViewModel;

/// Receives every view model the engine publishes.
pub trait StateStore: Send + Sync {
    fn publish(&self, view: &ViewModel);
}

/// Keeps the latest view model in a `watch` channel.
pub struct WatchStore {
    tx: watch::Sender<ViewModel>,
}

impl WatchStore {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(ViewModel::default());
        Self { tx }
    }

    pub fn subscribe(&self) -> watch::Receiver<ViewModel> {
        self.tx.subscribe()
    }

    pub fn latest(&self) -> ViewModel {
        self.tx.borrow().clone()
    }
}

impl Default for WatchStore {
    fn default() -> Self {
        Self::new()
    }
}

impl StateStore for WatchStore {
    fn publish(&self, view: &ViewModel) {
        self.tx.send_replace(view.clone());
    }
}
