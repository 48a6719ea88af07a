//! The shared "a purchase is in flight" flag.

use std::sync::Arc;

use tokio::sync::watch;

/// Advisory flag read by UI collaborators to gate new purchase attempts.
///
/// Clones share the same flag. Anyone may read or subscribe; only this crate
/// writes it: the session when a purchase starts (or on explicit
/// `set_processing`), the worker after every batch, the processor on
/// validation failure. It is not a lock.
#[derive(Debug, Clone)]
pub struct ProcessingState {
    flag: Arc<watch::Sender<bool>>,
}

impl ProcessingState {
    pub(crate) fn new() -> Self {
        let (flag, _) = watch::channel(false);
        Self {
            flag: Arc::new(flag),
        }
    }

    pub fn is_processing(&self) -> bool {
        *self.flag.borrow()
    }

    /// Observe every change of the flag.
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.flag.subscribe()
    }

    pub(crate) fn set(&self, value: bool) {
        self.flag.send_if_modified(|current| {
            let changed = *current != value;
            *current = value;
            changed
        });
    }

    pub(crate) fn begin(&self) {
        self.set(true);
    }

    pub(crate) fn clear(&self) {
        self.set(false);
    }
}
