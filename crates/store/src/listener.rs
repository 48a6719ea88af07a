//! One-shot registration of the purchase listener.

use std::sync::atomic::{AtomicBool, Ordering};

use crate::client::StoreClient;
use crate::error::ListenerError;
use crate::feed::{PurchaseStream, purchase_channel};

/// Guards the purchase listener so it is registered once per session.
///
/// The store runtime cannot safely stack listeners, so a second
/// [`register`](PurchaseListener::register) is refused here before it ever
/// reaches the binding.
#[derive(Debug, Default)]
pub struct PurchaseListener {
    registered: AtomicBool,
}

impl PurchaseListener {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_registered(&self) -> bool {
        self.registered.load(Ordering::Acquire)
    }

    /// Create a bounded feed, hand its producer half to `store`, return the consumer half.
    pub fn register(
        &self,
        store: &dyn StoreClient,
        capacity: usize,
    ) -> Result<PurchaseStream, ListenerError> {
        if self.registered.swap(true, Ordering::AcqRel) {
            tracing::warn!("purchase listener registration attempted twice");
            return Err(ListenerError::AlreadyRegistered);
        }

        let (feed, stream) = purchase_channel(capacity);
        if let Err(e) = store.set_purchase_listener(feed) {
            self.registered.store(false, Ordering::Release);
            tracing::error!(error = %e, "store refused purchase listener");
            return Err(ListenerError::Store(e));
        }

        tracing::info!(capacity, "purchase listener registered");
        Ok(stream)
    }
}
