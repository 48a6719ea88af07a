//! Purchase feed: the channel a store binding pushes purchase batches into.
//!
//! The store runtime delivers purchase results whenever it wants (new
//! purchases, restored purchases, cancellations, errors). Instead of invoking
//! application code from inside the store callback, the binding posts each
//! batch into a **bounded** channel and a single consumer drains it.
//!
//! ## Delivery Guarantees
//!
//! - **Bounded**: a slow consumer applies backpressure to the binding
//!   (`post` waits, `try_post` hands the batch back with [`FeedError::Full`]).
//! - **Ordered**: batches are received in the order they were posted.
//! - **At-least-once upstream**: the store redelivers unacknowledged purchases,
//!   so the consumer must tolerate the same transaction arriving more than once.

use iapkit_core::PurchaseBatch;
use tokio::sync::mpsc;

use crate::error::FeedError;

/// Producer half, handed to the store binding.
#[derive(Debug, Clone)]
pub struct PurchaseFeed {
    sender: mpsc::Sender<PurchaseBatch>,
}

impl PurchaseFeed {
    /// Post a batch, waiting for capacity if the consumer is behind.
    pub async fn post(&self, batch: PurchaseBatch) -> Result<(), FeedError> {
        self.sender
            .send(batch)
            .await
            .map_err(|mpsc::error::SendError(batch)| FeedError::Closed(batch))
    }

    /// Post a batch without waiting.
    pub fn try_post(&self, batch: PurchaseBatch) -> Result<(), FeedError> {
        self.sender.try_send(batch).map_err(|e| match e {
            mpsc::error::TrySendError::Full(batch) => FeedError::Full(batch),
            mpsc::error::TrySendError::Closed(batch) => FeedError::Closed(batch),
        })
    }

    /// Whether the consumer side has gone away.
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

/// Consumer half, drained by exactly one task.
#[derive(Debug)]
pub struct PurchaseStream {
    receiver: mpsc::Receiver<PurchaseBatch>,
}

impl PurchaseStream {
    /// Wait for the next batch. `None` once every feed handle is dropped.
    pub async fn recv(&mut self) -> Option<PurchaseBatch> {
        self.receiver.recv().await
    }

    /// Take a batch if one is already queued.
    pub fn try_recv(&mut self) -> Option<PurchaseBatch> {
        self.receiver.try_recv().ok()
    }

    /// Stop accepting new batches; already queued ones can still be drained.
    pub fn close(&mut self) {
        self.receiver.close();
    }
}

/// Create a bounded purchase feed. A zero capacity is raised to one.
pub fn purchase_channel(capacity: usize) -> (PurchaseFeed, PurchaseStream) {
    let (sender, receiver) = mpsc::channel(capacity.max(1));
    (PurchaseFeed { sender }, PurchaseStream { receiver })
}
