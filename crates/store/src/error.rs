//! Store boundary error types.

use iapkit_core::PurchaseBatch;
use thiserror::Error;

/// Failure reported by a platform store binding.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("already connected to the store")]
    AlreadyConnected,
    #[error("not connected to the store")]
    NotConnected,
    #[error("a purchase listener is already set")]
    ListenerAlreadySet,
    #[error("no purchase listener is set")]
    NoListener,
    #[error("store rejected the request: {0}")]
    Rejected(String),
    #[error("store transport error: {0}")]
    Transport(String),
}

/// Connection lifecycle failure surfaced to the caller.
///
/// `StoreError::AlreadyConnected` never shows up here: the connection manager
/// treats it as success.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConnectionError {
    #[error("store connection failed: {0}")]
    Store(#[from] StoreError),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ListenerError {
    #[error("purchase listener already registered for this session")]
    AlreadyRegistered,
    #[error("store refused the purchase listener: {0}")]
    Store(#[from] StoreError),
}

/// Posting into the purchase feed failed; the batch is handed back.
#[derive(Debug, Error)]
pub enum FeedError {
    #[error("purchase feed is full")]
    Full(PurchaseBatch),
    #[error("purchase feed is closed")]
    Closed(PurchaseBatch),
}

impl FeedError {
    pub fn into_batch(self) -> PurchaseBatch {
        match self {
            FeedError::Full(batch) | FeedError::Closed(batch) => batch,
        }
    }
}
