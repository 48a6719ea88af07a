use iapkit_core::TransactionId;
use iapkit_store::{ConnectionError, ListenerError, StoreError};
use iapkit_validation::ValidationError;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error(transparent)]
    Connection(#[from] ConnectionError),
    #[error(transparent)]
    Listener(#[from] ListenerError),
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("validator setup failed: {0}")]
    Validator(#[from] ValidationError),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FinalizeError {
    /// The transaction was already acknowledged; finishing it again is a caller bug.
    #[error("transaction {0} already finalized")]
    AlreadyFinalized(TransactionId),
    #[error("store failed to finish transaction: {0}")]
    Store(#[from] StoreError),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl ConfigError {
    pub fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}
