//! Store connection lifecycle.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{Mutex, watch};

use crate::client::StoreClient;
use crate::error::{ConnectionError, StoreError};

/// Connection lifecycle state.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

/// Owns the connect/disconnect lifecycle to the platform store.
///
/// - `connect` is idempotent: calling it while `Connected` succeeds without
///   touching the store, and an `AlreadyConnected` answer from the store is
///   treated as success.
/// - Genuine store failures are surfaced and leave the state `Disconnected`.
/// - No automatic retry; callers decide.
///
/// Lifecycle operations are serialized, so concurrent callers never issue two
/// store connects at once.
pub struct ConnectionManager {
    store: Arc<dyn StoreClient>,
    op_lock: Mutex<()>,
    state: watch::Sender<ConnectionState>,
}

impl ConnectionManager {
    pub fn new(store: Arc<dyn StoreClient>) -> Self {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            store,
            op_lock: Mutex::new(()),
            state,
        }
    }

    /// The store binding this manager connects.
    pub fn store(&self) -> &Arc<dyn StoreClient> {
        &self.store
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// Observe state changes.
    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    pub async fn connect(&self) -> Result<(), ConnectionError> {
        let _guard = self.op_lock.lock().await;

        if self.is_connected() {
            tracing::debug!("store already connected; connect is a no-op");
            return Ok(());
        }

        self.state.send_replace(ConnectionState::Connecting);
        match self.store.connect().await {
            Ok(()) => {
                self.state.send_replace(ConnectionState::Connected);
                tracing::info!("connected to purchase store");
                Ok(())
            }
            Err(StoreError::AlreadyConnected) => {
                self.state.send_replace(ConnectionState::Connected);
                tracing::debug!("store reported an existing connection");
                Ok(())
            }
            Err(e) => {
                self.state.send_replace(ConnectionState::Disconnected);
                tracing::warn!(error = %e, "failed to connect to purchase store");
                Err(ConnectionError::Store(e))
            }
        }
    }

    pub async fn disconnect(&self) -> Result<(), ConnectionError> {
        let _guard = self.op_lock.lock().await;

        if self.state() == ConnectionState::Disconnected {
            tracing::debug!("store not connected; disconnect is a no-op");
            return Ok(());
        }

        match self.store.disconnect().await {
            Ok(()) | Err(StoreError::NotConnected) => {
                self.state.send_replace(ConnectionState::Disconnected);
                tracing::info!("disconnected from purchase store");
                Ok(())
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to disconnect from purchase store");
                Err(ConnectionError::Store(e))
            }
        }
    }
}

impl core::fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryStore;

    #[tokio::test]
    async fn connect_twice_is_a_no_op() {
        let store = Arc::new(InMemoryStore::new());
        let manager = ConnectionManager::new(store.clone());

        manager.connect().await.unwrap();
        manager.connect().await.unwrap();

        assert_eq!(manager.state(), ConnectionState::Connected);
        assert_eq!(store.connect_calls(), 1);
    }

    #[tokio::test]
    async fn already_connected_from_the_store_is_swallowed() {
        let store = Arc::new(InMemoryStore::new());
        // Someone else connected the binding before this manager existed.
        store.connect().await.unwrap();

        let manager = ConnectionManager::new(store.clone());
        manager.connect().await.unwrap();

        assert!(manager.is_connected());
    }

    #[tokio::test]
    async fn transport_failure_is_surfaced_and_not_retried() {
        let store = Arc::new(InMemoryStore::new());
        store.fail_connect("billing service unavailable");
        let manager = ConnectionManager::new(store.clone());

        let err = manager.connect().await.unwrap_err();
        assert_eq!(
            err,
            ConnectionError::Store(StoreError::Transport("billing service unavailable".into()))
        );
        assert_eq!(manager.state(), ConnectionState::Disconnected);
        assert_eq!(store.connect_calls(), 1);
    }

    #[tokio::test]
    async fn disconnect_while_disconnected_is_a_no_op() {
        let store = Arc::new(InMemoryStore::new());
        let manager = ConnectionManager::new(store);

        manager.disconnect().await.unwrap();
        assert_eq!(manager.state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn disconnect_after_connect() {
        let store = Arc::new(InMemoryStore::new());
        let manager = ConnectionManager::new(store.clone());

        manager.connect().await.unwrap();
        manager.disconnect().await.unwrap();

        assert_eq!(manager.state(), ConnectionState::Disconnected);
        assert!(!store.is_connected());
    }
}
