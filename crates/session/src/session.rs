//! The purchase session facade.

use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use iapkit_core::{Platform, ProductDescriptor, SessionId, Sku};
use iapkit_store::{
    CatalogFetcher, ConnectionManager, ConnectionState, PurchaseListener, StoreClient,
};
use iapkit_validation::{Cancellation, HttpValidator, Validator};
use tokio::sync::watch;

use crate::config::SessionConfig;
use crate::entitlements::EntitlementSink;
use crate::error::SessionError;
use crate::finalizer::Finalizer;
use crate::processing::ProcessingState;
use crate::processor::PurchaseProcessor;
use crate::worker::{BatchDispatcher, PurchaseWorker, WorkerHandle, WorkerStats};

/// What UI collaborators see of a session.
#[async_trait]
pub trait PurchaseContext: Send + Sync {
    /// Whether a purchase is currently in flight.
    fn processing(&self) -> bool;

    fn set_processing(&self, value: bool);

    /// Product catalog for the session's platform; empty on any failure.
    async fn get_products(&self) -> Vec<ProductDescriptor>;
}

/// One application-lifetime purchase session.
///
/// Construction is cheap and does no I/O. [`start`](Self::start) connects to
/// the store, registers the single purchase listener and spawns the worker
/// that validates and finalizes delivered purchases.
pub struct IapSession {
    id: SessionId,
    platform: Platform,
    feed_capacity: usize,
    connection: Arc<ConnectionManager>,
    catalog: CatalogFetcher,
    listener: PurchaseListener,
    dispatcher: BatchDispatcher,
    processing: ProcessingState,
    cancel: Cancellation,
    worker: Mutex<Option<WorkerHandle>>,
}

impl IapSession {
    pub fn new(
        config: SessionConfig,
        store: Arc<dyn StoreClient>,
        validator: Arc<dyn Validator>,
        entitlements: Arc<dyn EntitlementSink>,
    ) -> Self {
        let id = SessionId::new();
        let processing = ProcessingState::new();
        let cancel = Cancellation::new();
        let connection = Arc::new(ConnectionManager::new(store.clone()));
        let catalog = CatalogFetcher::new(connection.clone(), &config.skus, config.platform);

        let processor = PurchaseProcessor::new(
            validator,
            Finalizer::new(store),
            entitlements,
            processing.clone(),
        )
        .with_policy(config.finalize_policy)
        .with_validation_timeout(config.validator.timeout)
        .with_cancellation(cancel.clone());
        let dispatcher = BatchDispatcher::new(
            Arc::new(processor),
            processing.clone(),
            config.max_concurrent_validations,
        );

        tracing::debug!(
            session_id = %id,
            platform = %config.platform,
            policy = ?config.finalize_policy,
            "purchase session created"
        );

        Self {
            id,
            platform: config.platform,
            feed_capacity: config.feed_capacity,
            connection,
            catalog,
            listener: PurchaseListener::new(),
            dispatcher,
            processing,
            cancel,
            worker: Mutex::new(None),
        }
    }

    /// Session validating against the HTTP backend in `config.validator`.
    pub fn with_http_validator(
        config: SessionConfig,
        store: Arc<dyn StoreClient>,
        entitlements: Arc<dyn EntitlementSink>,
    ) -> Result<Self, SessionError> {
        let validator = HttpValidator::new(&config.validator)?;
        Ok(Self::new(config, store, Arc::new(validator), entitlements))
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }

    /// Connect, register the purchase listener and start the worker.
    ///
    /// Fails with [`ListenerError::AlreadyRegistered`](iapkit_store::ListenerError)
    /// when called a second time.
    pub async fn start(&self) -> Result<(), SessionError> {
        self.connection.connect().await?;

        let stream = self
            .listener
            .register(self.connection.store().as_ref(), self.feed_capacity)?;
        let handle = PurchaseWorker::new(self.id, self.dispatcher.clone(), stream).start();

        *self.worker.lock().unwrap_or_else(PoisonError::into_inner) = Some(handle);
        tracing::info!(
            session_id = %self.id,
            platform = %self.platform,
            "purchase session started"
        );
        Ok(())
    }

    pub async fn connect(&self) -> Result<(), SessionError> {
        Ok(self.connection.connect().await?)
    }

    pub async fn disconnect(&self) -> Result<(), SessionError> {
        Ok(self.connection.disconnect().await?)
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.connection.state()
    }

    /// Ask the store to start a purchase flow for `sku`.
    ///
    /// The processing flag is raised before the request and cleared again if
    /// the store refuses it; otherwise the worker clears it once the resulting
    /// batch has been handled.
    pub async fn purchase(&self, sku: &Sku) -> Result<(), SessionError> {
        self.processing.begin();

        let result = async {
            self.connection.connect().await?;
            self.connection.store().purchase_item(sku).await?;
            Ok::<_, SessionError>(())
        }
        .await;

        match result {
            Ok(()) => {
                tracing::info!(session_id = %self.id, sku = %sku, "purchase flow started");
                Ok(())
            }
            Err(e) => {
                self.processing.clear();
                tracing::warn!(
                    session_id = %self.id,
                    sku = %sku,
                    error = %e,
                    "purchase request failed"
                );
                Err(e)
            }
        }
    }

    pub async fn get_products(&self) -> Vec<ProductDescriptor> {
        self.catalog.get_products().await
    }

    pub fn processing(&self) -> bool {
        self.processing.is_processing()
    }

    pub fn set_processing(&self, value: bool) {
        self.processing.set(value);
    }

    pub fn processing_state(&self) -> &ProcessingState {
        &self.processing
    }

    pub fn subscribe_processing(&self) -> watch::Receiver<bool> {
        self.processing.subscribe()
    }

    pub fn stats(&self) -> WorkerStats {
        self.dispatcher.stats()
    }

    /// Cancel in-flight validations and stop the worker.
    ///
    /// Cancelled purchases stay unacknowledged, so the store redelivers them
    /// to the next session.
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        let handle = self.worker.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(handle) = handle {
            handle.shutdown().await;
        }
        self.processing.clear();
        tracing::info!(session_id = %self.id, "purchase session stopped");
    }
}

#[async_trait]
impl PurchaseContext for IapSession {
    fn processing(&self) -> bool {
        IapSession::processing(self)
    }

    fn set_processing(&self, value: bool) {
        IapSession::set_processing(self, value);
    }

    async fn get_products(&self) -> Vec<ProductDescriptor> {
        IapSession::get_products(self).await
    }
}

impl core::fmt::Debug for IapSession {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("IapSession")
            .field("id", &self.id)
            .field("platform", &self.platform)
            .field("connection", &self.connection.state())
            .field("processing", &self.processing.is_processing())
            .finish_non_exhaustive()
    }
}
