//! In-memory store binding for tests/dev.

use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use iapkit_core::{
    ProductDescriptor, PurchaseBatch, PurchaseRecord, ResponseCode, Sku, TransactionId,
};

use crate::client::{ProductsResponse, StoreClient};
use crate::error::StoreError;
use crate::feed::PurchaseFeed;

/// A finish call observed by the in-memory store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinishCall {
    pub transaction_id: TransactionId,
    pub product_id: Sku,
    pub acknowledge: bool,
}

/// Store binding that mimics the native runtime without any IO.
///
/// - `connect` while connected answers `AlreadyConnected`, like the real runtime
/// - catalog and purchase calls require a connection
/// - one purchase listener at most
/// - every finish call is recorded for inspection
#[derive(Debug, Default)]
pub struct InMemoryStore {
    inner: Mutex<Inner>,
}

#[derive(Debug)]
struct Inner {
    connected: bool,
    connect_calls: usize,
    connect_failure: Option<String>,
    products: Vec<ProductDescriptor>,
    products_code: ResponseCode,
    listener: Option<PurchaseFeed>,
    purchase_requests: Vec<Sku>,
    purchase_failure: Option<String>,
    finish_calls: Vec<FinishCall>,
    finish_failure: Option<String>,
}

impl Default for Inner {
    fn default() -> Self {
        Self {
            connected: false,
            connect_calls: 0,
            connect_failure: None,
            products: Vec::new(),
            products_code: ResponseCode::Ok,
            listener: None,
            purchase_requests: Vec::new(),
            purchase_failure: None,
            finish_calls: Vec::new(),
            finish_failure: None,
        }
    }
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>, StoreError> {
        self.inner
            .lock()
            .map_err(|_| StoreError::Transport("in-memory store state poisoned".into()))
    }

    fn read<T>(&self, f: impl FnOnce(&Inner) -> T) -> T
    where
        T: Default,
    {
        self.inner.lock().map(|inner| f(&inner)).unwrap_or_default()
    }

    fn write(&self, f: impl FnOnce(&mut Inner)) {
        if let Ok(mut inner) = self.inner.lock() {
            f(&mut inner);
        }
    }

    /// Catalog the store answers with (filtered by requested SKUs).
    pub fn set_products(&self, code: ResponseCode, products: Vec<ProductDescriptor>) {
        self.write(|inner| {
            inner.products_code = code;
            inner.products = products;
        });
    }

    /// Make every following `connect` fail with a transport error.
    pub fn fail_connect(&self, reason: impl Into<String>) {
        let reason = reason.into();
        self.write(|inner| inner.connect_failure = Some(reason));
    }

    /// Make every following `purchase_item` fail.
    pub fn fail_purchase(&self, reason: impl Into<String>) {
        let reason = reason.into();
        self.write(|inner| inner.purchase_failure = Some(reason));
    }

    /// Make every following `finish_transaction` fail.
    pub fn fail_finish(&self, reason: impl Into<String>) {
        let reason = reason.into();
        self.write(|inner| inner.finish_failure = Some(reason));
    }

    /// Clear all injected failures.
    pub fn heal(&self) {
        self.write(|inner| {
            inner.connect_failure = None;
            inner.purchase_failure = None;
            inner.finish_failure = None;
        });
    }

    pub fn is_connected(&self) -> bool {
        self.read(|inner| inner.connected)
    }

    pub fn connect_calls(&self) -> usize {
        self.read(|inner| inner.connect_calls)
    }

    pub fn has_listener(&self) -> bool {
        self.read(|inner| inner.listener.is_some())
    }

    pub fn purchase_requests(&self) -> Vec<Sku> {
        self.read(|inner| inner.purchase_requests.clone())
    }

    pub fn finish_calls(&self) -> Vec<FinishCall> {
        self.read(|inner| inner.finish_calls.clone())
    }

    /// Push a batch to the registered listener, as the native runtime would.
    pub async fn deliver(&self, batch: PurchaseBatch) -> Result<(), StoreError> {
        let feed = self.lock()?.listener.clone().ok_or(StoreError::NoListener)?;
        feed.post(batch)
            .await
            .map_err(|_| StoreError::Transport("purchase listener is gone".into()))
    }
}

#[async_trait]
impl StoreClient for InMemoryStore {
    async fn connect(&self) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        inner.connect_calls += 1;

        if let Some(reason) = &inner.connect_failure {
            return Err(StoreError::Transport(reason.clone()));
        }
        if inner.connected {
            return Err(StoreError::AlreadyConnected);
        }
        inner.connected = true;
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        if !inner.connected {
            return Err(StoreError::NotConnected);
        }
        inner.connected = false;
        Ok(())
    }

    async fn get_products(&self, skus: &[Sku]) -> Result<ProductsResponse, StoreError> {
        let inner = self.lock()?;
        if !inner.connected {
            return Err(StoreError::NotConnected);
        }

        let results = inner
            .products
            .iter()
            .filter(|p| skus.contains(&p.id))
            .cloned()
            .collect();

        Ok(ProductsResponse {
            response_code: inner.products_code,
            results,
        })
    }

    fn set_purchase_listener(&self, feed: PurchaseFeed) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        if inner.listener.is_some() {
            return Err(StoreError::ListenerAlreadySet);
        }
        inner.listener = Some(feed);
        Ok(())
    }

    async fn purchase_item(&self, sku: &Sku) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        if !inner.connected {
            return Err(StoreError::NotConnected);
        }
        if let Some(reason) = &inner.purchase_failure {
            return Err(StoreError::Rejected(reason.clone()));
        }
        inner.purchase_requests.push(sku.clone());
        Ok(())
    }

    async fn finish_transaction(
        &self,
        purchase: &PurchaseRecord,
        acknowledge: bool,
    ) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        if let Some(reason) = &inner.finish_failure {
            return Err(StoreError::Transport(reason.clone()));
        }
        inner.finish_calls.push(FinishCall {
            transaction_id: purchase.transaction_id().clone(),
            product_id: purchase.product_id().clone(),
            acknowledge,
        });
        Ok(())
    }
}
