//! The platform purchase store boundary.

use async_trait::async_trait;
use iapkit_core::{ProductDescriptor, PurchaseRecord, ResponseCode, Sku};
use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::feed::PurchaseFeed;

/// Result of a product catalog request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductsResponse {
    pub response_code: ResponseCode,
    #[serde(default)]
    pub results: Vec<ProductDescriptor>,
}

/// Operations a platform store binding (App Store, Google Play) provides.
///
/// Implementations wrap the native store runtime. They must be `Send + Sync`
/// because the session shares one binding between the catalog path, the
/// finalizer and purchase initiation.
///
/// Purchase results are not returned from any method here: the binding posts
/// them into the [`PurchaseFeed`] it was given through
/// [`set_purchase_listener`](StoreClient::set_purchase_listener).
#[async_trait]
pub trait StoreClient: Send + Sync {
    /// Connect to the store. May fail with [`StoreError::AlreadyConnected`].
    async fn connect(&self) -> Result<(), StoreError>;

    async fn disconnect(&self) -> Result<(), StoreError>;

    async fn get_products(&self, skus: &[Sku]) -> Result<ProductsResponse, StoreError>;

    /// Install the purchase feed. The store accepts only one listener.
    fn set_purchase_listener(&self, feed: PurchaseFeed) -> Result<(), StoreError>;

    /// Ask the store to start its purchase UI for `sku`.
    async fn purchase_item(&self, sku: &Sku) -> Result<(), StoreError>;

    /// Acknowledge (and, for consumables, consume) a processed purchase.
    async fn finish_transaction(
        &self,
        purchase: &PurchaseRecord,
        acknowledge: bool,
    ) -> Result<(), StoreError>;
}
