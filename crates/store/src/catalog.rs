//! Product catalog requests.

use std::sync::Arc;

use iapkit_core::{Platform, ProductDescriptor, Sku};
use serde::{Deserialize, Serialize};

use crate::connection::ConnectionManager;

/// SKU identifiers to request, per store platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkuCatalog {
    ios: Vec<Sku>,
    android: Vec<Sku>,
}

impl SkuCatalog {
    pub fn new(ios: Vec<Sku>, android: Vec<Sku>) -> Self {
        Self { ios, android }
    }

    pub fn for_platform(&self, platform: Platform) -> &[Sku] {
        match platform {
            Platform::Ios => &self.ios,
            Platform::Android => &self.android,
        }
    }

    pub fn with_ios(mut self, skus: Vec<Sku>) -> Self {
        self.ios = skus;
        self
    }

    pub fn with_android(mut self, skus: Vec<Sku>) -> Self {
        self.android = skus;
        self
    }
}

impl Default for SkuCatalog {
    fn default() -> Self {
        Self {
            ios: Sku::parse_list("SKU_1").unwrap_or_default(),
            android: Sku::parse_list("credit_tier1,credit_tier2,credit_tier3").unwrap_or_default(),
        }
    }
}

/// Requests the product catalog for one platform.
///
/// The SKU list is selected once, at construction. Catalog failures are
/// soft: any non-OK response, store error or failed implicit connect yields an
/// empty list and a warning, so callers never have to handle an error.
#[derive(Debug, Clone)]
pub struct CatalogFetcher {
    connection: Arc<ConnectionManager>,
    platform: Platform,
    skus: Vec<Sku>,
}

impl CatalogFetcher {
    pub fn new(
        connection: Arc<ConnectionManager>,
        catalog: &SkuCatalog,
        platform: Platform,
    ) -> Self {
        Self {
            connection,
            platform,
            skus: catalog.for_platform(platform).to_vec(),
        }
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }

    pub fn skus(&self) -> &[Sku] {
        &self.skus
    }

    pub async fn get_products(&self) -> Vec<ProductDescriptor> {
        if let Err(e) = self.connection.connect().await {
            tracing::warn!(error = %e, "catalog unavailable: store connection failed");
            return Vec::new();
        }

        if self.skus.is_empty() {
            tracing::debug!(platform = %self.platform, "no SKUs configured; empty catalog");
            return Vec::new();
        }

        match self.connection.store().get_products(&self.skus).await {
            Ok(response) if response.response_code.is_ok() => {
                tracing::debug!(count = response.results.len(), "catalog fetched");
                response.results
            }
            Ok(response) => {
                tracing::warn!(
                    response_code = %response.response_code,
                    "catalog request returned a non-OK response"
                );
                Vec::new()
            }
            Err(e) => {
                tracing::warn!(error = %e, "catalog request failed");
                Vec::new()
            }
        }
    }
}
