//! Product catalog entries as returned by the store.

use serde::{Deserialize, Serialize};

use crate::id::Sku;

/// Kind of store product.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProductKind {
    /// One-time purchase (consumable or not).
    Inapp,
    /// Auto-renewing subscription.
    Subs,
}

/// Read-only product description sourced from the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductDescriptor {
    #[serde(rename = "productId")]
    pub id: Sku,
    pub title: String,
    pub description: String,
    /// Localized, display-ready price (e.g. `"$0.99"`).
    pub price: String,
    pub price_amount_micros: i64,
    pub price_currency_code: String,
    #[serde(rename = "type")]
    pub kind: ProductKind,
    /// ISO 8601 period for subscriptions (e.g. `"P1M"`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subscription_period: Option<String>,
}
