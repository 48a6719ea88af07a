//! `iapkit-store` — the platform purchase store boundary.
//!
//! - [`StoreClient`]: the operations a platform binding must provide
//! - [`ConnectionManager`]: idempotent connect/disconnect lifecycle
//! - [`CatalogFetcher`]: soft-failing product catalog requests
//! - [`PurchaseListener`]: single registration of the purchase feed
//! - [`InMemoryStore`]: a binding for tests and local development

pub mod catalog;
pub mod client;
pub mod connection;
pub mod error;
pub mod feed;
pub mod listener;
pub mod memory;

pub use catalog::{CatalogFetcher, SkuCatalog};
pub use client::{ProductsResponse, StoreClient};
pub use connection::{ConnectionManager, ConnectionState};
pub use error::{ConnectionError, FeedError, ListenerError, StoreError};
pub use feed::{PurchaseFeed, PurchaseStream, purchase_channel};
pub use listener::PurchaseListener;
pub use memory::{FinishCall, InMemoryStore};
