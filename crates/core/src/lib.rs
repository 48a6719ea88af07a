//! `iapkit-core` — in-app purchase domain building blocks.
//!
//! This crate contains **pure domain** types (no IO, no async). Store bindings,
//! validation transports and session orchestration live in sibling crates.

pub mod entitlement;
pub mod error;
pub mod id;
pub mod lifecycle;
pub mod platform;
pub mod product;
pub mod purchase;

pub use entitlement::{PlanState, ValidationVerdict};
pub use error::{DomainError, DomainResult};
pub use id::{BatchId, SessionId, Sku, TransactionId};
pub use lifecycle::DeliveryState;
pub use platform::{Platform, PlatformEvidence};
pub use product::{ProductDescriptor, ProductKind};
pub use purchase::{BatchOutcome, PurchaseBatch, PurchaseRecord, ResponseCode};
