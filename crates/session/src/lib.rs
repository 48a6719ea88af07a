//! `iapkit-session` — purchase session orchestration.
//!
//! An [`IapSession`] connects to the store once, registers the purchase
//! listener once, and runs a worker that validates and finalizes every
//! unacknowledged purchase the store delivers:
//!
//! ```text
//! store ──PurchaseBatch──▶ feed ──▶ PurchaseWorker ──▶ PurchaseProcessor
//!                                        │                ├─ Validator (deadline + cancel)
//!                                        │                ├─ EntitlementSink
//!                                        │                └─ Finalizer ──▶ store
//!                                        └─ ProcessingState cleared per batch
//! ```

pub mod config;
pub mod entitlements;
pub mod error;
pub mod finalizer;
pub mod ledger;
pub mod processing;
pub mod processor;
pub mod session;
pub mod worker;

pub use config::SessionConfig;
pub use entitlements::{EntitlementSink, InMemoryEntitlements};
pub use error::{ConfigError, FinalizeError, SessionError};
pub use finalizer::{FinalizePolicy, Finalizer};
pub use ledger::{DeliveryLedger, ValidationClaim};
pub use processing::ProcessingState;
pub use processor::{PurchaseProcessor, RecordOutcome};
pub use session::{IapSession, PurchaseContext};
pub use worker::{BatchDispatcher, BatchReport, PurchaseWorker, WorkerHandle, WorkerStats};
