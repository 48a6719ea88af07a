//! `iapkit-validation` — remote purchase validation.
//!
//! The backend is the authority on whether a purchase is genuine; this crate
//! only sends the evidence, enforces a deadline, and turns the answer into a
//! [`ValidationVerdict`](iapkit_core::ValidationVerdict).

pub mod config;
pub mod deadline;
pub mod error;
pub mod http;
pub mod validator;
pub mod wire;

pub use config::ValidatorConfig;
pub use deadline::{Cancellation, validate_with_deadline};
pub use error::ValidationError;
pub use http::HttpValidator;
pub use validator::Validator;
pub use wire::{
    ACK_SUCCESS, EvidencePayload, ValidationDetails, ValidationRequest, ValidationResponse,
};
