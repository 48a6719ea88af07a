use async_trait::async_trait;
use iapkit_core::{PurchaseRecord, ValidationVerdict};

use crate::error::ValidationError;

/// Remote authority deciding whether a purchase grants an entitlement.
#[async_trait]
pub trait Validator: Send + Sync {
    async fn validate(&self, purchase: &PurchaseRecord)
    -> Result<ValidationVerdict, ValidationError>;
}
