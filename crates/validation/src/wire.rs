//! Request/response wire format of the validation backend.
//!
//! Request:
//!
//! ```json
//! {"platform": "android", "productId": "credit_tier1",
//!  "packageName": "...", "purchaseToken": "..."}
//! {"platform": "ios", "productId": "SKU_1", "receipt": "..."}
//! ```
//!
//! Response: `{"ack": "success", "response": {"freeTrialExpiry": "..."}}`. A
//! top-level `freeTrialExpiry` is accepted as well; the nested one wins.

use chrono::{DateTime, Utc};
use iapkit_core::{PlanState, PlatformEvidence, PurchaseRecord, Sku, ValidationVerdict};
use serde::{Deserialize, Serialize};

/// `ack` value the backend sends for an accepted purchase.
pub const ACK_SUCCESS: &str = "success";

/// Platform-specific evidence fields sent to the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "platform", rename_all = "lowercase")]
pub enum EvidencePayload {
    Ios {
        receipt: String,
    },
    Android {
        #[serde(rename = "packageName")]
        package_name: String,
        #[serde(rename = "purchaseToken")]
        purchase_token: String,
    },
}

impl From<&PlatformEvidence> for EvidencePayload {
    fn from(evidence: &PlatformEvidence) -> Self {
        match evidence {
            PlatformEvidence::Ios {
                transaction_receipt,
                ..
            } => EvidencePayload::Ios {
                receipt: transaction_receipt.clone(),
            },
            PlatformEvidence::Android {
                package_name,
                purchase_token,
            } => EvidencePayload::Android {
                package_name: package_name.clone(),
                purchase_token: purchase_token.clone(),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationRequest {
    pub product_id: Sku,
    #[serde(flatten)]
    pub evidence: EvidencePayload,
}

impl ValidationRequest {
    pub fn for_purchase(purchase: &PurchaseRecord) -> Self {
        Self {
            product_id: purchase.product_id().clone(),
            evidence: purchase.evidence().into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationDetails {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub free_trial_expiry: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResponse {
    pub ack: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<ValidationDetails>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub free_trial_expiry: Option<DateTime<Utc>>,
}

impl ValidationResponse {
    pub fn success(free_trial_expiry: Option<DateTime<Utc>>) -> Self {
        Self {
            ack: ACK_SUCCESS.to_string(),
            response: Some(ValidationDetails { free_trial_expiry }),
            free_trial_expiry: None,
        }
    }

    pub fn rejected(ack: impl Into<String>) -> Self {
        Self {
            ack: ack.into(),
            response: None,
            free_trial_expiry: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.ack == ACK_SUCCESS
    }

    /// Derive the verdict for `product_id`. Any `ack` other than `"success"` is a rejection.
    pub fn into_verdict(self, product_id: &Sku) -> ValidationVerdict {
        if !self.is_success() {
            return ValidationVerdict::rejected();
        }

        let expiry = self
            .response
            .and_then(|details| details.free_trial_expiry)
            .or(self.free_trial_expiry);
        ValidationVerdict::accepted(PlanState::for_accepted(product_id.clone(), expiry))
    }
}
