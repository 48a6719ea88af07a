//! Validation verdicts and the entitlement state derived from them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::id::Sku;

/// Locally derived plan state unlocked by an accepted purchase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanState {
    pub plan_id: Sku,
    pub free_trial_eligible: bool,
    pub free_trial_expiry: Option<DateTime<Utc>>,
}

impl PlanState {
    /// Plan state for a purchase the backend accepted.
    ///
    /// A paid plan consumes the free trial, so eligibility is always cleared.
    pub fn for_accepted(plan_id: Sku, free_trial_expiry: Option<DateTime<Utc>>) -> Self {
        Self {
            plan_id,
            free_trial_eligible: false,
            free_trial_expiry,
        }
    }
}

/// Verdict of the remote validation authority for one purchase.
///
/// Not persisted here; the entitlement (if any) is handed to the application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationVerdict {
    pub accepted: bool,
    pub entitlement: Option<PlanState>,
}

impl ValidationVerdict {
    pub fn accepted(entitlement: PlanState) -> Self {
        Self {
            accepted: true,
            entitlement: Some(entitlement),
        }
    }

    pub fn rejected() -> Self {
        Self {
            accepted: false,
            entitlement: None,
        }
    }
}
