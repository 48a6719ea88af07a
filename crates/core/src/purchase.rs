//! Purchase records and the batches the store pushes to its listener.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::id::{BatchId, Sku, TransactionId};
use crate::platform::{Platform, PlatformEvidence};

/// Response code attached to store results.
///
/// Numeric values follow the store runtime (`OK = 0`, `USER_CANCELED = 1`,
/// `ERROR = 2`, `DEFERRED = 3`). Anything else is kept as `Unknown`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "i32", into = "i32")]
pub enum ResponseCode {
    Ok,
    UserCanceled,
    Error,
    /// Parental approval pending (iOS "Ask to Buy").
    Deferred,
    Unknown(i32),
}

impl ResponseCode {
    pub fn code(self) -> i32 {
        match self {
            ResponseCode::Ok => 0,
            ResponseCode::UserCanceled => 1,
            ResponseCode::Error => 2,
            ResponseCode::Deferred => 3,
            ResponseCode::Unknown(code) => code,
        }
    }

    pub fn is_ok(self) -> bool {
        self == ResponseCode::Ok
    }
}

impl From<i32> for ResponseCode {
    fn from(code: i32) -> Self {
        match code {
            0 => ResponseCode::Ok,
            1 => ResponseCode::UserCanceled,
            2 => ResponseCode::Error,
            3 => ResponseCode::Deferred,
            other => ResponseCode::Unknown(other),
        }
    }
}

impl From<ResponseCode> for i32 {
    fn from(code: ResponseCode) -> Self {
        code.code()
    }
}

impl core::fmt::Display for ResponseCode {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            ResponseCode::Ok => f.write_str("OK"),
            ResponseCode::UserCanceled => f.write_str("USER_CANCELED"),
            ResponseCode::Error => f.write_str("ERROR"),
            ResponseCode::Deferred => f.write_str("DEFERRED"),
            ResponseCode::Unknown(code) => write!(f, "UNKNOWN({code})"),
        }
    }
}

/// One purchase delivered by the store, immutable as delivered.
///
/// `acknowledged` reflects the store's view at delivery time. Finalizing a
/// purchase does not touch this copy; the session tracks it separately and a
/// later redelivery carries the store's updated flag.
///
/// The serde shape is the store payload: `orderId`, `purchaseTime` in epoch
/// milliseconds, and the platform evidence fields inline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseRecord {
    product_id: Sku,
    #[serde(rename = "orderId")]
    transaction_id: TransactionId,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    purchase_time: DateTime<Utc>,
    acknowledged: bool,
    #[serde(flatten)]
    evidence: PlatformEvidence,
}

impl PurchaseRecord {
    /// A freshly delivered, unacknowledged purchase.
    pub fn new(product_id: Sku, transaction_id: TransactionId, evidence: PlatformEvidence) -> Self {
        Self {
            product_id,
            transaction_id,
            purchase_time: Utc::now(),
            acknowledged: false,
            evidence,
        }
    }

    pub fn with_purchase_time(mut self, purchase_time: DateTime<Utc>) -> Self {
        self.purchase_time = purchase_time;
        self
    }

    /// Mark the record as already acknowledged (e.g. a restored purchase).
    pub fn into_acknowledged(mut self) -> Self {
        self.acknowledged = true;
        self
    }

    pub fn product_id(&self) -> &Sku {
        &self.product_id
    }

    pub fn transaction_id(&self) -> &TransactionId {
        &self.transaction_id
    }

    pub fn purchase_time(&self) -> DateTime<Utc> {
        self.purchase_time
    }

    pub fn is_acknowledged(&self) -> bool {
        self.acknowledged
    }

    pub fn platform(&self) -> Platform {
        self.evidence.platform()
    }

    pub fn evidence(&self) -> &PlatformEvidence {
        &self.evidence
    }
}

/// A batch of purchase results pushed by the store, tagged with one response code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseBatch {
    #[serde(default)]
    pub id: BatchId,
    pub response_code: ResponseCode,
    #[serde(default)]
    pub results: Vec<PurchaseRecord>,
    /// Store-specific error code, usually present for non-OK batches.
    #[serde(default)]
    pub error_code: Option<i32>,
}

/// Branch the listener takes for a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchOutcome<'a> {
    Purchased(&'a [PurchaseRecord]),
    Canceled,
    Deferred,
    Failed {
        code: ResponseCode,
        error_code: Option<i32>,
    },
}

impl PurchaseBatch {
    pub fn new(response_code: ResponseCode, results: Vec<PurchaseRecord>) -> Self {
        Self {
            id: BatchId::new(),
            response_code,
            results,
            error_code: None,
        }
    }

    /// Successful batch carrying `results`.
    pub fn ok(results: Vec<PurchaseRecord>) -> Self {
        Self::new(ResponseCode::Ok, results)
    }

    /// Result-less batch carrying only a response code.
    pub fn with_code(response_code: ResponseCode) -> Self {
        Self::new(response_code, Vec::new())
    }

    pub fn with_error_code(mut self, error_code: i32) -> Self {
        self.error_code = Some(error_code);
        self
    }

    pub fn outcome(&self) -> BatchOutcome<'_> {
        match self.response_code {
            ResponseCode::Ok => BatchOutcome::Purchased(&self.results),
            ResponseCode::UserCanceled => BatchOutcome::Canceled,
            ResponseCode::Deferred => BatchOutcome::Deferred,
            code => BatchOutcome::Failed {
                code,
                error_code: self.error_code,
            },
        }
    }

    /// Records that still need validation and finalization.
    pub fn unacknowledged(&self) -> impl Iterator<Item = &PurchaseRecord> {
        self.results.iter().filter(|r| !r.is_acknowledged())
    }
}
