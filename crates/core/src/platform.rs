//! Store platforms and the purchase evidence each one produces.

use core::str::FromStr;
use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// Store platform a session runs against.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    /// Apple App Store.
    Ios,
    /// Google Play.
    Android,
}

impl Platform {
    /// Platform of the compile target, if it has a purchase store.
    pub fn current() -> Option<Self> {
        if cfg!(target_os = "ios") {
            Some(Platform::Ios)
        } else if cfg!(target_os = "android") {
            Some(Platform::Android)
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Ios => "ios",
            Platform::Android => "android",
        }
    }
}

impl core::fmt::Display for Platform {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ios" => Ok(Platform::Ios),
            "android" => Ok(Platform::Android),
            other => Err(DomainError::validation(format!("unknown platform: {other}"))),
        }
    }
}

/// Platform-specific proof of purchase, exactly as delivered by the store.
///
/// Store payloads carry no platform tag; the variant is told apart by its
/// fields (`transactionReceipt` on iOS, `packageName` + `purchaseToken` on
/// Android). Once parsed, consumers never have to check for optional fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PlatformEvidence {
    Ios {
        #[serde(rename = "transactionReceipt")]
        transaction_receipt: String,
        #[serde(rename = "originalOrderId", default)]
        original_order_id: Option<String>,
        /// Milliseconds since the Unix epoch.
        #[serde(rename = "originalPurchaseTime", default)]
        original_purchase_time: Option<i64>,
    },
    Android {
        #[serde(rename = "packageName")]
        package_name: String,
        #[serde(rename = "purchaseToken")]
        purchase_token: String,
    },
}

impl PlatformEvidence {
    pub fn platform(&self) -> Platform {
        match self {
            PlatformEvidence::Ios { .. } => Platform::Ios,
            PlatformEvidence::Android { .. } => Platform::Android,
        }
    }
}
