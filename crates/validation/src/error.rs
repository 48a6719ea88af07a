use std::time::Duration;

use thiserror::Error;

/// Validation did not produce a verdict.
///
/// A backend *rejection* is not an error; it is a verdict with
/// `accepted = false`. Every variant here leaves the purchase unacknowledged
/// so the store redelivers it later.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("network error: {0}")]
    Transport(String),
    #[error("validation API error ({0}): {1}")]
    Api(u16, String),
    #[error("parse error: {0}")]
    Parse(String),
    #[error("validation timed out after {0:?}")]
    Timeout(Duration),
    #[error("validation cancelled")]
    Cancelled,
}
