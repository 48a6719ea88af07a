//! Deadlines and cancellation for validation calls.

use std::sync::Arc;
use std::time::Duration;

use iapkit_core::{PurchaseRecord, ValidationVerdict};
use tokio::sync::watch;

use crate::error::ValidationError;
use crate::validator::Validator;

/// Shared cancellation signal.
///
/// Clones observe the same signal. Once cancelled it stays cancelled.
#[derive(Debug, Clone)]
pub struct Cancellation {
    state: Arc<watch::Sender<bool>>,
}

impl Default for Cancellation {
    fn default() -> Self {
        let (state, _) = watch::channel(false);
        Self {
            state: Arc::new(state),
        }
    }
}

impl Cancellation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.state.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.state.borrow()
    }

    /// Resolves once [`cancel`](Cancellation::cancel) has been called.
    pub async fn cancelled(&self) {
        let mut rx = self.state.subscribe();
        // The sender lives as long as `self`, so this cannot observe a closed channel.
        let _ = rx.wait_for(|cancelled| *cancelled).await;
    }
}

/// Run `validator` against `purchase`, bounded by `deadline` and `cancel`.
///
/// Exceeding the deadline yields [`ValidationError::Timeout`]; cancellation
/// yields [`ValidationError::Cancelled`]. Cancellation wins if both are ready.
pub async fn validate_with_deadline(
    validator: &dyn Validator,
    purchase: &PurchaseRecord,
    deadline: Duration,
    cancel: &Cancellation,
) -> Result<ValidationVerdict, ValidationError> {
    if cancel.is_cancelled() {
        return Err(ValidationError::Cancelled);
    }

    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(ValidationError::Cancelled),
        result = tokio::time::timeout(deadline, validator.validate(purchase)) => {
            result.unwrap_or(Err(ValidationError::Timeout(deadline)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use iapkit_core::{PlatformEvidence, Sku, TransactionId};

    struct NeverAnswers;

    #[async_trait]
    impl Validator for NeverAnswers {
        async fn validate(
            &self,
            _purchase: &PurchaseRecord,
        ) -> Result<ValidationVerdict, ValidationError> {
            std::future::pending().await
        }
    }

    struct AlwaysRejects;

    #[async_trait]
    impl Validator for AlwaysRejects {
        async fn validate(
            &self,
            _purchase: &PurchaseRecord,
        ) -> Result<ValidationVerdict, ValidationError> {
            Ok(ValidationVerdict::rejected())
        }
    }

    fn purchase() -> PurchaseRecord {
        PurchaseRecord::new(
            Sku::new("credit_tier1").unwrap(),
            TransactionId::new("GPA.1").unwrap(),
            PlatformEvidence::Android {
                package_name: "com.example.app".into(),
                purchase_token: "tok".into(),
            },
        )
    }

    #[tokio::test]
    async fn slow_validation_times_out() {
        let deadline = Duration::from_millis(20);
        let result =
            validate_with_deadline(&NeverAnswers, &purchase(), deadline, &Cancellation::new())
                .await;
        assert_eq!(result, Err(ValidationError::Timeout(deadline)));
    }

    #[tokio::test]
    async fn cancellation_aborts_a_pending_validation() {
        let cancel = Cancellation::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            trigger.cancel();
        });

        let result =
            validate_with_deadline(&NeverAnswers, &purchase(), Duration::from_secs(30), &cancel)
                .await;
        assert_eq!(result, Err(ValidationError::Cancelled));
    }

    #[tokio::test]
    async fn already_cancelled_skips_the_call() {
        let cancel = Cancellation::new();
        cancel.cancel();

        let result =
            validate_with_deadline(&AlwaysRejects, &purchase(), Duration::from_secs(1), &cancel)
                .await;
        assert_eq!(result, Err(ValidationError::Cancelled));
    }

    #[tokio::test]
    async fn verdict_passes_through() {
        let result = validate_with_deadline(
            &AlwaysRejects,
            &purchase(),
            Duration::from_secs(1),
            &Cancellation::new(),
        )
        .await;
        assert_eq!(result, Ok(ValidationVerdict::rejected()));
    }
}
