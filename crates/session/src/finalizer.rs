//! Transaction finalization (acknowledging purchases back to the store).

use std::str::FromStr;
use std::sync::Arc;

use iapkit_core::{PurchaseRecord, ValidationVerdict};
use iapkit_store::StoreClient;
use iapkit_validation::ValidationError;

use crate::error::{ConfigError, FinalizeError};

/// When a validated purchase is acknowledged to the store.
///
/// An unacknowledged purchase is redelivered by the store later, so leaving a
/// record pending is how a failed validation gets retried.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub enum FinalizePolicy {
    /// After every validation attempt, even a failed one.
    Always,
    /// Whenever the backend returned a verdict, accepted or rejected.
    #[default]
    OnVerdict,
    /// Only when the backend accepted the purchase.
    OnAccepted,
}

impl FinalizePolicy {
    pub fn should_finalize(self, result: &Result<ValidationVerdict, ValidationError>) -> bool {
        match (self, result) {
            (FinalizePolicy::Always, _) => true,
            (FinalizePolicy::OnVerdict, Ok(_)) => true,
            (FinalizePolicy::OnAccepted, Ok(verdict)) => verdict.accepted,
            (_, Err(_)) => false,
        }
    }
}

impl FromStr for FinalizePolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "always" => Ok(FinalizePolicy::Always),
            "on-verdict" => Ok(FinalizePolicy::OnVerdict),
            "on-accepted" => Ok(FinalizePolicy::OnAccepted),
            other => Err(ConfigError::invalid(
                "IAP_FINALIZE_POLICY",
                format!("unknown policy `{other}`"),
            )),
        }
    }
}

/// Acknowledges processed purchases so the store stops redelivering them.
///
/// The finalizer itself is stateless. Callers hold a
/// [`ValidationClaim`](crate::ValidationClaim) on the transaction, which is
/// what keeps a transaction from being finished twice in one session.
pub struct Finalizer {
    store: Arc<dyn StoreClient>,
}

impl Finalizer {
    pub fn new(store: Arc<dyn StoreClient>) -> Self {
        Self { store }
    }

    /// Finish `purchase`. Records the store already reports as acknowledged are refused.
    pub async fn finish(
        &self,
        purchase: &PurchaseRecord,
        acknowledge: bool,
    ) -> Result<(), FinalizeError> {
        let transaction_id = purchase.transaction_id();
        if purchase.is_acknowledged() {
            return Err(FinalizeError::AlreadyFinalized(transaction_id.clone()));
        }

        match self.store.finish_transaction(purchase, acknowledge).await {
            Ok(()) => {
                tracing::info!(
                    transaction_id = %transaction_id,
                    product_id = %purchase.product_id(),
                    acknowledge,
                    "transaction finished"
                );
                Ok(())
            }
            Err(e) => {
                tracing::warn!(
                    transaction_id = %transaction_id,
                    error = %e,
                    "failed to finish transaction; store will redeliver"
                );
                Err(FinalizeError::Store(e))
            }
        }
    }
}

impl core::fmt::Debug for Finalizer {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Finalizer").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use iapkit_core::{PlanState, PlatformEvidence, Sku, TransactionId};
    use iapkit_store::{InMemoryStore, StoreError};

    fn purchase(tx: &str) -> PurchaseRecord {
        PurchaseRecord::new(
            Sku::new("credit_tier1").unwrap(),
            TransactionId::new(tx).unwrap(),
            PlatformEvidence::Android {
                package_name: "com.example.app".into(),
                purchase_token: format!("token-{tx}"),
            },
        )
    }

    #[test]
    fn policy_matrix() {
        let accepted = Ok(ValidationVerdict::accepted(PlanState::for_accepted(
            Sku::new("credit_tier1").unwrap(),
            None,
        )));
        let rejected = Ok(ValidationVerdict::rejected());
        let failed = Err(ValidationError::Transport("down".into()));

        assert!(FinalizePolicy::Always.should_finalize(&failed));
        assert!(FinalizePolicy::OnVerdict.should_finalize(&rejected));
        assert!(!FinalizePolicy::OnVerdict.should_finalize(&failed));
        assert!(FinalizePolicy::OnAccepted.should_finalize(&accepted));
        assert!(!FinalizePolicy::OnAccepted.should_finalize(&rejected));
    }

    #[test]
    fn policy_parses_config_values() {
        assert_eq!("on-accepted".parse::<FinalizePolicy>().unwrap(), FinalizePolicy::OnAccepted);
        assert!("sometimes".parse::<FinalizePolicy>().is_err());
    }

    #[tokio::test]
    async fn finishes_with_the_requested_acknowledgment() {
        let store = Arc::new(InMemoryStore::new());
        let finalizer = Finalizer::new(store.clone());

        finalizer.finish(&purchase("GPA.1"), true).await.unwrap();

        let calls = store.finish_calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].transaction_id.as_str(), "GPA.1");
        assert!(calls[0].acknowledge);
    }

    #[tokio::test]
    async fn acknowledged_records_are_refused() {
        let store = Arc::new(InMemoryStore::new());
        let finalizer = Finalizer::new(store.clone());

        let err = finalizer
            .finish(&purchase("GPA.1").into_acknowledged(), true)
            .await
            .unwrap_err();

        assert!(matches!(err, FinalizeError::AlreadyFinalized(_)));
        assert!(store.finish_calls().is_empty());
    }

    #[tokio::test]
    async fn store_failure_is_surfaced_and_retryable() {
        let store = Arc::new(InMemoryStore::new());
        store.fail_finish("billing unavailable");
        let finalizer = Finalizer::new(store.clone());
        let p = purchase("GPA.1");

        let err = finalizer.finish(&p, true).await.unwrap_err();
        assert_eq!(
            err,
            FinalizeError::Store(StoreError::Transport("billing unavailable".into()))
        );
        assert!(store.finish_calls().is_empty());

        store.heal();
        finalizer.finish(&p, true).await.unwrap();
        assert_eq!(store.finish_calls().len(), 1);
    }
}
