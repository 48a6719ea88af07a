//! Validate-then-finalize for a single delivered purchase.

use std::sync::Arc;
use std::time::Duration;

use iapkit_core::{DeliveryState, PurchaseRecord};
use iapkit_validation::{Cancellation, ValidationError, Validator, validate_with_deadline};

use crate::entitlements::EntitlementSink;
use crate::error::FinalizeError;
use crate::finalizer::{FinalizePolicy, Finalizer};
use crate::ledger::DeliveryLedger;
use crate::processing::ProcessingState;

/// What happened to one record of a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordOutcome {
    /// Delivered already acknowledged; neither validated nor finalized.
    SkippedAcknowledged,
    /// Already finalized or currently validating in this session.
    SkippedDuplicate,
    /// Acknowledged to the store.
    Finalized { accepted: bool },
    /// Backend rejected the purchase and the policy left it unacknowledged.
    Rejected,
    /// No verdict (transport, timeout, cancellation); left unacknowledged.
    ValidationFailed(ValidationError),
    /// Verdict obtained but the store did not take the acknowledgment.
    FinalizeFailed(FinalizeError),
    /// The processing task panicked; the claim was released for redelivery.
    Panicked,
}

/// Runs one purchase through `Delivered → Validating → {Finalized | FailedUnacknowledged}`.
pub struct PurchaseProcessor {
    validator: Arc<dyn Validator>,
    finalizer: Finalizer,
    ledger: DeliveryLedger,
    entitlements: Arc<dyn EntitlementSink>,
    processing: ProcessingState,
    policy: FinalizePolicy,
    validation_timeout: Duration,
    cancel: Cancellation,
}

impl PurchaseProcessor {
    pub fn new(
        validator: Arc<dyn Validator>,
        finalizer: Finalizer,
        entitlements: Arc<dyn EntitlementSink>,
        processing: ProcessingState,
    ) -> Self {
        Self {
            validator,
            finalizer,
            ledger: DeliveryLedger::new(),
            entitlements,
            processing,
            policy: FinalizePolicy::default(),
            validation_timeout: Duration::from_secs(10),
            cancel: Cancellation::new(),
        }
    }

    pub fn with_policy(mut self, policy: FinalizePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_validation_timeout(mut self, timeout: Duration) -> Self {
        self.validation_timeout = timeout;
        self
    }

    pub fn with_cancellation(mut self, cancel: Cancellation) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn ledger(&self) -> &DeliveryLedger {
        &self.ledger
    }

    pub fn finalizer(&self) -> &Finalizer {
        &self.finalizer
    }

    pub async fn process(&self, purchase: &PurchaseRecord) -> RecordOutcome {
        if purchase.is_acknowledged() {
            return RecordOutcome::SkippedAcknowledged;
        }

        let transaction_id = purchase.transaction_id();
        let claim = match self.ledger.claim(transaction_id) {
            Ok(claim) => claim,
            Err(e) => {
                tracing::debug!(
                    transaction_id = %transaction_id,
                    reason = %e,
                    "skipping redelivered purchase"
                );
                return RecordOutcome::SkippedDuplicate;
            }
        };

        let result = validate_with_deadline(
            self.validator.as_ref(),
            purchase,
            self.validation_timeout,
            &self.cancel,
        )
        .await;

        match &result {
            Ok(verdict) => {
                if let Some(plan) = verdict.entitlement.clone().filter(|_| verdict.accepted) {
                    self.entitlements.apply(plan);
                }
            }
            Err(e) => {
                tracing::warn!(
                    transaction_id = %transaction_id,
                    product_id = %purchase.product_id(),
                    error = %e,
                    "purchase validation failed"
                );
                self.processing.clear();
            }
        }

        if !self.policy.should_finalize(&result) {
            claim.settle(DeliveryState::FailedUnacknowledged);
            return match result {
                Err(e) => RecordOutcome::ValidationFailed(e),
                Ok(_) => {
                    tracing::info!(
                        transaction_id = %transaction_id,
                        "rejected purchase left unacknowledged"
                    );
                    RecordOutcome::Rejected
                }
            };
        }

        let accepted = matches!(&result, Ok(verdict) if verdict.accepted);
        match self.finalizer.finish(purchase, true).await {
            Ok(()) => {
                claim.settle(DeliveryState::Finalized);
                RecordOutcome::Finalized { accepted }
            }
            Err(e) => {
                claim.settle(DeliveryState::FailedUnacknowledged);
                RecordOutcome::FinalizeFailed(e)
            }
        }
    }
}

impl core::fmt::Debug for PurchaseProcessor {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("PurchaseProcessor")
            .field("policy", &self.policy)
            .field("validation_timeout", &self.validation_timeout)
            .finish_non_exhaustive()
    }
}
