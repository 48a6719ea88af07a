//! Per-transaction delivery lifecycle for one session.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use iapkit_core::{DeliveryState, DomainResult, TransactionId};

/// Tracks where each delivered transaction is in its lifecycle.
///
/// This complements the store's `acknowledged` flag: the store may redeliver
/// a purchase (still unacknowledged on its side) while this session is
/// validating it, or after this session already finished it. A `Finalized`
/// entry is the session's record that a transaction was acknowledged, so it is
/// never claimed again.
#[derive(Debug, Default)]
pub struct DeliveryLedger {
    states: Mutex<HashMap<TransactionId, DeliveryState>>,
}

impl DeliveryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self, transaction_id: &TransactionId) -> Option<DeliveryState> {
        self.states
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(transaction_id)
            .copied()
    }

    /// Record a (re)delivery and claim it for validation.
    ///
    /// Fails for transactions that are finalized or currently validating.
    pub fn begin_validation(&self, transaction_id: &TransactionId) -> DomainResult<()> {
        let mut states = self.states.lock().unwrap_or_else(PoisonError::into_inner);
        let delivered = DeliveryState::deliver(states.get(transaction_id).copied())?;
        let validating = delivered.transition(DeliveryState::Validating)?;
        states.insert(transaction_id.clone(), validating);
        Ok(())
    }

    /// Claim a transaction for validation, releasing it if the claim is dropped unsettled.
    ///
    /// A claim dropped without [`ValidationClaim::settle`] (the processing
    /// task panicked or was aborted) moves the transaction to
    /// `FailedUnacknowledged`, so a redelivery is validated again.
    pub fn claim(&self, transaction_id: &TransactionId) -> DomainResult<ValidationClaim<'_>> {
        self.begin_validation(transaction_id)?;
        Ok(ValidationClaim {
            ledger: self,
            transaction_id: Some(transaction_id.clone()),
        })
    }

    /// Move a validating transaction to `next`.
    pub fn settle(&self, transaction_id: &TransactionId, next: DeliveryState) -> DomainResult<()> {
        let mut states = self.states.lock().unwrap_or_else(PoisonError::into_inner);
        let current = states
            .get(transaction_id)
            .copied()
            .unwrap_or(DeliveryState::Delivered);
        let next = current.transition(next)?;
        states.insert(transaction_id.clone(), next);
        Ok(())
    }
}

/// A transaction held in `Validating` until settled.
#[derive(Debug)]
pub struct ValidationClaim<'a> {
    ledger: &'a DeliveryLedger,
    transaction_id: Option<TransactionId>,
}

impl ValidationClaim<'_> {
    pub fn transaction_id(&self) -> Option<&TransactionId> {
        self.transaction_id.as_ref()
    }

    /// Settle the claimed transaction to `next`.
    pub fn settle(mut self, next: DeliveryState) {
        if let Some(transaction_id) = self.transaction_id.take() {
            self.release(&transaction_id, next);
        }
    }

    fn release(&self, transaction_id: &TransactionId, next: DeliveryState) {
        if let Err(e) = self.ledger.settle(transaction_id, next) {
            tracing::error!(
                transaction_id = %transaction_id,
                error = %e,
                "delivery ledger out of sync"
            );
        }
    }
}

impl Drop for ValidationClaim<'_> {
    fn drop(&mut self) {
        if let Some(transaction_id) = self.transaction_id.take() {
            tracing::warn!(
                transaction_id = %transaction_id,
                "purchase processing aborted; releasing claim for redelivery"
            );
            self.release(&transaction_id, DeliveryState::FailedUnacknowledged);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tx(id: &str) -> TransactionId {
        TransactionId::new(id).unwrap()
    }

    #[test]
    fn in_flight_and_finalized_transactions_are_not_claimed_again() {
        let ledger = DeliveryLedger::new();
        let id = tx("GPA.1");

        ledger.begin_validation(&id).unwrap();
        assert!(ledger.begin_validation(&id).is_err());

        ledger.settle(&id, DeliveryState::Finalized).unwrap();
        assert!(ledger.begin_validation(&id).is_err());
        assert_eq!(ledger.state(&id), Some(DeliveryState::Finalized));
    }

    #[test]
    fn failed_transactions_can_be_claimed_on_redelivery() {
        let ledger = DeliveryLedger::new();
        let id = tx("GPA.1");

        ledger.begin_validation(&id).unwrap();
        ledger.settle(&id, DeliveryState::FailedUnacknowledged).unwrap();
        ledger.begin_validation(&id).unwrap();

        assert_eq!(ledger.state(&id), Some(DeliveryState::Validating));
    }

    #[test]
    fn settled_claim_keeps_its_state() {
        let ledger = DeliveryLedger::new();
        let id = tx("GPA.1");

        let claim = ledger.claim(&id).unwrap();
        assert!(ledger.claim(&id).is_err());
        claim.settle(DeliveryState::Finalized);

        assert_eq!(ledger.state(&id), Some(DeliveryState::Finalized));
    }

    #[test]
    fn dropped_claim_is_released_for_redelivery() {
        let ledger = DeliveryLedger::new();
        let id = tx("GPA.1");

        drop(ledger.claim(&id).unwrap());
        assert_eq!(ledger.state(&id), Some(DeliveryState::FailedUnacknowledged));

        let _again = ledger.claim(&id).unwrap();
        assert_eq!(ledger.state(&id), Some(DeliveryState::Validating));
    }

    #[test]
    fn claim_is_released_when_its_holder_panics() {
        let ledger = DeliveryLedger::new();
        let id = tx("GPA.1");

        let unwound = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _claim = ledger.claim(&id).unwrap();
            panic!("validator blew up");
        }));

        assert!(unwound.is_err());
        assert_eq!(ledger.state(&id), Some(DeliveryState::FailedUnacknowledged));
    }

    #[test]
    fn settling_an_unclaimed_transaction_is_rejected() {
        let ledger = DeliveryLedger::new();
        assert!(ledger.settle(&tx("GPA.9"), DeliveryState::Finalized).is_err());
    }
}
