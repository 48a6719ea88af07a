//! Per-delivery purchase lifecycle.
//!
//! ```text
//! Delivered → Validating → Finalized
//!                        ↘ FailedUnacknowledged → (redelivery) → Delivered
//! ```
//!
//! `Finalized` is terminal for a transaction. `FailedUnacknowledged` is not:
//! the store redelivers the purchase and it re-enters `Delivered`.

use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryState {
    Delivered,
    Validating,
    Finalized,
    FailedUnacknowledged,
}

impl DeliveryState {
    pub fn is_terminal(self) -> bool {
        self == DeliveryState::Finalized
    }

    /// State for a (re)delivery of a transaction whose previous state is `previous`.
    pub fn deliver(previous: Option<DeliveryState>) -> DomainResult<DeliveryState> {
        match previous {
            None | Some(DeliveryState::FailedUnacknowledged) => Ok(DeliveryState::Delivered),
            Some(state) => Err(DomainError::invariant(format!(
                "cannot redeliver a transaction in state {state:?}"
            ))),
        }
    }

    /// Move to `next`, rejecting transitions the lifecycle does not allow.
    pub fn transition(self, next: DeliveryState) -> DomainResult<DeliveryState> {
        use DeliveryState::*;

        match (self, next) {
            (Delivered, Validating)
            | (Validating, Finalized)
            | (Validating, FailedUnacknowledged)
            | (FailedUnacknowledged, Delivered) => Ok(next),
            (from, to) => Err(DomainError::invariant(format!(
                "illegal delivery transition {from:?} -> {to:?}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn any_state() -> impl Strategy<Value = DeliveryState> {
        prop_oneof![
            Just(DeliveryState::Delivered),
            Just(DeliveryState::Validating),
            Just(DeliveryState::Finalized),
            Just(DeliveryState::FailedUnacknowledged),
        ]
    }

    #[test]
    fn happy_path_reaches_finalized() {
        let s = DeliveryState::deliver(None).unwrap();
        let s = s.transition(DeliveryState::Validating).unwrap();
        let s = s.transition(DeliveryState::Finalized).unwrap();
        assert!(s.is_terminal());
    }

    #[test]
    fn failed_delivery_can_be_redelivered() {
        let s = DeliveryState::Validating
            .transition(DeliveryState::FailedUnacknowledged)
            .unwrap();
        assert_eq!(DeliveryState::deliver(Some(s)).unwrap(), DeliveryState::Delivered);
    }

    #[test]
    fn in_flight_transaction_cannot_be_redelivered() {
        assert!(DeliveryState::deliver(Some(DeliveryState::Validating)).is_err());
    }

    proptest! {
        #[test]
        fn finalized_is_terminal(next in any_state()) {
            prop_assert!(DeliveryState::Finalized.transition(next).is_err());
            prop_assert!(DeliveryState::deliver(Some(DeliveryState::Finalized)).is_err());
        }

        #[test]
        fn finalization_requires_validation(from in any_state()) {
            let result = from.transition(DeliveryState::Finalized);
            prop_assert_eq!(result.is_ok(), from == DeliveryState::Validating);
        }
    }
}
