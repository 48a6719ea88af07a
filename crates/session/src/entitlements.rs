//! Where derived entitlements go.

use std::sync::Arc;

use iapkit_core::PlanState;
use tokio::sync::watch;

/// Application state that receives plan changes from accepted purchases.
pub trait EntitlementSink: Send + Sync {
    fn apply(&self, plan: PlanState);
}

/// Keeps the latest active plan in memory and lets observers subscribe.
#[derive(Debug, Clone)]
pub struct InMemoryEntitlements {
    active: Arc<watch::Sender<Option<PlanState>>>,
}

impl Default for InMemoryEntitlements {
    fn default() -> Self {
        let (active, _) = watch::channel(None);
        Self {
            active: Arc::new(active),
        }
    }
}

impl InMemoryEntitlements {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn active(&self) -> Option<PlanState> {
        self.active.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<PlanState>> {
        self.active.subscribe()
    }
}

impl EntitlementSink for InMemoryEntitlements {
    fn apply(&self, plan: PlanState) {
        tracing::info!(plan_id = %plan.plan_id, "active plan updated");
        self.active.send_replace(Some(plan));
    }
}
