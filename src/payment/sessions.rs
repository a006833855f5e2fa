use std::collections::HashMap;
use std::time::{Duration, SystemTime};

use tokio::sync::RwLock;

use crate::models::PaymentBill;

#[derive(Default)]
struct Registry {
    open: HashMap<String, PaymentBill>,
    settled: HashMap<String, SystemTime>,
}

/// In-memory registry of open bills, shared between the conversation
/// handlers and the push listener.
///
/// Settling a bill means winning [`PaymentSessions::try_claim`] first.
/// The user-triggered check and the provider push can both learn that the
/// same bill was paid; only the claim winner writes the purchase, the loser
/// finds the id settled and backs off.
#[derive(Default)]
pub struct PaymentSessions {
    inner: RwLock<Registry>,
}

impl PaymentSessions {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register(&self, bill: PaymentBill) {
        let mut registry = self.inner.write().await;
        registry.open.insert(bill.bill_id.clone(), bill);
    }

    /// Remove a bill from the open set and return its snapshot.
    pub async fn take(&self, bill_id: &str) -> Option<PaymentBill> {
        self.inner.write().await.open.remove(bill_id)
    }

    /// Put a bill back after a failed settlement so the payment can be
    /// claimed again later.
    pub async fn restore(&self, bill: PaymentBill) {
        let mut registry = self.inner.write().await;
        registry.open.insert(bill.bill_id.clone(), bill);
    }

    /// Claim a bill for settlement. Returns false if some other path
    /// already claimed it.
    pub async fn try_claim(&self, bill_id: &str) -> bool {
        let mut registry = self.inner.write().await;
        if registry.settled.contains_key(bill_id) {
            return false;
        }
        registry.settled.insert(bill_id.to_string(), SystemTime::now());
        true
    }

    /// Release a claim whose settlement failed.
    pub async fn unclaim(&self, bill_id: &str) {
        self.inner.write().await.settled.remove(bill_id);
    }

    pub async fn is_settled(&self, bill_id: &str) -> bool {
        self.inner.read().await.settled.contains_key(bill_id)
    }

    /// Drop settlement markers older than `max_age`. The markers only guard
    /// against duplicate provider pushes, which stop within hours.
    pub async fn cleanup(&self, max_age: Duration) {
        let mut registry = self.inner.write().await;
        let before = registry.settled.len();
        registry
            .settled
            .retain(|_, at| at.elapsed().map(|age| age < max_age).unwrap_or(true));
        let after = registry.settled.len();
        if before != after {
            log::info!("🧹 Settled bills cleaned: {} -> {} entries", before, after);
        }
    }
}
