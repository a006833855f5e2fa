use teloxide::types::ChatId;
use uuid::Uuid;

use crate::error::BotError;
use crate::models::Plan;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BillStatus {
    /// Created locally, not yet opened with the provider.
    Pending,
    Paid,
    Waiting,
    Expired,
    Canceled,
}

impl BillStatus {
    /// Map a provider status string onto the local enum. Anything
    /// unrecognized degrades to `Waiting`: access is only ever granted on a
    /// literal PAID.
    pub fn from_provider(raw: &str) -> Self {
        match raw {
            "PAID" => BillStatus::Paid,
            "WAITING" => BillStatus::Waiting,
            "EXPIRED" => BillStatus::Expired,
            "REJECTED" => BillStatus::Canceled,
            other => {
                log::warn!("Unrecognized bill status {:?}, treating as waiting", other);
                BillStatus::Waiting
            }
        }
    }
}

/// An open bill plus the plan snapshot taken when it was created, so later
/// settlement does not depend on the live plan table.
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentBill {
    pub bill_id: String,
    pub user_id: ChatId,
    pub plan_name: String,
    pub plan: Plan,
    pub status: BillStatus,
}

impl PaymentBill {
    pub fn new(user_id: ChatId, plan_name: &str, plan: &Plan) -> Self {
        Self {
            bill_id: format!("{}_{}", user_id.0, Uuid::new_v4()),
            user_id,
            plan_name: plan_name.to_string(),
            plan: plan.clone(),
            status: BillStatus::Pending,
        }
    }

    /// Reconstruct a snapshot for a bill whose session did not survive a
    /// restart. Only ever built from a PAID notification.
    pub fn rebuilt(bill_id: &str, user_id: ChatId, plan_name: &str, plan: &Plan) -> Self {
        Self {
            bill_id: bill_id.to_string(),
            user_id,
            plan_name: plan_name.to_string(),
            plan: plan.clone(),
            status: BillStatus::Paid,
        }
    }
}

/// Recover the purchaser from a `"{user_id}_{uuid}"` bill id.
pub fn user_from_bill_id(bill_id: &str) -> Result<ChatId, BotError> {
    bill_id
        .split('_')
        .next()
        .and_then(|prefix| prefix.parse::<i64>().ok())
        .filter(|id| *id > 0)
        .map(ChatId)
        .ok_or_else(|| {
            BotError::MalformedCallback(format!(
                "bill id {:?} does not start with a user id",
                bill_id
            ))
        })
}
