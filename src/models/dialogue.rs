use crate::models::Plan;

/// Where a user currently is in the menu. Volatile: dropping an entry just
/// sends the user back to the main menu, and a paid bill is still settled
/// through the push path.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Stage {
    #[default]
    Start,
    PlanSelect,
    Info,
    AwaitingPayment(PendingPayment),
}

/// Context carried while a bill is open: enough to re-check, cancel, or
/// settle it even if the session registry was lost in between.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingPayment {
    pub bill_id: String,
    pub plan_name: String,
    pub plan: Plan,
}
