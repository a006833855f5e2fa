use chrono::{DateTime, Utc};
use sqlx::FromRow;

/// One row per user. `expires_at` absent with `unlimited = false` means the
/// user is registered but has never bought anything. The `unlimited` flag,
/// not the timestamp, decides whether a user can lapse: unlimited rows keep
/// whatever stale `expires_at` they were written with.
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct UserSubscription {
    pub user_id: i64,
    pub expires_at: Option<DateTime<Utc>>,
    pub unlimited: bool,
    pub total_spent: f64,
}
