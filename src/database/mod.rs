use chrono::{DateTime, Duration, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;
use teloxide::types::ChatId;

use crate::error::BotError;
use crate::models::UserSubscription;

#[derive(Clone, Debug)]
pub struct SubscriptionStore {
    pool: SqlitePool,
}

impl SubscriptionStore {
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, BotError> {
        let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await?;

        Ok(SubscriptionStore { pool })
    }

    pub async fn init(&self) -> Result<(), BotError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS subscriptions (
                user_id BIGINT PRIMARY KEY,
                expires_at TIMESTAMP,
                unlimited BOOLEAN NOT NULL DEFAULT FALSE,
                total_spent DOUBLE PRECISION NOT NULL DEFAULT 0
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_subscriptions_expires_at ON subscriptions (unlimited, expires_at)",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Create a default record for a first-time user. No-op if the user is
    /// already known.
    pub async fn register(&self, user_id: ChatId) -> Result<(), BotError> {
        sqlx::query(
            r#"
            INSERT INTO subscriptions (user_id, expires_at, unlimited, total_spent)
            VALUES ($1, NULL, FALSE, 0)
            ON CONFLICT (user_id) DO NOTHING
            "#,
        )
        .bind(user_id.0)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Grant (or re-grant) a subscription: the expiry is replaced counting
    /// from now, never stacked onto the previous one, and the amount is
    /// added to the lifetime spend. The accumulation happens inside the
    /// upsert so concurrent grants cannot lose an increment.
    pub async fn apply(
        &self,
        user_id: ChatId,
        days: i64,
        unlimited: bool,
        amount: f64,
    ) -> Result<(), BotError> {
        let expires_at = Utc::now() + Duration::days(days);

        sqlx::query(
            r#"
            INSERT INTO subscriptions (user_id, expires_at, unlimited, total_spent)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (user_id) DO UPDATE SET
                expires_at = EXCLUDED.expires_at,
                unlimited = EXCLUDED.unlimited,
                total_spent = total_spent + EXCLUDED.total_spent
            "#,
        )
        .bind(user_id.0)
        .bind(expires_at)
        .bind(unlimited)
        .bind(amount)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Delete a user's record. Idempotent.
    pub async fn discard(&self, user_id: ChatId) -> Result<(), BotError> {
        sqlx::query("DELETE FROM subscriptions WHERE user_id = $1")
            .bind(user_id.0)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Delete a user's record only while it is still lapsed at `as_of`.
    /// Returns false when nothing was deleted, meaning the user renewed
    /// after they were listed for eviction.
    pub async fn discard_if_expired(
        &self,
        user_id: ChatId,
        as_of: DateTime<Utc>,
    ) -> Result<bool, BotError> {
        let result = sqlx::query(
            r#"
            DELETE FROM subscriptions
            WHERE user_id = $1 AND unlimited = FALSE
                AND expires_at IS NOT NULL AND expires_at < $2
            "#,
        )
        .bind(user_id.0)
        .bind(as_of)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn get(&self, user_id: ChatId) -> Result<Option<UserSubscription>, BotError> {
        let subscription = sqlx::query_as::<_, UserSubscription>(
            "SELECT user_id, expires_at, unlimited, total_spent FROM subscriptions WHERE user_id = $1",
        )
        .bind(user_id.0)
        .fetch_optional(&self.pool)
        .await?;

        Ok(subscription)
    }

    /// Users whose subscription lapsed before `as_of`. Unlimited users are
    /// never listed, no matter how stale their stored expiry is.
    pub async fn list_expired(&self, as_of: DateTime<Utc>) -> Result<Vec<ChatId>, BotError> {
        let rows: Vec<(i64,)> = sqlx::query_as(
            r#"
            SELECT user_id FROM subscriptions
            WHERE unlimited = FALSE AND expires_at IS NOT NULL AND expires_at < $1
            ORDER BY user_id
            "#,
        )
        .bind(as_of)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|(user_id,)| ChatId(user_id)).collect())
    }

    #[cfg(test)]
    pub async fn close(&self) {
        self.pool.close().await;
    }
}
