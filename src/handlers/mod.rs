pub mod commands;
pub mod messages;
pub mod payments;
pub mod utils;

pub use commands::command_handler;
pub use messages::message_handler;
pub use payments::handle_push;

use std::time::Duration;

use chrono::{DateTime, Utc};
use teloxide::types::ChatId;
use teloxide::Bot;
use tokio::time;

use crate::bot_state::BotState;
use crate::error::BotError;
use crate::messaging::Messaging;

/// Hourly pass over the subscription table, evicting everyone whose time
/// ran out.
pub async fn expiry_sweep_task(bot: Bot, state: BotState) {
    let mut interval = time::interval(Duration::from_secs(60 * 60));

    loop {
        interval.tick().await;
        run_sweep_cycle(&bot, &state).await;
    }
}

/// One sweep. A failing user never stops the pass, and evictions are
/// spaced a second apart to stay under the API rate limits.
pub async fn run_sweep_cycle(m: &impl Messaging, state: &BotState) {
    let as_of = Utc::now();
    let expired = match state.store.list_expired(as_of).await {
        Ok(expired) => expired,
        Err(e) => {
            log::error!("Could not list expired subscriptions: {}", e);
            return;
        }
    };

    if expired.is_empty() {
        return;
    }
    log::info!("Sweeping {} expired subscriptions", expired.len());

    for (i, user) in expired.into_iter().enumerate() {
        if i > 0 {
            time::sleep(Duration::from_secs(1)).await;
        }
        if let Err(e) = expire_user(m, state, user, as_of).await {
            log::error!("Could not expire user {}: {}", user, e);
        }
    }
}

/// Expire one user: the record goes first, then the goodbye message, then
/// the channel kick. The listing is minutes stale by the time a paced
/// cycle gets here, so the delete re-checks the expiry and a user who
/// renewed in the meantime is left alone.
async fn expire_user(
    m: &impl Messaging,
    state: &BotState,
    user: ChatId,
    as_of: DateTime<Utc>,
) -> Result<(), BotError> {
    if !state.store.discard_if_expired(user, as_of).await? {
        log::debug!("User {} renewed while the sweep was running", user);
        return Ok(());
    }

    if let Err(e) = m.send_text(user, &state.config.texts.expired).await {
        // They may have blocked the bot; the eviction still proceeds.
        log::warn!("Could not notify user {} about expiry: {}", user, e);
    }

    m.revoke_access(state.config.channel(), user).await?;
    log::info!("Removed expired user {} from the channel", user);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::SubscriptionStore;
    use crate::testing::{self, FakeMessaging};
    use async_trait::async_trait;
    use std::sync::atomic::Ordering;
    use std::sync::Mutex;

    /// Transport double whose expiry notification buys `payer` a fresh
    /// subscription, like a user completing a payment while the paced
    /// sweep is busy with somebody else.
    struct RenewingMessaging {
        store: SubscriptionStore,
        payer: ChatId,
        notified: Mutex<Vec<ChatId>>,
        revoked: Mutex<Vec<ChatId>>,
    }

    #[async_trait]
    impl Messaging for RenewingMessaging {
        async fn send_text(&self, user: ChatId, _text: &str) -> Result<(), BotError> {
            self.notified.lock().unwrap().push(user);
            self.store.apply(self.payer, 30, false, 199.0).await.unwrap();
            Ok(())
        }

        async fn send_menu(
            &self,
            user: ChatId,
            text: &str,
            _buttons: Vec<Vec<String>>,
        ) -> Result<(), BotError> {
            self.send_text(user, text).await
        }

        async fn invite_link(
            &self,
            _channel: ChatId,
            _expires_at: DateTime<Utc>,
        ) -> Result<String, BotError> {
            Ok(String::new())
        }

        async fn revoke_access(&self, _channel: ChatId, user: ChatId) -> Result<(), BotError> {
            self.revoked.lock().unwrap().push(user);
            Ok(())
        }
    }

    #[tokio::test]
    async fn sweep_discards_notifies_and_kicks_expired_users() {
        let state = testing::state().await;
        let m = FakeMessaging::default();
        let user = ChatId(5);
        state.store.apply(user, -2, false, 199.0).await.unwrap();

        run_sweep_cycle(&m, &state).await;

        assert!(state.store.get(user).await.unwrap().is_none());
        assert_eq!(m.texts_for(user), vec![state.config.texts.expired.clone()]);
        assert_eq!(
            m.revoked.lock().unwrap().as_slice(),
            [(state.config.channel(), user)]
        );
    }

    #[tokio::test]
    async fn active_and_unlimited_users_survive_the_sweep() {
        let state = testing::state().await;
        let m = FakeMessaging::default();
        state.store.apply(ChatId(1), 30, false, 199.0).await.unwrap();
        state.store.apply(ChatId(2), -1, true, 500.0).await.unwrap();

        run_sweep_cycle(&m, &state).await;

        assert!(state.store.get(ChatId(1)).await.unwrap().is_some());
        assert!(state.store.get(ChatId(2)).await.unwrap().is_some());
        assert!(m.revoked.lock().unwrap().is_empty());
        assert!(m.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn one_failing_eviction_does_not_stop_the_sweep() {
        let state = testing::state().await;
        let m = FakeMessaging::default();
        m.fail_revokes.store(true, Ordering::SeqCst);
        state.store.apply(ChatId(1), -2, false, 100.0).await.unwrap();
        state.store.apply(ChatId(2), -2, false, 100.0).await.unwrap();

        run_sweep_cycle(&m, &state).await;

        // Both were processed despite every kick failing.
        assert!(state.store.get(ChatId(1)).await.unwrap().is_none());
        assert!(state.store.get(ChatId(2)).await.unwrap().is_none());
        assert_eq!(m.sent.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn a_renewal_during_the_sweep_is_not_evicted() {
        let state = testing::state().await;
        let payer = ChatId(2);
        state.store.apply(ChatId(1), -2, false, 100.0).await.unwrap();
        state.store.apply(payer, -2, false, 100.0).await.unwrap();
        let m = RenewingMessaging {
            store: state.store.clone(),
            payer,
            notified: Mutex::new(Vec::new()),
            revoked: Mutex::new(Vec::new()),
        };

        // Notifying ChatId(1) lands the payer's renewal mid-cycle.
        run_sweep_cycle(&m, &state).await;

        let renewed = state.store.get(payer).await.unwrap().unwrap();
        assert!(renewed.expires_at.unwrap() > Utc::now());
        assert_eq!(renewed.total_spent, 100.0 + 199.0);
        assert_eq!(m.notified.lock().unwrap().as_slice(), [ChatId(1)]);
        assert_eq!(m.revoked.lock().unwrap().as_slice(), [ChatId(1)]);
    }

    #[tokio::test]
    async fn blocked_users_are_still_kicked() {
        let state = testing::state().await;
        let m = FakeMessaging::default();
        m.fail_sends.store(true, Ordering::SeqCst);
        let user = ChatId(5);
        state.store.apply(user, -2, false, 100.0).await.unwrap();

        run_sweep_cycle(&m, &state).await;

        assert!(state.store.get(user).await.unwrap().is_none());
        assert_eq!(m.revoked.lock().unwrap().len(), 1);
    }
}
