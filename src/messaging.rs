use async_trait::async_trait;
use chrono::{DateTime, Utc};
use teloxide::prelude::*;
use teloxide::types::{KeyboardButton, KeyboardMarkup, ReplyMarkup, UserId};

use crate::error::BotError;

/// The slice of the chat platform the subscription flows need. Keeping it
/// narrow lets the settlement, conversation, and sweep logic run against a
/// recording fake in tests.
#[async_trait]
pub trait Messaging: Send + Sync {
    async fn send_text(&self, user: ChatId, text: &str) -> Result<(), BotError>;

    /// Send text together with a reply-button menu; `buttons` is a grid of
    /// button labels, one inner vec per row.
    async fn send_menu(
        &self,
        user: ChatId,
        text: &str,
        buttons: Vec<Vec<String>>,
    ) -> Result<(), BotError>;

    /// Create a fresh single-use invite link to the paid channel.
    async fn invite_link(
        &self,
        channel: ChatId,
        expires_at: DateTime<Utc>,
    ) -> Result<String, BotError>;

    /// Remove a user from the paid channel.
    async fn revoke_access(&self, channel: ChatId, user: ChatId) -> Result<(), BotError>;
}

#[async_trait]
impl Messaging for Bot {
    async fn send_text(&self, user: ChatId, text: &str) -> Result<(), BotError> {
        self.send_message(user, text).await?;
        Ok(())
    }

    async fn send_menu(
        &self,
        user: ChatId,
        text: &str,
        buttons: Vec<Vec<String>>,
    ) -> Result<(), BotError> {
        let rows = buttons
            .into_iter()
            .map(|row| row.into_iter().map(KeyboardButton::new).collect::<Vec<_>>());
        let keyboard = ReplyMarkup::Keyboard(KeyboardMarkup::new(rows).resize_keyboard());

        self.send_message(user, text).reply_markup(keyboard).await?;
        Ok(())
    }

    async fn invite_link(
        &self,
        channel: ChatId,
        expires_at: DateTime<Utc>,
    ) -> Result<String, BotError> {
        let link = self
            .create_chat_invite_link(channel)
            .expire_date(expires_at)
            .member_limit(1)
            .await?;
        Ok(link.invite_link)
    }

    async fn revoke_access(&self, channel: ChatId, user: ChatId) -> Result<(), BotError> {
        self.ban_chat_member(channel, UserId(user.0 as u64)).await?;
        Ok(())
    }
}
