use std::error::Error;

use teloxide::prelude::*;

use crate::bot_state::BotState;
use crate::error::BotError;
use crate::handlers::payments::{cancel_payment, check_payment, open_payment};
use crate::handlers::utils::{format_amount, home_menu, plan_list, plan_menu, render, start_menu};
use crate::messaging::Messaging;
use crate::models::{Stage, UserSubscription};

/// What [`advance_dialogue`] did with a message.
#[derive(Debug, PartialEq, Eq)]
pub enum Flow {
    Handled,
    /// The text matched no button of the user's current stage.
    Ignored,
}

pub async fn message_handler(
    bot: Bot,
    msg: Message,
    state: BotState,
) -> Result<(), Box<dyn Error + Send + Sync>> {
    let user = msg.chat.id;

    let Some(text) = msg.text() else {
        // Stickers, photos and the like have no place in the menus.
        bot.delete_message(user, msg.id).await?;
        return Ok(());
    };

    // Commands are already handled by the command handler
    if text.starts_with('/') {
        return Ok(());
    }

    match advance_dialogue(&bot, &state, user, text).await {
        Ok(Flow::Handled) => {}
        Ok(Flow::Ignored) => {
            // Deleted so the chat stays a clean menu.
            bot.delete_message(user, msg.id).await?;
        }
        Err(e) => {
            log::error!("Dialogue with {} failed: {}", user, e);
            let _ = bot.send_text(user, &state.config.texts.error_retry).await;
        }
    }
    Ok(())
}

/// Drive the conversation one step.
pub async fn advance_dialogue(
    m: &impl Messaging,
    state: &BotState,
    user: ChatId,
    text: &str,
) -> Result<Flow, BotError> {
    let texts = &state.config.texts;

    match state.stage(user).await {
        Stage::Start => {
            if text == texts.start_button {
                show_plans(m, state, user).await?;
            } else if text == texts.info_button {
                show_subscription_info(m, state, user).await?;
            } else if text == texts.home_button {
                go_home(m, state, user).await?;
            } else {
                return Ok(Flow::Ignored);
            }
        }
        Stage::PlanSelect => {
            if text == texts.home_button {
                go_home(m, state, user).await?;
            } else if state.config.plans.contains_key(text) {
                open_payment(m, state, user, text).await?;
            } else {
                return Ok(Flow::Ignored);
            }
        }
        Stage::Info => {
            if text == texts.home_button {
                go_home(m, state, user).await?;
            } else {
                return Ok(Flow::Ignored);
            }
        }
        Stage::AwaitingPayment(pending) => {
            if text == texts.home_button {
                go_home(m, state, user).await?;
            } else if text == texts.payment_check || text == texts.payment_checkagain {
                // Both check labels work: the button is relabeled after the
                // first unpaid answer, but older keyboards stay on screen.
                check_payment(m, state, user, &pending).await?;
            } else if text == texts.payment_cancel {
                cancel_payment(m, state, user, &pending).await?;
            } else {
                return Ok(Flow::Ignored);
            }
        }
    }

    Ok(Flow::Handled)
}

/// Back to the main menu, from anywhere.
pub async fn go_home(m: &impl Messaging, state: &BotState, user: ChatId) -> Result<(), BotError> {
    // An abandoned bill is released locally; paying it late still lands
    // through the push path.
    if let Stage::AwaitingPayment(pending) = state.stage(user).await {
        state.sessions.take(&pending.bill_id).await;
    }
    state.reset(user).await;
    m.send_menu(user, &state.config.texts.start, start_menu(&state.config)).await?;
    Ok(())
}

async fn show_plans(m: &impl Messaging, state: &BotState, user: ChatId) -> Result<(), BotError> {
    state.set_stage(user, Stage::PlanSelect).await;
    m.send_menu(user, &plan_list(&state.config), plan_menu(&state.config)).await?;
    Ok(())
}

async fn show_subscription_info(
    m: &impl Messaging,
    state: &BotState,
    user: ChatId,
) -> Result<(), BotError> {
    let texts = &state.config.texts;

    let text = match state.store.get(user).await? {
        Some(UserSubscription { unlimited: true, total_spent, .. }) => render(
            &texts.info_format,
            &[
                ("expires", texts.info_forever.as_str()),
                ("spent", &format_amount(total_spent)),
            ],
        ),
        Some(UserSubscription { expires_at: Some(at), total_spent, .. }) => render(
            &texts.info_format,
            &[
                ("expires", &at.format("%Y-%m-%d %H:%M UTC").to_string()),
                ("spent", &format_amount(total_spent)),
            ],
        ),
        // Registered but never bought anything.
        _ => texts.info_none.clone(),
    };

    state.set_stage(user, Stage::Info).await;
    m.send_menu(user, &text, home_menu(&state.config)).await?;
    Ok(())
}
