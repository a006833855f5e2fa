use std::sync::Arc;
use std::time::Duration;

use teloxide::{prelude::*, utils::command::BotCommands};
use tokio::time;

mod bot_state;
mod config;
mod database;
mod error;
mod handlers;
mod messaging;
mod models;
mod payment;
#[cfg(test)]
mod testing;

use crate::bot_state::BotState;
use crate::config::Config;
use crate::database::SubscriptionStore;
use crate::handlers::{command_handler, message_handler};
use crate::payment::notify::notification_listener_task;
use crate::payment::QiwiP2p;

#[derive(BotCommands, Clone)]
#[command(rename_rule = "lowercase", description = "Available commands:")]
enum Command {
    #[command(description = "open the main menu")]
    Start,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    env_logger::init();
    log::info!("Starting subscription bot...");

    let config = Config::load(None)?;
    config.validate().map_err(|e| anyhow::anyhow!(e))?;

    let store =
        SubscriptionStore::connect(&config.database.url, config.database.max_connections).await?;
    store.init().await?;
    log::info!("✅ Database initialized");

    let bot = Bot::new(config.telegram.token.clone());
    let provider = Arc::new(QiwiP2p::new(config.qiwi.clone())?);
    let state = BotState::new(config, store, provider);

    // Hourly eviction of expired subscriptions
    let bot_clone = bot.clone();
    let state_clone = state.clone();
    tokio::spawn(async move {
        handlers::expiry_sweep_task(bot_clone, state_clone).await;
    });

    // Push notifications from the payment provider
    let bot_clone = bot.clone();
    let state_clone = state.clone();
    tokio::spawn(async move {
        notification_listener_task(bot_clone, state_clone).await;
    });

    // Abandoned dialogues and stale settlement markers
    let state_clone = state.clone();
    tokio::spawn(async move {
        let mut interval = time::interval(Duration::from_secs(600));
        loop {
            interval.tick().await;
            state_clone.cleanup_dialogues().await;
            state_clone
                .sessions
                .cleanup(Duration::from_secs(bot_state::DIALOGUE_IDLE_SECS))
                .await;
        }
    });

    let handler = dptree::entry()
        .branch(
            Update::filter_message()
                .filter_command::<Command>()
                .endpoint(command_handler),
        )
        .branch(Update::filter_message().endpoint(message_handler));

    log::info!("🚀 Starting dispatcher...");

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![state])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    Ok(())
}
