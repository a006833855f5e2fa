use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::Router;
use teloxide::Bot;
use tokio::net::TcpListener;

use crate::bot_state::BotState;
use crate::error::BotError;
use crate::handlers::handle_push;
use crate::payment::types::BillNotification;

#[derive(Clone)]
struct NotifyContext {
    bot: Bot,
    state: BotState,
}

/// Listen for provider push notifications. The provider POSTs a bill update
/// here whenever its status changes, which settles payments even when the
/// user never presses the check button.
pub async fn notification_listener_task(bot: Bot, state: BotState) {
    let port = state.config.qiwi.notify_port;
    if let Err(e) = serve(bot, state, port).await {
        log::error!("Payment notification listener stopped: {}", e);
    }
}

async fn serve(bot: Bot, state: BotState, port: u16) -> Result<(), BotError> {
    let app = Router::new()
        .route("/", post(notify_handler))
        .with_state(NotifyContext { bot, state });

    let listener = TcpListener::bind(("0.0.0.0", port)).await?;
    log::info!("🚀 Payment notifications listening on port {}", port);
    axum::serve(listener, app).await?;
    Ok(())
}

async fn notify_handler(State(ctx): State<NotifyContext>, body: Bytes) -> StatusCode {
    let notification = match serde_json::from_slice::<BillNotification>(&body) {
        Ok(notification) => notification,
        Err(e) => {
            // An error reply would only make the provider resend the same
            // unreadable body.
            log::warn!("Dropping malformed payment notification: {}", e);
            return StatusCode::OK;
        }
    };

    match handle_push(&ctx.bot, &ctx.state, notification.bill).await {
        Ok(()) => StatusCode::OK,
        Err(BotError::Storage(e)) => {
            // Nothing was recorded. A retry from the provider can succeed.
            log::error!("Could not settle pushed payment: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        }
        Err(e) => {
            log::warn!("Ignoring payment notification: {}", e);
            StatusCode::OK
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing;
    use teloxide::types::ChatId;

    #[tokio::test]
    async fn malformed_notifications_are_acknowledged_and_dropped() {
        let ctx = NotifyContext {
            bot: Bot::new("123456:TEST"),
            state: testing::state().await,
        };

        let status = notify_handler(State(ctx), Bytes::from_static(b"not json")).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn unpaid_notifications_are_acknowledged_without_settling() {
        let ctx = NotifyContext {
            bot: Bot::new("123456:TEST"),
            state: testing::state().await,
        };

        let body = serde_json::json!({
            "bill": {
                "billId": "42_abc",
                "status": { "value": "WAITING" },
                "comment": "monthly"
            }
        });
        let status =
            notify_handler(State(ctx.clone()), Bytes::from(body.to_string())).await;

        assert_eq!(status, StatusCode::OK);
        assert!(ctx.state.store.get(ChatId(42)).await.unwrap().is_none());
    }
}
