use std::collections::HashMap;
use std::sync::Arc;
use std::time::SystemTime;

use teloxide::types::ChatId;
use tokio::sync::RwLock;

use crate::config::Config;
use crate::database::SubscriptionStore;
use crate::models::Stage;
use crate::payment::{PaymentProvider, PaymentSessions};

type Dialogues = Arc<RwLock<HashMap<ChatId, (Stage, SystemTime)>>>;

/// A dialogue idle this long is abandoned. Kept well above the bill
/// lifetime so a slow payer is never cut off mid-purchase.
pub const DIALOGUE_IDLE_SECS: u64 = 24 * 60 * 60;

/// Everything the handlers share: configuration, the subscription store,
/// the open-bill registry and the per-user conversation stages.
#[derive(Clone)]
pub struct BotState {
    pub config: Arc<Config>,
    pub store: SubscriptionStore,
    pub provider: Arc<dyn PaymentProvider>,
    pub sessions: Arc<PaymentSessions>,
    dialogues: Dialogues,
}

impl BotState {
    pub fn new(
        config: Config,
        store: SubscriptionStore,
        provider: Arc<dyn PaymentProvider>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            store,
            provider,
            sessions: Arc::new(PaymentSessions::new()),
            dialogues: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Current conversation stage for a user, `Start` when none is recorded.
    pub async fn stage(&self, user: ChatId) -> Stage {
        let dialogues = self.dialogues.read().await;
        dialogues
            .get(&user)
            .map(|(stage, _)| stage.clone())
            .unwrap_or_default()
    }

    pub async fn set_stage(&self, user: ChatId, stage: Stage) {
        let mut dialogues = self.dialogues.write().await;
        dialogues.insert(user, (stage, SystemTime::now()));
    }

    /// Back to the main menu.
    pub async fn reset(&self, user: ChatId) {
        let mut dialogues = self.dialogues.write().await;
        dialogues.remove(&user);
    }

    /// Drop dialogues idle past [`DIALOGUE_IDLE_SECS`]. A dropped dialogue
    /// that was waiting for a payment takes its open bill with it, so the
    /// bill registry cannot outgrow the dialogue map.
    pub async fn cleanup_dialogues(&self) {
        let now = SystemTime::now();
        let mut dropped_bills = Vec::new();

        {
            let mut dialogues = self.dialogues.write().await;
            let previous_count = dialogues.len();

            dialogues.retain(|_, (stage, touched)| {
                let idle = now.duration_since(*touched).unwrap_or_default().as_secs();
                if idle < DIALOGUE_IDLE_SECS {
                    return true;
                }
                if let Stage::AwaitingPayment(pending) = stage {
                    dropped_bills.push(pending.bill_id.clone());
                }
                false
            });

            let current_count = dialogues.len();
            log::debug!(
                "🧹 Dialogues cleaned: {} -> {} entries",
                previous_count,
                current_count
            );
        }

        for bill_id in dropped_bills {
            self.sessions.take(&bill_id).await;
        }
    }
}
