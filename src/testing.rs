//! Shared fixtures: an in-memory bot state plus recording fakes for the
//! chat transport and the payment provider.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use teloxide::types::ChatId;

use crate::bot_state::BotState;
use crate::config::{Config, DatabaseConfig, QiwiConfig, TelegramConfig, Texts};
use crate::database::SubscriptionStore;
use crate::error::BotError;
use crate::messaging::Messaging;
use crate::models::{BillStatus, PaymentBill, Plan};
use crate::payment::PaymentProvider;

pub fn config() -> Config {
    let mut plans = BTreeMap::new();
    plans.insert(
        "monthly".to_string(),
        Plan {
            days: 30,
            amount: 199.0,
            description: "a month of access".to_string(),
        },
    );
    plans.insert(
        "lifetime".to_string(),
        Plan {
            days: -1,
            amount: 500.0,
            description: "never expires".to_string(),
        },
    );

    Config {
        database: DatabaseConfig {
            url: "sqlite::memory:".to_string(),
            max_connections: 1,
        },
        telegram: TelegramConfig {
            token: "123456:TEST".to_string(),
            channel_id: -1001234,
        },
        qiwi: QiwiConfig {
            secret_key: "secret".to_string(),
            currency: "RUB".to_string(),
            theme_code: String::new(),
            bill_lifetime_minutes: 30,
            api_url: "https://api.qiwi.com/partner/bill/v1/bills".to_string(),
            notify_port: 8000,
        },
        plans,
        texts: Texts::default(),
    }
}

/// A bot state over a fresh in-memory store and a provider that reports
/// every bill as paid.
pub async fn state() -> BotState {
    state_with(Arc::new(FakeProvider::new(BillStatus::Paid))).await
}

pub async fn state_with(provider: Arc<dyn PaymentProvider>) -> BotState {
    let config = config();
    let store = SubscriptionStore::connect(&config.database.url, config.database.max_connections)
        .await
        .unwrap();
    store.init().await.unwrap();
    BotState::new(config, store, provider)
}

/// Payment provider double. Records calls and answers every status check
/// with one fixed status.
pub struct FakeProvider {
    pub status: Mutex<BillStatus>,
    pub opened: Mutex<Vec<String>>,
    pub rejected: Mutex<Vec<String>>,
    pub fail_open: AtomicBool,
    pub fail_reject: AtomicBool,
}

impl FakeProvider {
    pub fn new(status: BillStatus) -> Self {
        Self {
            status: Mutex::new(status),
            opened: Mutex::new(Vec::new()),
            rejected: Mutex::new(Vec::new()),
            fail_open: AtomicBool::new(false),
            fail_reject: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl PaymentProvider for FakeProvider {
    async fn open_bill(&self, bill: &PaymentBill) -> Result<String, BotError> {
        if self.fail_open.load(Ordering::SeqCst) {
            return Err(BotError::Provider("open_bill failed".to_string()));
        }
        self.opened.lock().unwrap().push(bill.bill_id.clone());
        Ok("https://pay.example/form".to_string())
    }

    async fn bill_status(&self, _bill_id: &str) -> Result<BillStatus, BotError> {
        Ok(*self.status.lock().unwrap())
    }

    async fn reject_bill(&self, bill_id: &str) -> Result<(), BotError> {
        if self.fail_reject.load(Ordering::SeqCst) {
            return Err(BotError::Provider("reject failed".to_string()));
        }
        self.rejected.lock().unwrap().push(bill_id.to_string());
        Ok(())
    }
}

/// Chat transport double recording everything the bot would have sent.
#[derive(Default)]
pub struct FakeMessaging {
    pub sent: Mutex<Vec<(ChatId, String)>>,
    pub menus: Mutex<Vec<(ChatId, Vec<Vec<String>>)>>,
    pub invites: Mutex<Vec<(ChatId, DateTime<Utc>)>>,
    pub revoked: Mutex<Vec<(ChatId, ChatId)>>,
    pub fail_sends: AtomicBool,
    pub fail_revokes: AtomicBool,
}

impl FakeMessaging {
    pub fn last_text(&self) -> String {
        self.sent.lock().unwrap().last().map(|(_, text)| text.clone()).unwrap_or_default()
    }

    pub fn last_menu(&self) -> Vec<Vec<String>> {
        self.menus.lock().unwrap().last().map(|(_, menu)| menu.clone()).unwrap_or_default()
    }

    pub fn texts_for(&self, user: ChatId) -> Vec<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|(to, _)| *to == user)
            .map(|(_, text)| text.clone())
            .collect()
    }
}

#[async_trait]
impl Messaging for FakeMessaging {
    async fn send_text(&self, user: ChatId, text: &str) -> Result<(), BotError> {
        if self.fail_sends.load(Ordering::SeqCst) {
            return Err(BotError::Provider("send_text failed".to_string()));
        }
        self.sent.lock().unwrap().push((user, text.to_string()));
        Ok(())
    }

    async fn send_menu(
        &self,
        user: ChatId,
        text: &str,
        buttons: Vec<Vec<String>>,
    ) -> Result<(), BotError> {
        if self.fail_sends.load(Ordering::SeqCst) {
            return Err(BotError::Provider("send_menu failed".to_string()));
        }
        self.sent.lock().unwrap().push((user, text.to_string()));
        self.menus.lock().unwrap().push((user, buttons));
        Ok(())
    }

    async fn invite_link(
        &self,
        channel: ChatId,
        expires_at: DateTime<Utc>,
    ) -> Result<String, BotError> {
        self.invites.lock().unwrap().push((channel, expires_at));
        Ok("https://t.me/+invite".to_string())
    }

    async fn revoke_access(&self, channel: ChatId, user: ChatId) -> Result<(), BotError> {
        if self.fail_revokes.load(Ordering::SeqCst) {
            return Err(BotError::Provider("revoke failed".to_string()));
        }
        self.revoked.lock().unwrap().push((channel, user));
        Ok(())
    }
}
