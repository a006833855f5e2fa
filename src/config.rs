use config::{Config as ConfigBuilder, Environment, File};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::env;
use teloxide::types::ChatId;

use crate::error::BotError;
use crate::models::{Plan, UNLIMITED_DAYS};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub database: DatabaseConfig,
    pub telegram: TelegramConfig,
    pub qiwi: QiwiConfig,
    /// Plans keyed by display name; the name doubles as the menu button
    /// label and the bill comment.
    pub plans: BTreeMap<String, Plan>,
    #[serde(default)]
    pub texts: Texts,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct TelegramConfig {
    pub token: String,
    /// Chat id of the paid channel the bot manages invites for.
    pub channel_id: i64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct QiwiConfig {
    pub secret_key: String,
    pub currency: String,
    #[serde(default)]
    pub theme_code: String,
    pub bill_lifetime_minutes: i64,
    pub api_url: String,
    /// Port the push-notification listener binds on.
    pub notify_port: u16,
}

/// Every user-facing string. Overridable from the config file; the defaults
/// keep the bot usable with a minimal config.
#[derive(Debug, Deserialize, Clone)]
pub struct Texts {
    #[serde(default = "default_home_button")]
    pub home_button: String,
    #[serde(default = "default_start")]
    pub start: String,
    #[serde(default = "default_start_button")]
    pub start_button: String,
    #[serde(default = "default_info_button")]
    pub info_button: String,
    #[serde(default = "default_select_plan")]
    pub select_plan: String,
    #[serde(default = "default_select_plan_item")]
    pub select_plan_item: String,
    #[serde(default = "default_payment_proceed")]
    pub payment_proceed: String,
    #[serde(default = "default_payment_check")]
    pub payment_check: String,
    #[serde(default = "default_payment_checkagain")]
    pub payment_checkagain: String,
    #[serde(default = "default_payment_notyet")]
    pub payment_notyet: String,
    #[serde(default = "default_payment_cancel")]
    pub payment_cancel: String,
    #[serde(default = "default_payment_canceled")]
    pub payment_canceled: String,
    #[serde(default = "default_payment_expired")]
    pub payment_expired: String,
    #[serde(default = "default_payment_success")]
    pub payment_success: String,
    #[serde(default = "default_payment_already")]
    pub payment_already: String,
    #[serde(default = "default_payment_uncertain")]
    pub payment_uncertain: String,
    #[serde(default = "default_info_none")]
    pub info_none: String,
    #[serde(default = "default_info_format")]
    pub info_format: String,
    #[serde(default = "default_info_forever")]
    pub info_forever: String,
    #[serde(default = "default_error_retry")]
    pub error_retry: String,
    #[serde(default = "default_expired")]
    pub expired: String,
}

impl Default for Texts {
    fn default() -> Self {
        Self {
            home_button: default_home_button(),
            start: default_start(),
            start_button: default_start_button(),
            info_button: default_info_button(),
            select_plan: default_select_plan(),
            select_plan_item: default_select_plan_item(),
            payment_proceed: default_payment_proceed(),
            payment_check: default_payment_check(),
            payment_checkagain: default_payment_checkagain(),
            payment_notyet: default_payment_notyet(),
            payment_cancel: default_payment_cancel(),
            payment_canceled: default_payment_canceled(),
            payment_expired: default_payment_expired(),
            payment_success: default_payment_success(),
            payment_already: default_payment_already(),
            payment_uncertain: default_payment_uncertain(),
            info_none: default_info_none(),
            info_format: default_info_format(),
            info_forever: default_info_forever(),
            error_retry: default_error_retry(),
            expired: default_expired(),
        }
    }
}

fn default_home_button() -> String {
    "menu".to_string()
}

fn default_start() -> String {
    "Welcome! Use the buttons below.".to_string()
}

fn default_start_button() -> String {
    "start".to_string()
}

fn default_info_button() -> String {
    "information".to_string()
}

fn default_select_plan() -> String {
    "Available plans:\n\n{plans}".to_string()
}

fn default_select_plan_item() -> String {
    "{name} | {days} days | {amount} | {description}".to_string()
}

fn default_payment_proceed() -> String {
    "Pay {amount} here: {url}\n\nPress the button below once you are done.".to_string()
}

fn default_payment_check() -> String {
    "check".to_string()
}

fn default_payment_checkagain() -> String {
    "check again".to_string()
}

fn default_payment_notyet() -> String {
    "The payment is not confirmed yet.".to_string()
}

fn default_payment_cancel() -> String {
    "cancel".to_string()
}

fn default_payment_canceled() -> String {
    "The bill was canceled.".to_string()
}

fn default_payment_expired() -> String {
    "The bill has expired, please pick a plan again.".to_string()
}

fn default_payment_success() -> String {
    "Payment received! Your invite link: {url}".to_string()
}

fn default_payment_already() -> String {
    "This payment has already been processed.".to_string()
}

fn default_payment_uncertain() -> String {
    "We could not confirm your subscription yet. Press the check button again in a minute.".to_string()
}

fn default_info_none() -> String {
    "You have no active subscription.".to_string()
}

fn default_info_format() -> String {
    "Subscription active until: {expires}\nTotal spent: {spent}".to_string()
}

fn default_info_forever() -> String {
    "forever".to_string()
}

fn default_error_retry() -> String {
    "Something went wrong, please try again later.".to_string()
}

fn default_expired() -> String {
    "Your subscription has expired.".to_string()
}

impl Config {
    /// Load configuration from file and environment variables
    ///
    /// Priority (highest to lowest):
    /// 1. Environment variables (PASSBOT__QIWI__SECRET_KEY, etc.)
    /// 2. Config file (CONFIG_PATH or ./config.yml)
    /// 3. Hardcoded defaults
    pub fn load(config_path: Option<String>) -> Result<Self, BotError> {
        let mut builder = ConfigBuilder::builder();

        builder = builder
            .set_default("database.url", "sqlite:passbot.db")?
            .set_default("database.max_connections", 5)?
            .set_default("qiwi.currency", "RUB")?
            .set_default("qiwi.bill_lifetime_minutes", 30)?
            .set_default("qiwi.api_url", "https://api.qiwi.com/partner/bill/v1/bills")?
            .set_default("qiwi.notify_port", 8000)?;

        let config_file_path = config_path
            .or_else(|| env::var("CONFIG_PATH").ok())
            .unwrap_or_else(|| "config.yml".to_string());

        if std::path::Path::new(&config_file_path).exists() {
            builder = builder.add_source(File::with_name(&config_file_path));
        }

        builder = builder.add_source(
            Environment::with_prefix("PASSBOT")
                .separator("__")
                .try_parsing(true),
        );

        // Also support bare environment variables for the secrets
        if let Ok(token) = env::var("BOT_TOKEN") {
            builder = builder.set_override("telegram.token", token)?;
        }
        if let Ok(secret_key) = env::var("QIWI_SECRET_KEY") {
            builder = builder.set_override("qiwi.secret_key", secret_key)?;
        }
        if let Ok(database_url) = env::var("DATABASE_URL") {
            builder = builder.set_override("database.url", database_url)?;
        }

        Ok(builder.build()?.try_deserialize()?)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.telegram.token.is_empty() {
            return Err("Telegram bot token must be set".to_string());
        }
        if self.telegram.channel_id == 0 {
            return Err("Paid channel id must be set".to_string());
        }
        if self.qiwi.secret_key.is_empty() {
            return Err("QIWI secret key must be set".to_string());
        }
        if self.qiwi.notify_port == 0 {
            return Err("Notify port must be greater than 0".to_string());
        }
        if self.database.max_connections < 1 {
            return Err("Database max_connections must be at least 1".to_string());
        }
        if self.plans.is_empty() {
            return Err("At least one plan must be configured".to_string());
        }
        for (name, plan) in &self.plans {
            if plan.days == 0 || plan.days < UNLIMITED_DAYS {
                return Err(format!(
                    "Plan {:?} has invalid length {} (use a positive day count or -1 for unlimited)",
                    name, plan.days
                ));
            }
            if plan.amount <= 0.0 {
                return Err(format!("Plan {:?} must cost more than zero", name));
            }
        }
        Ok(())
    }

    pub fn channel(&self) -> ChatId {
        ChatId(self.telegram.channel_id)
    }

    pub fn plan(&self, name: &str) -> Result<&Plan, BotError> {
        self.plans
            .get(name)
            .ok_or_else(|| BotError::InvalidInput(format!("unknown plan {:?}", name)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> Config {
        Config {
            database: DatabaseConfig {
                url: "sqlite:test.db".to_string(),
                max_connections: 5,
            },
            telegram: TelegramConfig {
                token: "123456:ABCDEF".to_string(),
                channel_id: -1001234567890,
            },
            qiwi: QiwiConfig {
                secret_key: "test_secret".to_string(),
                currency: "RUB".to_string(),
                theme_code: String::new(),
                bill_lifetime_minutes: 30,
                api_url: "https://api.qiwi.com/partner/bill/v1/bills".to_string(),
                notify_port: 8000,
            },
            plans: BTreeMap::from([(
                "month".to_string(),
                Plan {
                    days: 30,
                    amount: 100.0,
                    description: "one month".to_string(),
                },
            )]),
            texts: Texts::default(),
        }
    }

    #[test]
    fn test_validation_valid_config() {
        assert!(base_config().validate().is_ok());
    }

    #[test]
    fn test_validation_missing_token() {
        let mut config = base_config();
        config.telegram.token = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_no_plans() {
        let mut config = base_config();
        config.plans.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_rejects_zero_day_plan() {
        let mut config = base_config();
        config.plans.insert(
            "broken".to_string(),
            Plan {
                days: 0,
                amount: 10.0,
                description: String::new(),
            },
        );
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_accepts_unlimited_plan() {
        let mut config = base_config();
        config.plans.insert(
            "forever".to_string(),
            Plan {
                days: UNLIMITED_DAYS,
                amount: 1000.0,
                description: String::new(),
            },
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_without_required_keys_is_a_config_error() {
        // No file and no plan table: deserialization cannot complete.
        let result = Config::load(Some("definitely-missing.yml".to_string()));
        assert!(matches!(result, Err(BotError::Config(_))));
    }

    #[test]
    fn test_unknown_plan_lookup_is_invalid_input() {
        let config = base_config();
        assert!(matches!(
            config.plan("gold"),
            Err(crate::error::BotError::InvalidInput(_))
        ));
        assert!(config.plan("month").is_ok());
    }
}
