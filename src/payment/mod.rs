pub mod notify;
pub mod sessions;
pub mod types;

use std::time::Duration as StdDuration;

use async_trait::async_trait;
use chrono::{Duration, SecondsFormat, Utc};
use reqwest::Client;
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{policies::ExponentialBackoff, RetryTransientMiddleware};

use crate::config::QiwiConfig;
use crate::error::BotError;
use crate::models::{BillStatus, PaymentBill};
use crate::payment::types::{BillAmount, BillResponse, CustomFields, OpenBillRequest};

pub use sessions::PaymentSessions;

const RETRIES: u32 = 1;
const REQUEST_TIMEOUT_SECS: u64 = 10;

/// A remote invoicing backend.
#[async_trait]
pub trait PaymentProvider: Send + Sync {
    /// Open a bill with the provider and return the payment page URL.
    async fn open_bill(&self, bill: &PaymentBill) -> Result<String, BotError>;

    /// Current status of a previously opened bill. A transport timeout is
    /// reported as `Waiting` so an in-flight payment is never written off.
    async fn bill_status(&self, bill_id: &str) -> Result<BillStatus, BotError>;

    /// Void a bill so the payment page stops accepting money.
    async fn reject_bill(&self, bill_id: &str) -> Result<(), BotError>;
}

/// QIWI P2P invoicing API client.
pub struct QiwiP2p {
    client: ClientWithMiddleware,
    config: QiwiConfig,
}

impl QiwiP2p {
    pub fn new(config: QiwiConfig) -> Result<Self, BotError> {
        let retry_policy = ExponentialBackoff::builder().build_with_max_retries(RETRIES);

        let inner = Client::builder()
            .timeout(StdDuration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;
        let client = ClientBuilder::new(inner)
            .with(RetryTransientMiddleware::new_with_policy(retry_policy))
            .build();

        Ok(Self { client, config })
    }

    fn bill_url(&self, bill_id: &str) -> String {
        format!("{}/{}", self.config.api_url.trim_end_matches('/'), bill_id)
    }

    fn open_request(&self, bill: &PaymentBill) -> OpenBillRequest {
        let expires = Utc::now() + Duration::minutes(self.config.bill_lifetime_minutes);
        let theme_code = if self.config.theme_code.is_empty() {
            None
        } else {
            Some(self.config.theme_code.clone())
        };

        OpenBillRequest {
            amount: BillAmount {
                currency: self.config.currency.clone(),
                value: format_value(bill.plan.amount),
            },
            // The plan name rides along on the bill so a push notification
            // alone identifies the purchase.
            comment: bill.plan_name.clone(),
            expiration_date_time: expires.to_rfc3339_opts(SecondsFormat::Secs, false),
            custom_fields: CustomFields { theme_code },
        }
    }
}

#[async_trait]
impl PaymentProvider for QiwiP2p {
    async fn open_bill(&self, bill: &PaymentBill) -> Result<String, BotError> {
        let response = self
            .client
            .put(self.bill_url(&bill.bill_id))
            .bearer_auth(&self.config.secret_key)
            .header("Accept", "application/json")
            .header("Content-Type", "application/json")
            .body(serde_json::to_vec(&self.open_request(bill))?)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(BotError::Provider(format!(
                "opening bill {} failed with HTTP {}",
                bill.bill_id,
                response.status()
            )));
        }

        let body = response.json::<BillResponse>().await?;
        body.pay_url
            .ok_or_else(|| BotError::Provider(format!("bill {} has no payUrl", bill.bill_id)))
    }

    async fn bill_status(&self, bill_id: &str) -> Result<BillStatus, BotError> {
        let sent = self
            .client
            .get(self.bill_url(bill_id))
            .bearer_auth(&self.config.secret_key)
            .header("Accept", "application/json")
            .send()
            .await;

        let response = match sent {
            Ok(response) => response,
            Err(e) if is_timeout(&e) => {
                log::warn!("Status request for bill {} timed out, keeping it waiting", bill_id);
                return Ok(BillStatus::Waiting);
            }
            Err(e) => return Err(e.into()),
        };

        if !response.status().is_success() {
            return Err(BotError::Provider(format!(
                "status of bill {} failed with HTTP {}",
                bill_id,
                response.status()
            )));
        }

        let body = response.json::<BillResponse>().await?;
        Ok(BillStatus::from_provider(&body.status.value))
    }

    async fn reject_bill(&self, bill_id: &str) -> Result<(), BotError> {
        let response = self
            .client
            .post(format!("{}/reject", self.bill_url(bill_id)))
            .bearer_auth(&self.config.secret_key)
            .header("Accept", "application/json")
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(BotError::Provider(format!(
                "rejecting bill {} failed with HTTP {}",
                bill_id,
                response.status()
            )));
        }
        Ok(())
    }
}

fn is_timeout(err: &reqwest_middleware::Error) -> bool {
    matches!(err, reqwest_middleware::Error::Reqwest(e) if e.is_timeout())
}

fn format_value(amount: f64) -> String {
    format!("{:.2}", amount)
}
