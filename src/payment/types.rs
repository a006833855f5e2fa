use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenBillRequest {
    pub amount: BillAmount,
    pub comment: String,
    pub expiration_date_time: String,
    pub custom_fields: CustomFields,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BillAmount {
    pub currency: String,
    pub value: String,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomFields {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub theme_code: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BillResponse {
    pub bill_id: String,
    pub status: WireStatus,
    pub pay_url: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct WireStatus {
    pub value: String,
}

/// Body of the provider's payment notification callback.
#[derive(Clone, Debug, Deserialize)]
pub struct BillNotification {
    pub bill: NotifiedBill,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotifiedBill {
    pub bill_id: String,
    pub status: WireStatus,
    /// Set to the plan name when the bill is opened, so a notification is
    /// enough to reconstruct the purchase after a restart.
    #[serde(default)]
    pub comment: String,
}
