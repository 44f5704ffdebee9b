use bkg_common::Money;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::QPayApiError;

/// Lifecycle of a QPay payment link, as reported by the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QPayLinkStatus {
    Pending,
    Processing,
    Paid,
    Cancelled,
    Expired,
    Failed,
}

impl QPayLinkStatus {
    pub fn is_paid(&self) -> bool {
        matches!(self, QPayLinkStatus::Paid)
    }

    /// Terminal from the gateway's point of view. `Pending`/`Processing` links can still change.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, QPayLinkStatus::Pending | QPayLinkStatus::Processing)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePaymentLinkRequest {
    pub order_code: String,
    pub amount: Money,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub buyer_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub buyer_email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub return_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cancel_url: Option<String>,
    /// The link dies at this instant. Keep it no later than the hold it is paying for.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expired_at: Option<DateTime<Utc>>,
}

/// A settled (or attempted) transfer against a payment link.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QPayTransaction {
    pub reference: String,
    pub amount: Money,
    #[serde(default)]
    pub description: String,
    pub transaction_time: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentLinkDetail {
    pub order_code: String,
    pub link_id: String,
    pub checkout_url: String,
    /// EMVCo QR payload for bank-app scanning.
    pub qr_code: String,
    pub amount: Money,
    pub status: QPayLinkStatus,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub expired_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub transactions: Vec<QPayTransaction>,
}

/// Every QPay REST response wraps its payload in this envelope. `"00"` is the success code.
#[derive(Debug, Clone, Deserialize)]
pub struct QPayResponse<T> {
    pub code: String,
    pub desc: String,
    pub data: Option<T>,
}

impl<T> QPayResponse<T> {
    pub fn into_result(self) -> Result<T, QPayApiError> {
        if self.code != "00" {
            return Err(QPayApiError::GatewayError { code: self.code, desc: self.desc });
        }
        self.data.ok_or(QPayApiError::EmptyResponse)
    }
}

/// The signed JSON document QPay POSTs to the webhook endpoint. `transaction_data` is carried as
/// opaque evidence and stored verbatim; nothing in it participates in state decisions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookEvent {
    pub order_code: String,
    pub status_code: String,
    pub description: String,
    #[serde(default)]
    pub transaction_data: Value,
}

impl WebhookEvent {
    /// Maps the gateway status code onto the link lifecycle. `"00"` is the only success code;
    /// unknown codes are treated as failures (the description carries the detail).
    pub fn link_status(&self) -> QPayLinkStatus {
        match self.status_code.as_str() {
            "00" => QPayLinkStatus::Paid,
            "02" => QPayLinkStatus::Cancelled,
            "03" => QPayLinkStatus::Expired,
            _ => QPayLinkStatus::Failed,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status_code == "00"
    }
}
