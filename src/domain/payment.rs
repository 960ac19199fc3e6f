use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{PaymentMethod, PaymentOption};

/// A single payment attempt against a booking (as opposed to a milestone obligation).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayPayment {
    pub id: Uuid,
    pub booking_id: Uuid,
    pub method: PaymentMethod,
    pub amount_cents: i64,
    pub currency: String,
    pub status: PaymentStatus,
    /// Gateway checkout session id for card attempts.
    pub transaction_id: Option<String>,
    pub payment_option: PaymentOption,
    /// Bank transfer reference supplied by the customer.
    pub reference: Option<String>,
    pub admin_notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Completed,
    Failed,
    Cancelled,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Completed => "completed",
            PaymentStatus::Failed => "failed",
            PaymentStatus::Cancelled => "cancelled",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(PaymentStatus::Pending),
            "completed" => Some(PaymentStatus::Completed),
            "failed" => Some(PaymentStatus::Failed),
            "cancelled" => Some(PaymentStatus::Cancelled),
            _ => None,
        }
    }
}

impl GatewayPayment {
    pub fn new_pending(
        booking_id: Uuid,
        method: PaymentMethod,
        amount_cents: i64,
        currency: &str,
        payment_option: PaymentOption,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            booking_id,
            method,
            amount_cents,
            currency: currency.to_string(),
            status: PaymentStatus::Pending,
            transaction_id: None,
            payment_option,
            reference: None,
            admin_notes: None,
            created_at: now,
            updated_at: now,
        }
    }
}
