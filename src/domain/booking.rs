use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{GatewayPayment, Milestone, PriceType, ServiceKind};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Cancelled,
    Approved,
    Rejected,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::Cancelled => "cancelled",
            BookingStatus::Approved => "approved",
            BookingStatus::Rejected => "rejected",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(BookingStatus::Pending),
            "confirmed" => Some(BookingStatus::Confirmed),
            "cancelled" => Some(BookingStatus::Cancelled),
            "approved" => Some(BookingStatus::Approved),
            "rejected" => Some(BookingStatus::Rejected),
            _ => None,
        }
    }

    /// Closed bookings no longer accept payments.
    pub fn is_closed(&self) -> bool {
        matches!(self, BookingStatus::Cancelled | BookingStatus::Rejected)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BookingPaymentStatus {
    Pending,
    Paid,
}

impl BookingPaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingPaymentStatus::Pending => "pending",
            BookingPaymentStatus::Paid => "paid",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(BookingPaymentStatus::Pending),
            "paid" => Some(BookingPaymentStatus::Paid),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PaymentOption {
    Full,
    BookingOnly,
}

impl PaymentOption {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentOption::Full => "full",
            PaymentOption::BookingOnly => "booking_only",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "full" => Some(PaymentOption::Full),
            "booking_only" => Some(PaymentOption::BookingOnly),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Card,
    BankTransfer,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Card => "card",
            PaymentMethod::BankTransfer => "bank_transfer",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "card" => Some(PaymentMethod::Card),
            "bank_transfer" => Some(PaymentMethod::BankTransfer),
            _ => None,
        }
    }
}

/// One priced line of a stay.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PriceLine {
    pub price_type: PriceType,
    pub quantity: i64,
    pub unit_price_cents: i64,
    pub line_total_cents: i64,
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Booking {
    pub id: Uuid,
    pub user_id: Uuid,
    pub package_id: Uuid,
    pub room_ids: Vec<Uuid>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub contact_name: String,
    pub contact_email: String,
    pub contact_phone: Option<String>,
    pub price_type: PriceType,
    pub room_subtotal_cents: i64,
    pub addon_subtotal_cents: i64,
    pub deposit_cents: i64,
    pub grand_total_cents: i64,
    pub payment_option: PaymentOption,
    pub payment_method: PaymentMethod,
    pub amount_due_now_cents: i64,
    pub price_breakdown: Vec<PriceLine>,
    pub milestone_count: i64,
    pub milestone_amount_cents: i64,
    pub milestone_breakdown: Vec<PriceLine>,
    pub status: BookingStatus,
    pub payment_status: BookingPaymentStatus,
    #[serde(skip_serializing)]
    pub verification_token_hash: Option<String>,
    pub email_verified: bool,
    pub verified_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Booking {
    pub fn is_owned_by(&self, user_id: Uuid) -> bool {
        self.user_id == user_id
    }

    pub fn nights(&self) -> i64 {
        (self.end_date - self.start_date).num_days()
    }
}

/// Add-on line persisted with a booking; prices are snapshotted at submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingAddon {
    pub id: Uuid,
    pub booking_id: Uuid,
    pub kind: ServiceKind,
    pub service_id: Uuid,
    pub name: String,
    pub price_cents: i64,
}

/// Everything written by the creation transaction.
#[derive(Debug, Clone)]
pub struct NewBooking {
    pub booking: Booking,
    pub addons: Vec<BookingAddon>,
    pub milestones: Vec<Milestone>,
    pub offline_payment: Option<GatewayPayment>,
}

/// Booking with its dependent rows, as returned to the owner.
#[derive(Debug, Clone, Serialize)]
pub struct BookingDetail {
    #[serde(flatten)]
    pub booking: Booking,
    pub addons: Vec<BookingAddon>,
    pub milestones: Vec<Milestone>,
    pub payments: Vec<GatewayPayment>,
}
