use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{PaymentMethod, PriceType};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum MilestoneType {
    #[serde(rename = "Booking Fee")]
    BookingFee,
    Day,
    Week,
    Month,
}

impl MilestoneType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MilestoneType::BookingFee => "Booking Fee",
            MilestoneType::Day => "Day",
            MilestoneType::Week => "Week",
            MilestoneType::Month => "Month",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "Booking Fee" => Some(MilestoneType::BookingFee),
            "Day" => Some(MilestoneType::Day),
            "Week" => Some(MilestoneType::Week),
            "Month" => Some(MilestoneType::Month),
            _ => None,
        }
    }
}

impl From<PriceType> for MilestoneType {
    fn from(price_type: PriceType) -> Self {
        match price_type {
            PriceType::Day => MilestoneType::Day,
            PriceType::Week => MilestoneType::Week,
            PriceType::Month => MilestoneType::Month,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MilestoneStatus {
    Pending,
    Paid,
    Failed,
}

impl MilestoneStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MilestoneStatus::Pending => "pending",
            MilestoneStatus::Paid => "paid",
            MilestoneStatus::Failed => "failed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(MilestoneStatus::Pending),
            "paid" => Some(MilestoneStatus::Paid),
            "failed" => Some(MilestoneStatus::Failed),
            _ => None,
        }
    }
}

/// One scheduled payment obligation of a booking. Number 0 is the booking fee.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Milestone {
    pub id: Uuid,
    pub booking_id: Uuid,
    pub milestone_type: MilestoneType,
    pub milestone_number: i64,
    pub due_date: NaiveDate,
    pub amount_cents: i64,
    pub status: MilestoneStatus,
    pub payment_method: Option<PaymentMethod>,
    pub paid_at: Option<DateTime<Utc>>,
    pub transaction_reference: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
