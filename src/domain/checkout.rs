use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Short-lived, caller-scoped record of what a guest picked before checkout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutSelection {
    pub id: Uuid,
    pub user_id: Uuid,
    pub package_id: Uuid,
    pub room_ids: Vec<Uuid>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub amenity_ids: Vec<Uuid>,
    pub maintenance_ids: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl CheckoutSelection {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}
