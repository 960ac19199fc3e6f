use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Rate category a room is priced under.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PriceType {
    Day,
    Week,
    Month,
}

impl PriceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PriceType::Day => "Day",
            PriceType::Week => "Week",
            PriceType::Month => "Month",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "day" => Some(PriceType::Day),
            "week" => Some(PriceType::Week),
            "month" => Some(PriceType::Month),
            _ => None,
        }
    }
}

impl std::fmt::Display for PriceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Package {
    pub id: Uuid,
    pub name: String,
    pub is_active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomRate {
    pub id: Uuid,
    pub room_id: Uuid,
    pub price_type: PriceType,
    pub fixed_price_cents: i64,
    pub discount_price_cents: Option<i64>,
    pub booking_price_cents: Option<i64>,
}

impl RoomRate {
    /// Discount price wins over the fixed price when set.
    pub fn unit_price_cents(&self) -> i64 {
        self.discount_price_cents.unwrap_or(self.fixed_price_cents)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Room {
    pub id: Uuid,
    pub package_id: Uuid,
    pub name: String,
    /// Ordered as defined in the catalog.
    pub rates: Vec<RoomRate>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ServiceKind {
    Amenity,
    Maintenance,
}

impl ServiceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceKind::Amenity => "amenity",
            ServiceKind::Maintenance => "maintenance",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "amenity" => Some(ServiceKind::Amenity),
            "maintenance" => Some(ServiceKind::Maintenance),
            _ => None,
        }
    }
}

/// An add-on (amenity or maintenance item) offered with a package.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddonService {
    pub id: Uuid,
    pub package_id: Uuid,
    pub kind: ServiceKind,
    pub name: String,
    pub price_cents: i64,
}
