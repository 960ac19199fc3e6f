use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use uuid::Uuid;
use crate::domain::*;
use crate::error::{AppError, Result};

pub mod booking_repository;
pub mod catalog_repository;
pub mod checkout_repository;
pub mod payment_repository;
pub mod user_repository;

pub use booking_repository::SqliteBookingRepository;
pub use catalog_repository::{NewRoomRate, SqliteCatalogRepository};
pub use checkout_repository::SqliteCheckoutRepository;
pub use payment_repository::SqlitePaymentRepository;
pub use user_repository::SqliteUserRepository;

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn create(&self, request: CreateUserRequest) -> Result<User>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>>;
    async fn find_by_email(&self, email: &str) -> Result<Option<User>>;
    async fn password_hash(&self, email: &str) -> Result<Option<String>>;
}

/// Read side of the property catalog.
#[async_trait]
pub trait CatalogRepository: Send + Sync {
    async fn find_package(&self, id: Uuid) -> Result<Option<Package>>;
    async fn find_room(&self, id: Uuid) -> Result<Option<Room>>;
    async fn find_services(&self, kind: ServiceKind, ids: &[Uuid]) -> Result<Vec<AddonService>>;
}

#[async_trait]
pub trait BookingRepository: Send + Sync {
    /// Writes the booking and all dependent rows in one transaction.
    async fn create(&self, new_booking: NewBooking) -> Result<Booking>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Booking>>;
    async fn list_by_user(&self, user_id: Uuid) -> Result<Vec<Booking>>;
    async fn list(&self, limit: i64, offset: i64) -> Result<Vec<Booking>>;
    async fn find_addons(&self, booking_id: Uuid) -> Result<Vec<BookingAddon>>;
    async fn find_milestones(&self, booking_id: Uuid) -> Result<Vec<Milestone>>;
    /// Returns false when the booking was already verified.
    async fn mark_verified(&self, id: Uuid) -> Result<bool>;
    /// Replaces the token of an unverified booking; false if verified meanwhile.
    async fn replace_verification_token(&self, id: Uuid, token_hash: &str) -> Result<bool>;
    async fn set_status(&self, id: Uuid, status: BookingStatus) -> Result<bool>;
    /// Cancels the booking only while it is unpaid.
    async fn cancel_unpaid(&self, id: Uuid) -> Result<bool>;
    /// Marks the booking paid and settles milestone 0 and the attempt.
    /// Returns false when the booking was already paid, cancelled or rejected.
    async fn settle_payment(&self, settlement: Settlement) -> Result<bool>;
}

/// Settlement of the booking fee through one payment attempt.
#[derive(Debug, Clone)]
pub struct Settlement {
    pub booking_id: Uuid,
    pub payment_id: Uuid,
    pub method: PaymentMethod,
    pub transaction_reference: Option<String>,
    pub admin_notes: Option<String>,
}

#[async_trait]
pub trait PaymentRepository: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<GatewayPayment>>;
    async fn find_by_booking(&self, booking_id: Uuid) -> Result<Vec<GatewayPayment>>;
    async fn find_by_transaction_id(&self, transaction_id: &str) -> Result<Option<GatewayPayment>>;
    async fn has_pending(&self, booking_id: Uuid, method: PaymentMethod) -> Result<bool>;
    /// Inserts a card attempt, cancelling every older pending attempt for the booking.
    async fn record_card_attempt(&self, payment: GatewayPayment) -> Result<GatewayPayment>;
    /// Inserts a bank transfer intent, cancelling every older pending attempt for the
    /// booking, and tags unpaid milestones with the method.
    async fn record_offline_payment(&self, payment: GatewayPayment) -> Result<GatewayPayment>;
    /// Moves a pending attempt to `status`; false if it was no longer pending.
    async fn resolve_pending(&self, id: Uuid, status: PaymentStatus) -> Result<bool>;
}

#[async_trait]
pub trait CheckoutRepository: Send + Sync {
    async fn create(&self, selection: CheckoutSelection) -> Result<CheckoutSelection>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<CheckoutSelection>>;
    async fn delete(&self, id: Uuid) -> Result<()>;
    async fn delete_for_user(&self, user_id: Uuid) -> Result<u64>;
    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64>;
}

pub(crate) fn parse_uuid(s: &str) -> Result<Uuid> {
    Uuid::parse_str(s).map_err(|e| AppError::Database(e.to_string()))
}

pub(crate) fn parse_uuid_list(s: &str) -> Result<Vec<Uuid>> {
    serde_json::from_str(s).map_err(|e| AppError::Database(e.to_string()))
}

pub(crate) fn uuid_list_to_json(ids: &[Uuid]) -> Result<String> {
    serde_json::to_string(ids).map_err(|e| AppError::Internal(e.to_string()))
}

pub(crate) fn to_utc(dt: NaiveDateTime) -> DateTime<Utc> {
    DateTime::from_naive_utc_and_offset(dt, Utc)
}

pub(crate) fn parse_column<T>(value: &str, column: &str, parse: fn(&str) -> Option<T>) -> Result<T> {
    parse(value).ok_or_else(|| AppError::Database(format!("Invalid {}: {}", column, value)))
}
