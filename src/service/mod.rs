pub mod booking_service;
pub mod checkout_service;
pub mod payment_service;
pub mod verification_service;

use std::sync::Arc;
use sqlx::SqlitePool;
use crate::repository::*;
use crate::auth::AuthService;
use crate::config::Settings;
use crate::notify::Notifier;
use crate::payments::PaymentGateway;
use booking_service::BookingService;
use checkout_service::CheckoutService;
use payment_service::PaymentService;
use verification_service::VerificationService;

pub use booking_service::{ContactDetails, PaymentChoice, SubmitBookingRequest, SubmittedBooking};
pub use checkout_service::{PricedSelection, Quote, SavedSelection, SelectionRequest};
pub use payment_service::{quote_amount_due, CallbackOutcome, CallbackResult, PayRequest, PayResponse};
pub use verification_service::{VerifyOutcome, VerifyResult};

pub struct ServiceContext {
    pub user_repo: Arc<dyn UserRepository>,
    pub booking_repo: Arc<dyn BookingRepository>,
    pub payment_repo: Arc<dyn PaymentRepository>,
    pub catalog_repo: Arc<dyn CatalogRepository>,
    pub checkout_repo: Arc<dyn CheckoutRepository>,
    pub auth_service: Arc<AuthService>,
    pub checkout_service: Arc<CheckoutService>,
    pub booking_service: Arc<BookingService>,
    pub verification_service: Arc<VerificationService>,
    pub payment_service: Arc<PaymentService>,
    pub db_pool: SqlitePool,
}

impl ServiceContext {
    pub fn new(
        db_pool: SqlitePool,
        auth_service: Arc<AuthService>,
        gateway: Option<Arc<dyn PaymentGateway>>,
        notifier: Arc<dyn Notifier>,
        settings: &Settings,
    ) -> Self {
        let user_repo: Arc<dyn UserRepository> = Arc::new(SqliteUserRepository::new(db_pool.clone()));
        let booking_repo: Arc<dyn BookingRepository> = Arc::new(SqliteBookingRepository::new(db_pool.clone()));
        let payment_repo: Arc<dyn PaymentRepository> = Arc::new(SqlitePaymentRepository::new(db_pool.clone()));
        let catalog_repo: Arc<dyn CatalogRepository> = Arc::new(SqliteCatalogRepository::new(db_pool.clone()));
        let checkout_repo: Arc<dyn CheckoutRepository> = Arc::new(SqliteCheckoutRepository::new(db_pool.clone()));

        let base_url = settings.server.base_url.clone();
        let currency = settings.booking.currency.clone();

        let checkout_service = Arc::new(CheckoutService::new(
            catalog_repo.clone(),
            checkout_repo.clone(),
            settings.booking.clone(),
        ));

        let booking_service = Arc::new(BookingService::new(
            booking_repo.clone(),
            payment_repo.clone(),
            checkout_service.clone(),
            notifier.clone(),
            currency.clone(),
            base_url.clone(),
        ));

        let verification_service = Arc::new(VerificationService::new(
            booking_repo.clone(),
            payment_repo.clone(),
            notifier,
            base_url.clone(),
        ));

        let payment_service = Arc::new(PaymentService::new(
            booking_repo.clone(),
            payment_repo.clone(),
            catalog_repo.clone(),
            checkout_service.clone(),
            gateway,
            currency,
            base_url,
        ));

        Self {
            user_repo,
            booking_repo,
            payment_repo,
            catalog_repo,
            checkout_repo,
            auth_service,
            checkout_service,
            booking_service,
            verification_service,
            payment_service,
            db_pool,
        }
    }
}
