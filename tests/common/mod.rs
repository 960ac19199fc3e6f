#![allow(dead_code)]

use std::{
    collections::HashSet,
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc, Mutex,
    },
};

use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use staybook::{
    auth::AuthService,
    config::Settings,
    domain::{CreateUserRequest, Package, PaymentMethod, PaymentOption, PriceType, Room, ServiceKind, AddonService, User},
    error::{AppError, Result},
    notify::{BookingVerification, Notifier},
    payments::{CheckoutSessionRequest, GatewayEvent, GatewaySession, PaymentGateway},
    repository::{NewRoomRate, SqliteCatalogRepository},
    service::{ContactDetails, PaymentChoice, SelectionRequest, ServiceContext},
};
use uuid::Uuid;

/// Signature the fake gateway accepts on webhooks.
pub const VALID_SIGNATURE: &str = "t=1,v1=valid";

/// Records sessions instead of talking to a payment provider.
#[derive(Default)]
pub struct FakeGateway {
    pub sessions: Mutex<Vec<(String, CheckoutSessionRequest)>>,
    paid: Mutex<HashSet<String>>,
    counter: AtomicUsize,
    pub fail: AtomicBool,
}

impl FakeGateway {
    pub fn mark_paid(&self, session_id: &str) {
        self.paid.lock().unwrap().insert(session_id.to_string());
    }

    pub fn last_session(&self) -> (String, CheckoutSessionRequest) {
        self.sessions.lock().unwrap().last().cloned().expect("no checkout session opened")
    }

    pub fn session_count(&self) -> usize {
        self.sessions.lock().unwrap().len()
    }
}

#[async_trait]
impl PaymentGateway for FakeGateway {
    async fn create_checkout_session(&self, request: CheckoutSessionRequest) -> Result<GatewaySession> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(AppError::PaymentGateway("gateway unavailable".to_string()));
        }

        let n = self.counter.fetch_add(1, Ordering::SeqCst);
        let id = format!("cs_test_{}", n);
        self.sessions.lock().unwrap().push((id.clone(), request));

        Ok(GatewaySession {
            url: format!("https://checkout.test/pay/{}", id),
            id,
        })
    }

    async fn session_is_paid(&self, session_id: &str) -> Result<bool> {
        Ok(self.paid.lock().unwrap().contains(session_id))
    }

    /// Payload format: `{"type": "completed"|"expired"|"failed"|..., "session_id": "...",
    /// "booking_id": "...", "payment_status": "paid"|"unpaid"}`. A missing payment status
    /// counts as paid.
    fn parse_webhook(&self, payload: &str, signature: &str) -> Result<GatewayEvent> {
        if signature != VALID_SIGNATURE {
            return Err(AppError::Validation("Invalid signature".to_string()));
        }

        let value: serde_json::Value = serde_json::from_str(payload)
            .map_err(|e| AppError::Validation(e.to_string()))?;
        let session_id = value["session_id"].as_str().unwrap_or_default().to_string();

        Ok(match value["type"].as_str() {
            Some("completed") => GatewayEvent::CheckoutCompleted {
                session_id,
                booking_id: value["booking_id"].as_str().and_then(|s| Uuid::parse_str(s).ok()),
                paid: value["payment_status"].as_str() != Some("unpaid"),
            },
            Some("expired") => GatewayEvent::CheckoutExpired { session_id },
            Some("failed") => GatewayEvent::PaymentFailed { session_id },
            _ => GatewayEvent::Ignored,
        })
    }
}

/// Keeps every verification message for inspection.
#[derive(Default)]
pub struct CapturingNotifier {
    pub sent: Mutex<Vec<BookingVerification>>,
    pub fail: AtomicBool,
}

impl CapturingNotifier {
    pub fn count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }

    pub fn last(&self) -> BookingVerification {
        self.sent.lock().unwrap().last().cloned().expect("no verification sent")
    }

    pub fn last_token(&self) -> String {
        self.last().token
    }
}

#[async_trait]
impl Notifier for CapturingNotifier {
    async fn send_booking_verification(&self, message: &BookingVerification) -> Result<()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(AppError::Notification("smtp unavailable".to_string()));
        }
        self.sent.lock().unwrap().push(message.clone());
        Ok(())
    }
}

pub struct TestApp {
    pub pool: SqlitePool,
    pub ctx: Arc<ServiceContext>,
    pub gateway: Arc<FakeGateway>,
    pub notifier: Arc<CapturingNotifier>,
    pub settings: Settings,
    pub catalog: SqliteCatalogRepository,
}

pub async fn setup() -> anyhow::Result<TestApp> {
    // One connection keeps every query on the same in-memory database.
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;

    let settings = Settings::default();
    let gateway = Arc::new(FakeGateway::default());
    let notifier = Arc::new(CapturingNotifier::default());
    let auth_service = Arc::new(AuthService::new(pool.clone(), 24, false));

    let ctx = Arc::new(ServiceContext::new(
        pool.clone(),
        auth_service,
        Some(gateway.clone() as Arc<dyn PaymentGateway>),
        notifier.clone() as Arc<dyn Notifier>,
        &settings,
    ));

    Ok(TestApp {
        catalog: SqliteCatalogRepository::new(pool.clone()),
        pool,
        ctx,
        gateway,
        notifier,
        settings,
    })
}

impl TestApp {
    pub async fn create_user(&self, email: &str, email_verified: bool, is_admin: bool) -> anyhow::Result<User> {
        let user = self.ctx.user_repo
            .create(CreateUserRequest {
                email: email.to_string(),
                full_name: "Test Guest".to_string(),
                password: "password123".to_string(),
                email_verified,
                is_admin,
            })
            .await?;
        Ok(user)
    }

    pub async fn guest(&self) -> anyhow::Result<User> {
        self.create_user("guest@example.com", true, false).await
    }

    pub async fn admin(&self) -> anyhow::Result<User> {
        self.create_user("admin@example.com", true, true).await
    }

    pub async fn seed_catalog(&self) -> anyhow::Result<Catalog> {
        let package = self.catalog.create_package("Harbour House").await?;

        let day_room = self.catalog
            .create_room(package.id, "Studio", vec![rate(PriceType::Day, 2_500, None)])
            .await?;
        let month_room = self.catalog
            .create_room(package.id, "Loft", vec![rate(PriceType::Month, 40_000, Some(10_000))])
            .await?;

        let amenity = self.catalog
            .create_service(package.id, ServiceKind::Amenity, "Airport pickup", 1_500)
            .await?;
        let maintenance = self.catalog
            .create_service(package.id, ServiceKind::Maintenance, "Weekly cleaning", 2_000)
            .await?;

        let other_package = self.catalog.create_package("Mill Cottage").await?;
        let other_room = self.catalog
            .create_room(other_package.id, "Attic", vec![rate(PriceType::Day, 9_000, None)])
            .await?;

        Ok(Catalog { package, day_room, month_room, amenity, maintenance, other_room })
    }

    pub async fn count(&self, table: &str) -> anyhow::Result<i64> {
        let n = sqlx::query_scalar::<_, i64>(&format!("SELECT COUNT(*) FROM {}", table))
            .fetch_one(&self.pool)
            .await?;
        Ok(n)
    }
}

pub struct Catalog {
    pub package: Package,
    pub day_room: Room,
    pub month_room: Room,
    pub amenity: AddonService,
    pub maintenance: AddonService,
    pub other_room: Room,
}

pub fn rate(price_type: PriceType, fixed_price_cents: i64, booking_price_cents: Option<i64>) -> NewRoomRate {
    NewRoomRate {
        price_type,
        fixed_price_cents,
        discount_price_cents: None,
        booking_price_cents,
    }
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn selection(package: &Package, room: &Room, start: NaiveDate, end: NaiveDate) -> SelectionRequest {
    SelectionRequest {
        package_id: package.id,
        room_ids: vec![room.id],
        start_date: start,
        end_date: end,
        amenity_ids: Vec::new(),
        maintenance_ids: Vec::new(),
    }
}

pub fn contact() -> ContactDetails {
    ContactDetails {
        name: "Ada Lovelace".to_string(),
        email: "Ada@Example.com".to_string(),
        phone: Some("+44 20 7946 0000".to_string()),
    }
}

pub fn card(option: PaymentOption) -> PaymentChoice {
    PaymentChoice {
        method: PaymentMethod::Card,
        option,
        reference: None,
    }
}

pub fn bank_transfer(reference: &str) -> PaymentChoice {
    PaymentChoice {
        method: PaymentMethod::BankTransfer,
        option: PaymentOption::BookingOnly,
        reference: Some(reference.to_string()),
    }
}
