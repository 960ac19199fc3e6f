use std::{collections::HashSet, sync::Arc};

use chrono::{Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::{
    config::BookingConfig,
    domain::{AddonService, CheckoutSelection, Package, PriceLine, PriceType, Room, ServiceKind, User},
    error::{AppError, Result},
    pricing::{self, ScheduledMilestone, StayPricing},
    repository::{CatalogRepository, CheckoutRepository},
};

/// What the guest picked: a package, one or more of its rooms, dates and extras.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct SelectionRequest {
    pub package_id: Uuid,
    #[validate(length(min = 1, message = "Select at least one room"))]
    pub room_ids: Vec<Uuid>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[serde(default)]
    pub amenity_ids: Vec<Uuid>,
    #[serde(default)]
    pub maintenance_ids: Vec<Uuid>,
}

impl From<&CheckoutSelection> for SelectionRequest {
    fn from(selection: &CheckoutSelection) -> Self {
        Self {
            package_id: selection.package_id,
            room_ids: selection.room_ids.clone(),
            start_date: selection.start_date,
            end_date: selection.end_date,
            amenity_ids: selection.amenity_ids.clone(),
            maintenance_ids: selection.maintenance_ids.clone(),
        }
    }
}

/// A selection priced against the current catalog.
#[derive(Debug, Clone)]
pub struct PricedSelection {
    pub package: Package,
    pub rooms: Vec<Room>,
    pub amenities: Vec<AddonService>,
    pub maintenances: Vec<AddonService>,
    /// Priced against the first selected room.
    pub pricing: StayPricing,
    pub addon_subtotal_cents: i64,
    pub deposit_cents: i64,
    pub grand_total_cents: i64,
}

impl PricedSelection {
    pub fn schedule(&self, stay_start: NaiveDate, today: NaiveDate) -> Result<Vec<ScheduledMilestone>> {
        pricing::schedule(&self.pricing.breakdown, self.deposit_cents, stay_start, today)
    }

    pub fn addons(&self) -> impl Iterator<Item = &AddonService> {
        self.amenities.iter().chain(self.maintenances.iter())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Quote {
    pub package_name: String,
    pub price_type: PriceType,
    pub nights: i64,
    pub breakdown: Vec<PriceLine>,
    pub room_subtotal_cents: i64,
    pub amenities: Vec<AddonService>,
    pub maintenances: Vec<AddonService>,
    pub addon_subtotal_cents: i64,
    pub deposit_cents: i64,
    pub grand_total_cents: i64,
    pub milestones: Vec<ScheduledMilestone>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SavedSelection {
    pub selection: CheckoutSelection,
    pub quote: Quote,
}

pub struct CheckoutService {
    catalog: Arc<dyn CatalogRepository>,
    selections: Arc<dyn CheckoutRepository>,
    config: BookingConfig,
}

impl CheckoutService {
    pub fn new(
        catalog: Arc<dyn CatalogRepository>,
        selections: Arc<dyn CheckoutRepository>,
        config: BookingConfig,
    ) -> Self {
        Self { catalog, selections, config }
    }

    /// Loads everything referenced by the selection and prices it.
    /// Client-supplied prices are never used.
    pub async fn price_selection(&self, request: &SelectionRequest) -> Result<PricedSelection> {
        request.validate()?;

        if request.end_date <= request.start_date {
            return Err(AppError::Validation("End date must be after start date".to_string()));
        }

        let package = self.catalog
            .find_package(request.package_id)
            .await?
            .filter(|p| p.is_active)
            .ok_or_else(|| AppError::NotFound("Package not found".to_string()))?;

        let mut rooms = Vec::new();
        for room_id in dedupe(&request.room_ids) {
            let room = self.catalog
                .find_room(room_id)
                .await?
                .ok_or_else(|| AppError::NotFound("Room not found".to_string()))?;

            if room.package_id != package.id {
                return Err(AppError::Validation(
                    "Room does not belong to the selected package".to_string(),
                ));
            }
            rooms.push(room);
        }

        let priced_room = rooms
            .first()
            .ok_or_else(|| AppError::Validation("Select at least one room".to_string()))?;
        let pricing = pricing::price_stay(&priced_room.rates, request.start_date, request.end_date)?;

        let amenities = self
            .load_services(ServiceKind::Amenity, &request.amenity_ids, package.id)
            .await?;
        let maintenances = self
            .load_services(ServiceKind::Maintenance, &request.maintenance_ids, package.id)
            .await?;

        let addon_subtotal_cents: i64 = amenities
            .iter()
            .chain(maintenances.iter())
            .map(|s| s.price_cents)
            .sum();
        let deposit_cents = pricing
            .booking_price_cents
            .unwrap_or(self.config.default_booking_fee_cents);
        let grand_total_cents = pricing.room_subtotal_cents + addon_subtotal_cents;

        Ok(PricedSelection {
            package,
            rooms,
            amenities,
            maintenances,
            pricing,
            addon_subtotal_cents,
            deposit_cents,
            grand_total_cents,
        })
    }

    pub async fn quote(&self, request: &SelectionRequest) -> Result<Quote> {
        let priced = self.price_selection(request).await?;
        let milestones = priced.schedule(request.start_date, Utc::now().date_naive())?;

        Ok(Quote {
            package_name: priced.package.name,
            price_type: priced.pricing.price_type,
            nights: priced.pricing.nights,
            breakdown: priced.pricing.breakdown,
            room_subtotal_cents: priced.pricing.room_subtotal_cents,
            amenities: priced.amenities,
            maintenances: priced.maintenances,
            addon_subtotal_cents: priced.addon_subtotal_cents,
            deposit_cents: priced.deposit_cents,
            grand_total_cents: priced.grand_total_cents,
            milestones,
        })
    }

    pub async fn save_selection(&self, user: &User, request: SelectionRequest) -> Result<SavedSelection> {
        // Pricing doubles as validation of the whole selection.
        let quote = self.quote(&request).await?;

        let now = Utc::now();
        let selection = CheckoutSelection {
            id: Uuid::new_v4(),
            user_id: user.id,
            package_id: request.package_id,
            room_ids: dedupe(&request.room_ids),
            start_date: request.start_date,
            end_date: request.end_date,
            amenity_ids: dedupe(&request.amenity_ids),
            maintenance_ids: dedupe(&request.maintenance_ids),
            created_at: now,
            expires_at: now + Duration::minutes(self.config.selection_ttl_minutes),
        };

        let selection = self.selections.create(selection).await?;
        tracing::debug!("Saved checkout selection {} for user {}", selection.id, user.id);

        Ok(SavedSelection { selection, quote })
    }

    pub async fn get_selection(&self, user: &User, id: Uuid) -> Result<CheckoutSelection> {
        let selection = self.selections
            .find_by_id(id)
            .await?
            .filter(|s| s.user_id == user.id && !s.is_expired(Utc::now()))
            .ok_or_else(|| AppError::NotFound("Checkout selection not found".to_string()))?;

        Ok(selection)
    }

    pub async fn preview(&self, selection: &CheckoutSelection) -> Result<Quote> {
        self.quote(&SelectionRequest::from(selection)).await
    }

    pub async fn discard(&self, id: Uuid) -> Result<()> {
        self.selections.delete(id).await
    }

    /// Forgets everything the user picked, once their checkout has completed.
    pub async fn clear_for_user(&self, user: &User) -> Result<u64> {
        self.selections.delete_for_user(user.id).await
    }

    pub async fn purge_expired(&self) -> Result<u64> {
        self.selections.delete_expired(Utc::now()).await
    }

    async fn load_services(
        &self,
        kind: ServiceKind,
        ids: &[Uuid],
        package_id: Uuid,
    ) -> Result<Vec<AddonService>> {
        let ids = dedupe(ids);
        let services = self.catalog.find_services(kind, &ids).await?;

        if services.len() != ids.len() {
            return Err(AppError::Validation(format!("Unknown {} selected", kind.as_str())));
        }
        if services.iter().any(|s| s.package_id != package_id) {
            return Err(AppError::Validation(format!(
                "Selected {} is not offered with this package",
                kind.as_str()
            )));
        }

        Ok(services)
    }
}

/// Drops repeated ids, keeping first occurrences in order.
fn dedupe(ids: &[Uuid]) -> Vec<Uuid> {
    let mut seen = HashSet::new();
    ids.iter().copied().filter(|id| seen.insert(*id)).collect()
}
