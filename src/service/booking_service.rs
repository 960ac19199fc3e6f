use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::{
    auth::{generate_token, hash_token},
    domain::{
        Booking, BookingAddon, BookingDetail, BookingPaymentStatus, BookingStatus, GatewayPayment,
        Milestone, MilestoneStatus, NewBooking, PaymentMethod, PaymentOption, User,
    },
    error::{AppError, Result},
    notify::Notifier,
    repository::{BookingRepository, PaymentRepository},
};

use super::{
    checkout_service::{CheckoutService, SelectionRequest},
    payment_service::{amount_due, require_reference},
    verification_service::send_verification,
};

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ContactDetails {
    #[validate(length(min = 1, max = 200, message = "Name is required"))]
    pub name: String,
    #[validate(email(message = "A valid email address is required"))]
    pub email: String,
    #[validate(length(max = 50))]
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PaymentChoice {
    pub method: PaymentMethod,
    pub option: PaymentOption,
    #[serde(default)]
    pub reference: Option<String>,
}

impl PaymentChoice {
    /// Bank transfer reference, checked before anything is written.
    fn offline_reference(&self) -> Result<Option<String>> {
        match self.method {
            PaymentMethod::Card => Ok(None),
            PaymentMethod::BankTransfer => require_reference(self.reference.as_deref()).map(Some),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SubmitBookingRequest {
    pub selection_id: Uuid,
    pub contact: ContactDetails,
    pub payment: PaymentChoice,
}

#[derive(Debug, Clone, Serialize)]
pub struct SubmittedBooking {
    pub booking_id: Uuid,
    pub amount_due_now_cents: i64,
    pub redirect: String,
}

pub struct BookingService {
    bookings: Arc<dyn BookingRepository>,
    payments: Arc<dyn PaymentRepository>,
    checkout: Arc<CheckoutService>,
    notifier: Arc<dyn Notifier>,
    currency: String,
    base_url: String,
}

impl BookingService {
    pub fn new(
        bookings: Arc<dyn BookingRepository>,
        payments: Arc<dyn PaymentRepository>,
        checkout: Arc<CheckoutService>,
        notifier: Arc<dyn Notifier>,
        currency: String,
        base_url: String,
    ) -> Self {
        Self { bookings, payments, checkout, notifier, currency, base_url }
    }

    /// Submits the caller's saved selection and discards it on success.
    pub async fn checkout(&self, user: &User, request: SubmitBookingRequest) -> Result<SubmittedBooking> {
        let selection = self.checkout.get_selection(user, request.selection_id).await?;

        let submitted = self
            .submit_booking(user, &SelectionRequest::from(&selection), request.contact, request.payment)
            .await?;

        if let Err(e) = self.checkout.discard(selection.id).await {
            tracing::warn!("Failed to discard checkout selection {}: {}", selection.id, e);
        }

        Ok(submitted)
    }

    /// Creates the booking with its add-ons, milestone schedule and (for bank
    /// transfers) the pending offline payment, all in one transaction.
    pub async fn submit_booking(
        &self,
        user: &User,
        selection: &SelectionRequest,
        contact: ContactDetails,
        payment: PaymentChoice,
    ) -> Result<SubmittedBooking> {
        if !user.email_verified() {
            return Err(AppError::Forbidden);
        }
        if selection.end_date <= selection.start_date {
            return Err(AppError::Validation("End date must be after start date".to_string()));
        }
        contact.validate()?;
        let reference = payment.offline_reference()?;

        let priced = self.checkout.price_selection(selection).await?;

        let now = Utc::now();
        let booking_id = Uuid::new_v4();
        let token = generate_token();
        let schedule = priced.schedule(selection.start_date, now.date_naive())?;
        let amount_due_now_cents =
            amount_due(payment.option, priced.grand_total_cents, priced.deposit_cents);

        let booking = Booking {
            id: booking_id,
            user_id: user.id,
            package_id: priced.package.id,
            room_ids: priced.rooms.iter().map(|r| r.id).collect(),
            start_date: selection.start_date,
            end_date: selection.end_date,
            contact_name: contact.name.trim().to_string(),
            contact_email: contact.email.trim().to_lowercase(),
            contact_phone: contact.phone.filter(|p| !p.trim().is_empty()),
            price_type: priced.pricing.price_type,
            room_subtotal_cents: priced.pricing.room_subtotal_cents,
            addon_subtotal_cents: priced.addon_subtotal_cents,
            deposit_cents: priced.deposit_cents,
            grand_total_cents: priced.grand_total_cents,
            payment_option: payment.option,
            payment_method: payment.method,
            amount_due_now_cents,
            price_breakdown: priced.pricing.breakdown.clone(),
            milestone_count: priced.pricing.breakdown.len() as i64,
            milestone_amount_cents: priced
                .pricing
                .breakdown
                .first()
                .map(|line| line.line_total_cents)
                .unwrap_or(0),
            milestone_breakdown: priced.pricing.breakdown.clone(),
            status: BookingStatus::Pending,
            payment_status: BookingPaymentStatus::Pending,
            verification_token_hash: Some(hash_token(&token)),
            email_verified: false,
            verified_at: None,
            created_at: now,
            updated_at: now,
        };

        let addons = priced
            .addons()
            .map(|service| BookingAddon {
                id: Uuid::new_v4(),
                booking_id,
                kind: service.kind,
                service_id: service.id,
                name: service.name.clone(),
                price_cents: service.price_cents,
            })
            .collect();

        let milestone_method = match payment.method {
            PaymentMethod::BankTransfer => Some(PaymentMethod::BankTransfer),
            PaymentMethod::Card => None,
        };
        let milestones = schedule
            .into_iter()
            .map(|m| Milestone {
                id: Uuid::new_v4(),
                booking_id,
                milestone_type: m.milestone_type,
                milestone_number: m.milestone_number,
                due_date: m.due_date,
                amount_cents: m.amount_cents,
                status: MilestoneStatus::Pending,
                payment_method: milestone_method,
                paid_at: None,
                transaction_reference: None,
                created_at: now,
                updated_at: now,
            })
            .collect();

        let offline_payment = reference.map(|reference| {
            let mut record = GatewayPayment::new_pending(
                booking_id,
                PaymentMethod::BankTransfer,
                amount_due_now_cents,
                &self.currency,
                payment.option,
            );
            record.reference = Some(reference);
            record
        });

        let booking = self.bookings
            .create(NewBooking { booking, addons, milestones, offline_payment })
            .await
            .map_err(|e| {
                tracing::error!("Booking creation failed for user {}: {}", user.id, e);
                AppError::BookingCreationFailed
            })?;

        tracing::info!(
            "Booking {} submitted by user {} ({} minor units due now)",
            booking.id,
            user.id,
            booking.amount_due_now_cents
        );

        // The guest can ask for a new email, so a failed send keeps the booking.
        if let Err(e) = send_verification(self.notifier.as_ref(), &self.base_url, &booking, &token).await {
            tracing::error!("Failed to send verification email for booking {}: {}", booking.id, e);
        }

        Ok(SubmittedBooking {
            booking_id: booking.id,
            amount_due_now_cents: booking.amount_due_now_cents,
            redirect: format!("/bookings/{}/verify-pending", booking.id),
        })
    }

    /// Booking with its add-ons, milestones and payment attempts.
    pub async fn get_detail(&self, booking_id: Uuid, caller: &User) -> Result<BookingDetail> {
        let booking = self.find(booking_id).await?;

        if !booking.is_owned_by(caller.id) && !caller.is_admin {
            return Err(AppError::Forbidden);
        }

        let addons = self.bookings.find_addons(booking.id).await?;
        let milestones = self.bookings.find_milestones(booking.id).await?;
        let payments = self.payments.find_by_booking(booking.id).await?;

        Ok(BookingDetail { booking, addons, milestones, payments })
    }

    pub async fn list_for_user(&self, user: &User) -> Result<Vec<Booking>> {
        self.bookings.list_by_user(user.id).await
    }

    pub async fn list_bookings(&self, limit: i64, offset: i64) -> Result<Vec<Booking>> {
        self.bookings.list(limit.clamp(1, 200), offset.max(0)).await
    }

    /// Administrative decision on a booking. Payments and milestones are untouched.
    pub async fn set_booking_status(&self, booking_id: Uuid, status: BookingStatus) -> Result<Booking> {
        if !matches!(
            status,
            BookingStatus::Approved | BookingStatus::Rejected | BookingStatus::Cancelled
        ) {
            return Err(AppError::Validation(format!(
                "Bookings cannot be set to {}",
                status.as_str()
            )));
        }

        if !self.bookings.set_status(booking_id, status).await? {
            return Err(AppError::NotFound("Booking not found".to_string()));
        }

        tracing::info!("Booking {} set to {}", booking_id, status.as_str());

        self.find(booking_id).await
    }

    async fn find(&self, booking_id: Uuid) -> Result<Booking> {
        self.bookings
            .find_by_id(booking_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Booking not found".to_string()))
    }
}
