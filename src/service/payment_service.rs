use std::{collections::HashMap, sync::Arc};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    domain::{
        Booking, BookingPaymentStatus, GatewayPayment, PaymentMethod, PaymentOption,
        PaymentStatus, User,
    },
    error::{AppError, Result},
    payments::{CheckoutSessionRequest, GatewayEvent, PaymentGateway},
    repository::{BookingRepository, CatalogRepository, PaymentRepository, Settlement},
    service::checkout_service::CheckoutService,
};

/// Amount charged at checkout for a payment option.
pub fn amount_due(option: PaymentOption, grand_total_cents: i64, deposit_cents: i64) -> i64 {
    match option {
        PaymentOption::Full => grand_total_cents,
        PaymentOption::BookingOnly => deposit_cents,
    }
}

pub fn quote_amount_due(booking: &Booking) -> i64 {
    amount_due(booking.payment_option, booking.grand_total_cents, booking.deposit_cents)
}

/// Trimmed bank transfer reference, which must not be blank.
pub fn require_reference(reference: Option<&str>) -> Result<String> {
    match reference.map(str::trim) {
        Some(r) if !r.is_empty() => Ok(r.to_string()),
        _ => Err(AppError::Validation(
            "A bank transfer reference is required".to_string(),
        )),
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum PayRequest {
    Card,
    BankTransfer { reference: String },
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum PayResponse {
    Card { checkout_url: String },
    BankTransfer { payment_id: Uuid, redirect: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CallbackOutcome {
    Settled,
    AlreadyPaid,
    Cancelled,
    Unchanged,
}

#[derive(Debug, Clone, Serialize)]
pub struct CallbackResult {
    pub booking_id: Uuid,
    pub outcome: CallbackOutcome,
    pub redirect: String,
}

pub struct PaymentService {
    bookings: Arc<dyn BookingRepository>,
    payments: Arc<dyn PaymentRepository>,
    catalog: Arc<dyn CatalogRepository>,
    checkout: Arc<CheckoutService>,
    gateway: Option<Arc<dyn PaymentGateway>>,
    currency: String,
    base_url: String,
}

impl PaymentService {
    pub fn new(
        bookings: Arc<dyn BookingRepository>,
        payments: Arc<dyn PaymentRepository>,
        catalog: Arc<dyn CatalogRepository>,
        checkout: Arc<CheckoutService>,
        gateway: Option<Arc<dyn PaymentGateway>>,
        currency: String,
        base_url: String,
    ) -> Self {
        Self {
            bookings,
            payments,
            catalog,
            checkout,
            gateway,
            currency,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Starts payment of the amount due now on an owned booking.
    pub async fn pay(&self, booking_id: Uuid, caller: &User, request: PayRequest) -> Result<PayResponse> {
        let booking = self.owned_booking(booking_id, caller).await?;
        let amount = quote_amount_due(&booking);

        match request {
            PayRequest::Card => {
                let checkout_url = self.initiate_card_payment(&booking, amount).await?;
                Ok(PayResponse::Card { checkout_url })
            }
            PayRequest::BankTransfer { reference } => {
                let payment = self.record_offline_payment(&booking, amount, &reference).await?;
                Ok(PayResponse::BankTransfer {
                    payment_id: payment.id,
                    redirect: format!("/bookings/{}/pending", booking.id),
                })
            }
        }
    }

    /// Opens a hosted checkout session and records the pending attempt.
    /// Nothing is persisted when the gateway call fails, so callers may retry.
    pub async fn initiate_card_payment(&self, booking: &Booking, amount_cents: i64) -> Result<String> {
        ensure_payable(booking)?;
        let gateway = self.gateway()?;

        let package_name = self.catalog
            .find_package(booking.package_id)
            .await?
            .map(|p| p.name)
            .unwrap_or_else(|| "Stay".to_string());

        let label = match booking.payment_option {
            PaymentOption::BookingOnly => "Booking fee",
            PaymentOption::Full => "Full payment",
        };

        let mut metadata = HashMap::new();
        metadata.insert("booking_id".to_string(), booking.id.to_string());
        metadata.insert("payment_option".to_string(), booking.payment_option.as_str().to_string());

        let request = CheckoutSessionRequest {
            currency: self.currency.to_lowercase(),
            product_name: format!("{} - {}", label, package_name),
            description: format!(
                "Stay from {} to {}",
                booking.start_date.format("%d %b %Y"),
                booking.end_date.format("%d %b %Y")
            ),
            unit_amount_cents: amount_cents,
            success_url: format!(
                "{}/api/payments/{}/success?session_id={{CHECKOUT_SESSION_ID}}",
                self.base_url, booking.id
            ),
            cancel_url: format!("{}/api/payments/{}/cancel", self.base_url, booking.id),
            client_reference_id: booking.id.to_string(),
            metadata,
        };

        let session = gateway.create_checkout_session(request).await?;

        let mut attempt = GatewayPayment::new_pending(
            booking.id,
            PaymentMethod::Card,
            amount_cents,
            &self.currency,
            booking.payment_option,
        );
        attempt.transaction_id = Some(session.id.clone());
        self.payments.record_card_attempt(attempt).await?;

        tracing::info!(
            "Opened checkout session {} for booking {} ({} minor units)",
            session.id,
            booking.id,
            amount_cents
        );

        Ok(session.url)
    }

    pub async fn record_offline_payment(
        &self,
        booking: &Booking,
        amount_cents: i64,
        reference: &str,
    ) -> Result<GatewayPayment> {
        let reference = require_reference(Some(reference))?;
        ensure_payable(booking)?;

        let mut payment = GatewayPayment::new_pending(
            booking.id,
            PaymentMethod::BankTransfer,
            amount_cents,
            &self.currency,
            booking.payment_option,
        );
        payment.reference = Some(reference);

        let payment = self.payments.record_offline_payment(payment).await?;
        tracing::info!("Recorded bank transfer {} for booking {}", payment.id, booking.id);

        Ok(payment)
    }

    /// Return leg of the hosted checkout.
    pub async fn handle_success(&self, booking_id: Uuid, session_id: &str, caller: &User) -> Result<CallbackResult> {
        if !caller.email_verified() {
            return Err(AppError::Forbidden);
        }

        let booking = self.owned_booking(booking_id, caller).await?;

        let attempt = self.payments
            .find_by_transaction_id(session_id)
            .await?
            .filter(|p| p.booking_id == booking.id && p.method == PaymentMethod::Card)
            .ok_or_else(|| AppError::NotFound("Payment session not found".to_string()))?;

        let outcome = if booking.payment_status == BookingPaymentStatus::Paid {
            CallbackOutcome::AlreadyPaid
        } else if booking.status.is_closed() {
            return Err(AppError::Conflict("Booking is no longer open for payment".to_string()));
        } else {
            if !self.gateway()?.session_is_paid(session_id).await? {
                return Err(AppError::PaymentGateway(
                    "Payment has not been completed".to_string(),
                ));
            }
            self.settle_card(&attempt, session_id).await?
        };

        if let Err(e) = self.checkout.clear_for_user(caller).await {
            tracing::warn!("Failed to clear checkout selections for user {}: {}", caller.id, e);
        }

        Ok(CallbackResult {
            booking_id: booking.id,
            outcome,
            redirect: format!("/bookings/{}/confirmation", booking.id),
        })
    }

    /// Guest abandoned the hosted checkout. Paid bookings are left alone.
    pub async fn handle_cancel(&self, booking_id: Uuid, caller: &User) -> Result<CallbackResult> {
        let booking = self.owned_booking(booking_id, caller).await?;

        let outcome = if self.bookings.cancel_unpaid(booking.id).await? {
            tracing::info!("Booking {} cancelled from checkout", booking.id);
            CallbackOutcome::Cancelled
        } else {
            CallbackOutcome::Unchanged
        };

        Ok(CallbackResult {
            booking_id: booking.id,
            outcome,
            redirect: format!("/bookings/{}", booking.id),
        })
    }

    pub async fn handle_webhook(&self, payload: &str, signature: &str) -> Result<()> {
        let event = self.gateway()?.parse_webhook(payload, signature)?;

        match event {
            GatewayEvent::CheckoutCompleted { session_id, booking_id, paid } => {
                let Some(attempt) = self.payments.find_by_transaction_id(&session_id).await? else {
                    tracing::warn!("Webhook for unknown checkout session {}", session_id);
                    return Ok(());
                };

                if !paid {
                    tracing::info!(
                        "Checkout session {} completed without payment yet; waiting for the gateway",
                        session_id
                    );
                    return Ok(());
                }

                if booking_id.is_some_and(|id| id != attempt.booking_id) {
                    tracing::warn!(
                        "Checkout session {} names booking {:?} but was opened for {}",
                        session_id,
                        booking_id,
                        attempt.booking_id
                    );
                }

                let outcome = self.settle_card(&attempt, &session_id).await?;
                tracing::info!("Webhook settled booking {}: {:?}", attempt.booking_id, outcome);
            }
            GatewayEvent::CheckoutExpired { session_id } | GatewayEvent::PaymentFailed { session_id } => {
                if let Some(attempt) = self.payments.find_by_transaction_id(&session_id).await? {
                    if self.payments.resolve_pending(attempt.id, PaymentStatus::Failed).await? {
                        tracing::info!("Checkout session {} ended without payment", session_id);
                    }
                }
            }
            GatewayEvent::Ignored => {}
        }

        Ok(())
    }

    /// Marks a pending bank transfer as received and the booking as paid.
    pub async fn confirm_offline_payment(
        &self,
        payment_id: Uuid,
        admin_notes: Option<String>,
    ) -> Result<GatewayPayment> {
        let payment = self.find_payment(payment_id).await?;

        if payment.method != PaymentMethod::BankTransfer {
            return Err(AppError::Validation(
                "Only bank transfers can be confirmed manually".to_string(),
            ));
        }
        if payment.status != PaymentStatus::Pending {
            return Err(AppError::Conflict("Payment is no longer pending".to_string()));
        }

        let booking = self.bookings
            .find_by_id(payment.booking_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Booking not found".to_string()))?;
        if booking.status.is_closed() {
            return Err(AppError::Conflict(
                "Booking is no longer open for payment".to_string(),
            ));
        }

        let settled = self.bookings
            .settle_payment(Settlement {
                booking_id: payment.booking_id,
                payment_id: payment.id,
                method: PaymentMethod::BankTransfer,
                transaction_reference: payment.reference.clone(),
                admin_notes: admin_notes.filter(|n| !n.trim().is_empty()),
            })
            .await?;

        if !settled {
            return Err(AppError::Conflict("Booking is already paid or closed".to_string()));
        }

        tracing::info!("Bank transfer {} confirmed for booking {}", payment.id, payment.booking_id);

        self.find_payment(payment_id).await
    }

    async fn settle_card(&self, attempt: &GatewayPayment, session_id: &str) -> Result<CallbackOutcome> {
        let settled = self.bookings
            .settle_payment(Settlement {
                booking_id: attempt.booking_id,
                payment_id: attempt.id,
                method: PaymentMethod::Card,
                transaction_reference: Some(session_id.to_string()),
                admin_notes: None,
            })
            .await?;

        Ok(if settled {
            CallbackOutcome::Settled
        } else {
            CallbackOutcome::AlreadyPaid
        })
    }

    async fn owned_booking(&self, booking_id: Uuid, caller: &User) -> Result<Booking> {
        let booking = self.bookings
            .find_by_id(booking_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Booking not found".to_string()))?;

        if !booking.is_owned_by(caller.id) {
            return Err(AppError::Forbidden);
        }

        Ok(booking)
    }

    async fn find_payment(&self, id: Uuid) -> Result<GatewayPayment> {
        self.payments
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Payment not found".to_string()))
    }

    fn gateway(&self) -> Result<&Arc<dyn PaymentGateway>> {
        self.gateway
            .as_ref()
            .ok_or_else(|| AppError::PaymentGateway("Card payments are not configured".to_string()))
    }
}

fn ensure_payable(booking: &Booking) -> Result<()> {
    if !booking.email_verified {
        return Err(AppError::Validation(
            "Confirm the booking email before paying".to_string(),
        ));
    }
    if booking.payment_status == BookingPaymentStatus::Paid {
        return Err(AppError::Conflict("Booking is already paid".to_string()));
    }
    if booking.status.is_closed() {
        return Err(AppError::Conflict("Booking is no longer open for payment".to_string()));
    }
    Ok(())
}
