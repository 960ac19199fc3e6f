use std::sync::Arc;

use serde::Serialize;
use uuid::Uuid;

use crate::{
    auth::{generate_token, hash_token, token_matches},
    domain::{Booking, BookingPaymentStatus, PaymentMethod, User},
    error::{AppError, Result},
    notify::{BookingVerification, Notifier},
    repository::{BookingRepository, PaymentRepository},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VerifyOutcome {
    Verified,
    /// Verified, with a bank transfer waiting for an administrator.
    AwaitingApproval,
    AlreadyVerified,
}

#[derive(Debug, Clone, Serialize)]
pub struct VerifyResult {
    pub booking_id: Uuid,
    pub outcome: VerifyOutcome,
    pub redirect: String,
}

pub struct VerificationService {
    bookings: Arc<dyn BookingRepository>,
    payments: Arc<dyn PaymentRepository>,
    notifier: Arc<dyn Notifier>,
    base_url: String,
}

impl VerificationService {
    pub fn new(
        bookings: Arc<dyn BookingRepository>,
        payments: Arc<dyn PaymentRepository>,
        notifier: Arc<dyn Notifier>,
        base_url: String,
    ) -> Self {
        Self { bookings, payments, notifier, base_url }
    }

    pub async fn verify(&self, booking_id: Uuid, token: &str, caller: &User) -> Result<VerifyResult> {
        let booking = self.owned_booking(booking_id, caller).await?;

        if booking.email_verified {
            return Ok(Self::result(&booking, VerifyOutcome::AlreadyVerified));
        }

        let token_ok = booking
            .verification_token_hash
            .as_deref()
            .map(|stored| token_matches(token, stored))
            .unwrap_or(false);
        if !token_ok {
            tracing::warn!("Invalid verification token presented for booking {}", booking.id);
            return Err(AppError::InvalidToken);
        }

        if !self.bookings.mark_verified(booking.id).await? {
            // Another request verified it first.
            return Ok(Self::result(&booking, VerifyOutcome::AlreadyVerified));
        }

        // A bank transfer leaves the booking pending until an admin confirms
        // the funds, so status stays where creation put it.
        let outcome = if self.payments.has_pending(booking.id, PaymentMethod::BankTransfer).await? {
            VerifyOutcome::AwaitingApproval
        } else {
            VerifyOutcome::Verified
        };

        tracing::info!("Booking {} email verified ({:?})", booking.id, outcome);

        Ok(Self::result(&booking, outcome))
    }

    pub async fn resend_verification(&self, booking_id: Uuid, caller: &User) -> Result<()> {
        let booking = self.owned_booking(booking_id, caller).await?;

        if booking.email_verified {
            return Err(AppError::AlreadyVerified);
        }

        let token = generate_token();
        if !self.bookings.replace_verification_token(booking.id, &hash_token(&token)).await? {
            return Err(AppError::AlreadyVerified);
        }

        send_verification(self.notifier.as_ref(), &self.base_url, &booking, &token).await?;
        tracing::info!("Resent verification email for booking {}", booking.id);

        Ok(())
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

    fn result(booking: &Booking, outcome: VerifyOutcome) -> VerifyResult {
        VerifyResult {
            booking_id: booking.id,
            outcome,
            redirect: redirect_after_verification(booking, outcome),
        }
    }
}

fn redirect_after_verification(booking: &Booking, outcome: VerifyOutcome) -> String {
    let awaiting_card_payment = booking.payment_method == PaymentMethod::Card
        && booking.payment_status == BookingPaymentStatus::Pending
        && !booking.status.is_closed();

    match outcome {
        VerifyOutcome::AwaitingApproval => format!("/bookings/{}/pending", booking.id),
        _ if awaiting_card_payment => format!("/bookings/{}/pay", booking.id),
        _ => format!("/bookings/{}", booking.id),
    }
}

pub fn verification_url(base_url: &str, booking_id: Uuid, token: &str) -> String {
    format!(
        "{}/api/bookings/{}/verify?token={}",
        base_url.trim_end_matches('/'),
        booking_id,
        token
    )
}

/// Emails the plaintext token to the booking's contact address.
pub(crate) async fn send_verification(
    notifier: &dyn Notifier,
    base_url: &str,
    booking: &Booking,
    token: &str,
) -> Result<()> {
    let message = BookingVerification {
        user_id: booking.user_id,
        booking_id: booking.id,
        to_email: booking.contact_email.clone(),
        to_name: booking.contact_name.clone(),
        token: token.to_string(),
        verify_url: verification_url(base_url, booking.id, token),
    };

    notifier.send_booking_verification(&message).await
}
