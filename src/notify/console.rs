use async_trait::async_trait;

use crate::error::Result;

use super::{BookingVerification, Notifier};

/// Logs verification links instead of mailing them (development).
#[derive(Default)]
pub struct ConsoleNotifier;

impl ConsoleNotifier {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Notifier for ConsoleNotifier {
    async fn send_booking_verification(&self, message: &BookingVerification) -> Result<()> {
        tracing::info!(
            user_id = %message.user_id,
            booking_id = %message.booking_id,
            email = %message.to_email,
            url = %message.verify_url,
            "Booking verification link"
        );
        Ok(())
    }
}
