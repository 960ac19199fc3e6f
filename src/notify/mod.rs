//! Outbound guest notifications.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::Result;

pub mod console;
pub mod smtp;

pub use console::ConsoleNotifier;
pub use smtp::SmtpNotifier;

/// Everything needed to ask a guest to confirm their booking email.
#[derive(Debug, Clone)]
pub struct BookingVerification {
    pub user_id: Uuid,
    pub booking_id: Uuid,
    pub to_email: String,
    pub to_name: String,
    pub token: String,
    pub verify_url: String,
}

impl BookingVerification {
    pub fn subject(&self) -> &'static str {
        "Confirm your booking email"
    }

    pub fn body(&self) -> String {
        format!(
            "Hi {},\n\n\
             Thanks for your booking ({}).\n\n\
             Please confirm your email address to continue to payment:\n{}\n\n\
             If you didn't make this booking, you can safely ignore this email.",
            self.to_name, self.booking_id, self.verify_url
        )
    }
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send_booking_verification(&self, message: &BookingVerification) -> Result<()>;
}
