use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};

use crate::{
    config::SmtpConfig,
    error::{AppError, Result},
};

use super::{BookingVerification, Notifier};

pub struct SmtpNotifier {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpNotifier {
    pub fn new(config: SmtpConfig) -> Result<Self> {
        let creds = Credentials::new(config.username, config.password);

        let transport = AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)
            .map_err(|e| AppError::Notification(format!("Failed to create SMTP transport: {}", e)))?
            .port(config.port)
            .credentials(creds)
            .build();

        let from_address = match &config.from_name {
            Some(name) => format!("{} <{}>", name, config.from_email),
            None => config.from_email.clone(),
        };
        let from = from_address
            .parse::<Mailbox>()
            .map_err(|e| AppError::Notification(format!("Invalid from address: {}", e)))?;

        tracing::info!(host = %config.host, port = config.port, "SMTP notifier configured");

        Ok(Self { transport, from })
    }

    async fn send_email(&self, to: &str, subject: &str, body: String) -> Result<()> {
        let to_addr = to
            .parse::<Mailbox>()
            .map_err(|e| AppError::Notification(format!("Invalid to address: {}", e)))?;

        let email = Message::builder()
            .from(self.from.clone())
            .to(to_addr)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body)
            .map_err(|e| AppError::Notification(format!("Failed to build email: {}", e)))?;

        self.transport
            .send(email)
            .await
            .map_err(|e| AppError::Notification(format!("Failed to send email: {}", e)))?;

        Ok(())
    }
}

#[async_trait]
impl Notifier for SmtpNotifier {
    async fn send_booking_verification(&self, message: &BookingVerification) -> Result<()> {
        self.send_email(&message.to_email, message.subject(), message.body())
            .await?;
        tracing::info!(booking_id = %message.booking_id, "Booking verification email sent");
        Ok(())
    }
}
