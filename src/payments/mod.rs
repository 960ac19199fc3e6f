use std::collections::HashMap;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::Result;

pub mod stripe_client;

pub use stripe_client::StripeGateway;

/// Hosted checkout for a single line item.
#[derive(Debug, Clone)]
pub struct CheckoutSessionRequest {
    /// Lowercase ISO code.
    pub currency: String,
    pub product_name: String,
    pub description: String,
    /// Amount in minor units.
    pub unit_amount_cents: i64,
    pub success_url: String,
    pub cancel_url: String,
    pub client_reference_id: String,
    pub metadata: HashMap<String, String>,
}

#[derive(Debug, Clone)]
pub struct GatewaySession {
    pub id: String,
    pub url: String,
}

/// Verified notification pushed by the gateway.
#[derive(Debug, Clone, PartialEq)]
pub enum GatewayEvent {
    /// Customer finished the hosted checkout. `paid` is false while a
    /// delayed payment method has not yet cleared.
    CheckoutCompleted {
        session_id: String,
        booking_id: Option<Uuid>,
        paid: bool,
    },
    CheckoutExpired {
        session_id: String,
    },
    /// A delayed payment for a completed session was declined.
    PaymentFailed {
        session_id: String,
    },
    Ignored,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_checkout_session(&self, request: CheckoutSessionRequest) -> Result<GatewaySession>;

    /// Whether the customer completed payment for the session.
    async fn session_is_paid(&self, session_id: &str) -> Result<bool>;

    /// Verifies the signature and decodes a webhook payload.
    fn parse_webhook(&self, payload: &str, signature: &str) -> Result<GatewayEvent>;
}
