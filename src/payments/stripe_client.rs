use async_trait::async_trait;
use stripe::{
    CheckoutSession, CheckoutSessionId, CheckoutSessionMode, CheckoutSessionPaymentStatus,
    Client, CreateCheckoutSession, CreateCheckoutSessionLineItems, Currency, EventObject,
    EventType, Webhook, WebhookError,
};
use uuid::Uuid;

use crate::error::{AppError, Result};

use super::{CheckoutSessionRequest, GatewayEvent, GatewaySession, PaymentGateway};

pub struct StripeGateway {
    client: Client,
    webhook_secret: String,
}

impl StripeGateway {
    pub fn new(api_key: String, webhook_secret: String) -> Self {
        Self {
            client: Client::new(api_key),
            webhook_secret,
        }
    }

    fn currency(code: &str) -> Result<Currency> {
        match code.to_lowercase().as_str() {
            "gbp" => Ok(Currency::GBP),
            "usd" => Ok(Currency::USD),
            "eur" => Ok(Currency::EUR),
            other => Err(AppError::PaymentGateway(format!("Unsupported currency: {}", other))),
        }
    }

    fn is_paid(session: &CheckoutSession) -> bool {
        matches!(
            session.payment_status,
            CheckoutSessionPaymentStatus::Paid | CheckoutSessionPaymentStatus::NoPaymentRequired
        )
    }

    fn booking_id_of(session: &CheckoutSession) -> Option<Uuid> {
        session
            .client_reference_id
            .as_deref()
            .and_then(|id| Uuid::parse_str(id).ok())
    }
}

#[async_trait]
impl PaymentGateway for StripeGateway {
    async fn create_checkout_session(&self, request: CheckoutSessionRequest) -> Result<GatewaySession> {
        let currency = Self::currency(&request.currency)?;

        let mut params = CreateCheckoutSession::new();
        params.mode = Some(CheckoutSessionMode::Payment);
        params.success_url = Some(&request.success_url);
        params.cancel_url = Some(&request.cancel_url);
        params.client_reference_id = Some(&request.client_reference_id);

        // Single line item with inline price data
        params.line_items = Some(vec![CreateCheckoutSessionLineItems {
            price_data: Some(stripe::CreateCheckoutSessionLineItemsPriceData {
                currency,
                unit_amount: Some(request.unit_amount_cents),
                product_data: Some(stripe::CreateCheckoutSessionLineItemsPriceDataProductData {
                    name: request.product_name.clone(),
                    description: Some(request.description.clone()),
                    ..Default::default()
                }),
                ..Default::default()
            }),
            quantity: Some(1),
            ..Default::default()
        }]);
        params.metadata = Some(request.metadata.clone());

        let session = CheckoutSession::create(&self.client, params)
            .await
            .map_err(|e| AppError::PaymentGateway(format!("Stripe error: {}", e)))?;

        let url = session.url
            .ok_or_else(|| AppError::PaymentGateway("No checkout URL returned".to_string()))?;

        Ok(GatewaySession {
            id: session.id.to_string(),
            url,
        })
    }

    async fn session_is_paid(&self, session_id: &str) -> Result<bool> {
        let id = session_id
            .parse::<CheckoutSessionId>()
            .map_err(|e| AppError::Validation(format!("Invalid session id: {}", e)))?;

        let session = CheckoutSession::retrieve(&self.client, &id, &[])
            .await
            .map_err(|e| AppError::PaymentGateway(format!("Stripe error: {}", e)))?;

        Ok(Self::is_paid(&session))
    }

    fn parse_webhook(&self, payload: &str, signature: &str) -> Result<GatewayEvent> {
        let event = Webhook::construct_event(payload, signature, &self.webhook_secret)
            .map_err(|e| match e {
                WebhookError::BadSignature => AppError::Validation("Invalid signature".to_string()),
                _ => AppError::PaymentGateway(format!("Webhook error: {}", e)),
            })?;

        let parsed = match (event.type_, event.data.object) {
            (EventType::CheckoutSessionCompleted, EventObject::CheckoutSession(session))
            | (EventType::CheckoutSessionAsyncPaymentSucceeded, EventObject::CheckoutSession(session)) => {
                GatewayEvent::CheckoutCompleted {
                    booking_id: Self::booking_id_of(&session),
                    paid: Self::is_paid(&session),
                    session_id: session.id.to_string(),
                }
            }
            (EventType::CheckoutSessionAsyncPaymentFailed, EventObject::CheckoutSession(session)) => {
                GatewayEvent::PaymentFailed {
                    session_id: session.id.to_string(),
                }
            }
            (EventType::CheckoutSessionExpired, EventObject::CheckoutSession(session)) => {
                GatewayEvent::CheckoutExpired {
                    session_id: session.id.to_string(),
                }
            }
            (other, _) => {
                tracing::debug!("Unhandled webhook event type: {:?}", other);
                GatewayEvent::Ignored
            }
        };

        Ok(parsed)
    }
}
