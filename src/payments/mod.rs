use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Result;

pub mod stripe_client;
pub mod fake;

pub use stripe_client::StripeGateway;
pub use fake::FakeGateway;

#[derive(Debug, Clone)]
pub struct CreateIntentParams {
    pub registration_id: Uuid,
    pub amount_cents: i64,
    pub currency: String,
    /// Reused verbatim on every retry so the gateway never stages two charges.
    pub idempotency_key: String,
    pub description: String,
    pub receipt_email: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum GatewayIntentStatus {
    AwaitingConfirmation,
    Processing,
    Succeeded,
    Canceled,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GatewayIntent {
    pub id: String,
    pub client_secret: String,
    pub amount_cents: i64,
    pub currency: String,
    pub status: GatewayIntentStatus,
    pub payment_method: Option<String>,
}

impl GatewayIntent {
    /// The confirmed charge, if the gateway reports this intent as succeeded.
    pub fn confirmed_charge(&self) -> Option<ConfirmedCharge> {
        if self.status != GatewayIntentStatus::Succeeded {
            return None;
        }
        Some(ConfirmedCharge {
            gateway_intent_id: self.id.clone(),
            transaction_id: self.id.clone(),
            amount_cents: self.amount_cents,
            currency: self.currency.clone(),
            payment_method: self
                .payment_method
                .clone()
                .unwrap_or_else(|| "card".to_string()),
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConfirmedCharge {
    pub gateway_intent_id: String,
    pub transaction_id: String,
    pub amount_cents: i64,
    pub currency: String,
    pub payment_method: String,
}

/// Seam between the payment broker and a concrete payment processor.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    fn name(&self) -> &str;

    async fn create_intent(&self, params: &CreateIntentParams) -> Result<GatewayIntent>;

    /// Errors: `Declined` for a rejected method, `Gateway` for transient failures.
    async fn confirm_intent(&self, gateway_intent_id: &str, payment_method: &str) -> Result<ConfirmedCharge>;

    async fn retrieve_intent(&self, gateway_intent_id: &str) -> Result<GatewayIntent>;

    /// Cancels an intent that has not been paid. An intent that already
    /// succeeded or is processing is returned unchanged so the caller can
    /// settle or wait for it.
    async fn cancel_intent(&self, gateway_intent_id: &str) -> Result<GatewayIntent>;

    /// Verifies a callback signature. Returns the confirmed charge for
    /// success events and `None` for events the broker does not act on.
    fn verify_webhook(&self, payload: &str, signature: &str) -> Result<Option<ConfirmedCharge>>;
}
