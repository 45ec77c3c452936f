use std::{
    collections::{HashMap, HashSet},
    sync::Mutex,
    time::Duration,
};

use async_trait::async_trait;
use serde::Deserialize;

use crate::{
    error::{AppError, Result},
    payments::{
        ConfirmedCharge, CreateIntentParams, GatewayIntent, GatewayIntentStatus, PaymentGateway,
    },
};

/// In-process gateway used by tests, the seed tool and local development
/// when Stripe is disabled. Behaves like a processor that honours
/// idempotency keys, and can be told to misbehave.
pub struct FakeGateway {
    webhook_secret: String,
    state: Mutex<FakeState>,
}

#[derive(Default)]
struct FakeState {
    intents: HashMap<String, GatewayIntent>,
    by_idempotency_key: HashMap<String, String>,
    declined_methods: HashSet<String>,
    fail_next_creates: u32,
    fail_next_confirms: u32,
    confirm_delay: Option<Duration>,
    confirmed_amount_override: Option<i64>,
    create_calls: u32,
    confirm_calls: u32,
    retrieve_calls: u32,
    cancel_calls: u32,
    next_id: u64,
}

#[derive(Deserialize)]
struct FakeEvent {
    #[serde(rename = "type")]
    event_type: String,
    intent_id: String,
}

impl FakeGateway {
    pub fn new(webhook_secret: impl Into<String>) -> Self {
        Self {
            webhook_secret: webhook_secret.into(),
            state: Mutex::new(FakeState::default()),
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, FakeState>> {
        self.state
            .lock()
            .map_err(|_| AppError::Internal("Fake gateway state poisoned".to_string()))
    }

    fn with_state<T>(&self, f: impl FnOnce(&mut FakeState) -> T) -> T {
        let mut guard = match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        f(&mut guard)
    }

    pub fn decline_method(&self, payment_method: &str) {
        self.with_state(|s| {
            s.declined_methods.insert(payment_method.to_string());
        });
    }

    pub fn fail_next_creates(&self, count: u32) {
        self.with_state(|s| s.fail_next_creates = count);
    }

    pub fn fail_next_confirms(&self, count: u32) {
        self.with_state(|s| s.fail_next_confirms = count);
    }

    /// The charge is recorded as succeeded before the delay, so a caller
    /// that times out will find it on re-query.
    pub fn delay_confirms(&self, delay: Duration) {
        self.with_state(|s| s.confirm_delay = Some(delay));
    }

    pub fn clear_confirm_delay(&self) {
        self.with_state(|s| s.confirm_delay = None);
    }

    pub fn override_confirmed_amount(&self, amount_cents: i64) {
        self.with_state(|s| s.confirmed_amount_override = Some(amount_cents));
    }

    /// Completes an intent as if the participant paid through another
    /// channel, e.g. the hosted payment page. Canceled intents stay canceled.
    pub fn succeed_out_of_band(&self, gateway_intent_id: &str) -> Option<ConfirmedCharge> {
        self.with_state(|s| {
            let intent = s.intents.get_mut(gateway_intent_id)?;
            if intent.status == GatewayIntentStatus::Canceled {
                return None;
            }
            intent.status = GatewayIntentStatus::Succeeded;
            if intent.payment_method.is_none() {
                intent.payment_method = Some("card".to_string());
            }
            intent.confirmed_charge()
        })
    }

    pub fn intent(&self, gateway_intent_id: &str) -> Option<GatewayIntent> {
        self.with_state(|s| s.intents.get(gateway_intent_id).cloned())
    }

    pub fn intent_count(&self) -> usize {
        self.with_state(|s| s.intents.len())
    }

    pub fn create_calls(&self) -> u32 {
        self.with_state(|s| s.create_calls)
    }

    pub fn confirm_calls(&self) -> u32 {
        self.with_state(|s| s.confirm_calls)
    }

    pub fn retrieve_calls(&self) -> u32 {
        self.with_state(|s| s.retrieve_calls)
    }

    pub fn cancel_calls(&self) -> u32 {
        self.with_state(|s| s.cancel_calls)
    }

    /// Builds a webhook body this gateway will accept.
    pub fn webhook_payload(gateway_intent_id: &str) -> String {
        serde_json::json!({
            "type": "payment_intent.succeeded",
            "intent_id": gateway_intent_id,
        })
        .to_string()
    }
}

#[async_trait]
impl PaymentGateway for FakeGateway {
    fn name(&self) -> &str {
        "fake"
    }

    async fn create_intent(&self, params: &CreateIntentParams) -> Result<GatewayIntent> {
        let mut state = self.lock()?;
        state.create_calls += 1;

        if state.fail_next_creates > 0 {
            state.fail_next_creates -= 1;
            return Err(AppError::Gateway("Simulated gateway outage".to_string()));
        }

        if let Some(existing) = state
            .by_idempotency_key
            .get(&params.idempotency_key)
            .and_then(|id| state.intents.get(id))
        {
            return Ok(existing.clone());
        }

        state.next_id += 1;
        let id = format!("pi_fake_{:06}", state.next_id);
        let intent = GatewayIntent {
            id: id.clone(),
            client_secret: format!("{}_secret_{}", id, uuid::Uuid::new_v4().simple()),
            amount_cents: params.amount_cents,
            currency: params.currency.clone(),
            status: GatewayIntentStatus::AwaitingConfirmation,
            payment_method: None,
        };

        state
            .by_idempotency_key
            .insert(params.idempotency_key.clone(), id.clone());
        state.intents.insert(id, intent.clone());

        Ok(intent)
    }

    async fn confirm_intent(&self, gateway_intent_id: &str, payment_method: &str) -> Result<ConfirmedCharge> {
        let (charge, delay) = {
            let mut state = self.lock()?;
            state.confirm_calls += 1;

            if state.fail_next_confirms > 0 {
                state.fail_next_confirms -= 1;
                return Err(AppError::Gateway("Simulated gateway outage".to_string()));
            }

            if state.declined_methods.contains(payment_method) {
                return Err(AppError::Declined(format!(
                    "Payment method {} was declined",
                    payment_method
                )));
            }

            let amount_override = state.confirmed_amount_override;
            let delay = state.confirm_delay;
            let intent = state.intents.get_mut(gateway_intent_id).ok_or_else(|| {
                AppError::NotFound(format!("Payment intent {} not found", gateway_intent_id))
            })?;

            if intent.status == GatewayIntentStatus::Canceled {
                return Err(AppError::Declined("Payment intent was canceled".to_string()));
            }

            if intent.status != GatewayIntentStatus::Succeeded {
                intent.status = GatewayIntentStatus::Succeeded;
                // Reports the method type, never the caller's token.
                intent.payment_method = Some("card".to_string());
                if let Some(amount) = amount_override {
                    intent.amount_cents = amount;
                }
            }

            let charge = intent
                .confirmed_charge()
                .ok_or_else(|| AppError::Internal("Succeeded intent without charge".to_string()))?;
            (charge, delay)
        };

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        Ok(charge)
    }

    async fn retrieve_intent(&self, gateway_intent_id: &str) -> Result<GatewayIntent> {
        let mut state = self.lock()?;
        state.retrieve_calls += 1;
        state
            .intents
            .get(gateway_intent_id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("Payment intent {} not found", gateway_intent_id)))
    }

    async fn cancel_intent(&self, gateway_intent_id: &str) -> Result<GatewayIntent> {
        let mut state = self.lock()?;
        state.cancel_calls += 1;
        let intent = state.intents.get_mut(gateway_intent_id).ok_or_else(|| {
            AppError::NotFound(format!("Payment intent {} not found", gateway_intent_id))
        })?;

        if intent.status == GatewayIntentStatus::AwaitingConfirmation {
            intent.status = GatewayIntentStatus::Canceled;
        }

        Ok(intent.clone())
    }

    fn verify_webhook(&self, payload: &str, signature: &str) -> Result<Option<ConfirmedCharge>> {
        if signature != self.webhook_secret {
            return Err(AppError::Validation("Invalid signature".to_string()));
        }

        let event: FakeEvent = serde_json::from_str(payload)
            .map_err(|e| AppError::Validation(format!("Malformed webhook payload: {}", e)))?;

        if event.event_type != "payment_intent.succeeded" {
            tracing::debug!("Unhandled webhook event type: {}", event.event_type);
            return Ok(None);
        }

        match self.intent(&event.intent_id) {
            None => Err(AppError::NotFound(format!(
                "Payment intent {} not found",
                event.intent_id
            ))),
            Some(intent) if intent.status == GatewayIntentStatus::Canceled => Ok(None),
            Some(_) => Ok(self.succeed_out_of_band(&event.intent_id)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn params(key: &str) -> CreateIntentParams {
        CreateIntentParams {
            registration_id: Uuid::new_v4(),
            amount_cents: 100_000,
            currency: "bdt".to_string(),
            idempotency_key: key.to_string(),
            description: "Camp fee".to_string(),
            receipt_email: "p@example.com".to_string(),
        }
    }

    #[tokio::test]
    async fn same_idempotency_key_returns_same_intent() {
        let gateway = FakeGateway::new("whsec");
        let first = gateway.create_intent(&params("reg-1")).await.unwrap();
        let second = gateway.create_intent(&params("reg-1")).await.unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(gateway.intent_count(), 1);
        assert_eq!(gateway.create_calls(), 2);
    }

    #[tokio::test]
    async fn declined_method_leaves_intent_unconfirmed() {
        let gateway = FakeGateway::new("whsec");
        gateway.decline_method("pm_card_declined");
        let intent = gateway.create_intent(&params("reg-2")).await.unwrap();

        let err = gateway
            .confirm_intent(&intent.id, "pm_card_declined")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Declined(_)));
        assert_eq!(
            gateway.intent(&intent.id).unwrap().status,
            GatewayIntentStatus::AwaitingConfirmation
        );
    }

    #[tokio::test]
    async fn confirm_is_repeatable() {
        let gateway = FakeGateway::new("whsec");
        let intent = gateway.create_intent(&params("reg-3")).await.unwrap();

        let a = gateway.confirm_intent(&intent.id, "pm_card_visa").await.unwrap();
        let b = gateway.confirm_intent(&intent.id, "pm_card_visa").await.unwrap();
        assert_eq!(a, b);
        assert_eq!(a.amount_cents, 100_000);
        assert_eq!(a.transaction_id, intent.id);
    }

    #[tokio::test]
    async fn canceled_intent_cannot_be_paid() {
        let gateway = FakeGateway::new("whsec");
        let intent = gateway.create_intent(&params("reg-4")).await.unwrap();

        let canceled = gateway.cancel_intent(&intent.id).await.unwrap();
        assert_eq!(canceled.status, GatewayIntentStatus::Canceled);

        assert!(gateway.succeed_out_of_band(&intent.id).is_none());
        assert_eq!(
            gateway
                .verify_webhook(&FakeGateway::webhook_payload(&intent.id), "whsec")
                .unwrap(),
            None
        );
        assert!(matches!(
            gateway.confirm_intent(&intent.id, "pm_card_visa").await,
            Err(AppError::Declined(_))
        ));
    }

    #[tokio::test]
    async fn cancel_leaves_succeeded_intent_alone() {
        let gateway = FakeGateway::new("whsec");
        let intent = gateway.create_intent(&params("reg-5")).await.unwrap();
        gateway.confirm_intent(&intent.id, "pm_card_visa").await.unwrap();

        let after = gateway.cancel_intent(&intent.id).await.unwrap();
        assert_eq!(after.status, GatewayIntentStatus::Succeeded);
    }

    #[test]
    fn webhook_requires_matching_signature() {
        let gateway = FakeGateway::new("whsec");
        let payload = FakeGateway::webhook_payload("pi_missing");

        assert!(matches!(
            gateway.verify_webhook(&payload, "wrong"),
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            gateway.verify_webhook(&payload, "whsec"),
            Err(AppError::NotFound(_))
        ));
        assert_eq!(
            gateway
                .verify_webhook(r#"{"type":"charge.refunded","intent_id":"x"}"#, "whsec")
                .unwrap(),
            None
        );
    }
}
