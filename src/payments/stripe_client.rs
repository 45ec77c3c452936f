use async_trait::async_trait;
use stripe::{
    CancelPaymentIntent, Client, CreatePaymentIntent, Currency, ErrorType, EventObject, EventType,
    PaymentIntent, PaymentIntentCancellationReason, PaymentIntentConfirmParams, PaymentIntentId,
    PaymentIntentStatus, PaymentMethodId, RequestStrategy, StripeError, UpdatePaymentIntent,
    Webhook, WebhookError,
};

use crate::{
    error::{AppError, Result},
    payments::{
        ConfirmedCharge, CreateIntentParams, GatewayIntent, GatewayIntentStatus, PaymentGateway,
    },
};

pub struct StripeGateway {
    client: Client,
    webhook_secret: String,
}

impl StripeGateway {
    pub fn new(api_key: String, webhook_secret: String) -> Self {
        let client = Client::new(api_key);
        Self {
            client,
            webhook_secret,
        }
    }

    fn parse_intent_id(id: &str) -> Result<PaymentIntentId> {
        id.parse::<PaymentIntentId>()
            .map_err(|e| AppError::Validation(format!("Invalid payment intent id {}: {}", id, e)))
    }

    /// Confirm params carry no payment method, so it is attached by an
    /// update first.
    fn attach_method_params(payment_method: &str) -> Result<UpdatePaymentIntent<'static>> {
        let method = payment_method.parse::<PaymentMethodId>().map_err(|e| {
            AppError::Validation(format!("Invalid payment method {}: {}", payment_method, e))
        })?;

        Ok(UpdatePaymentIntent {
            payment_method: Some(method),
            ..Default::default()
        })
    }

    fn to_gateway_intent(intent: PaymentIntent) -> Result<GatewayIntent> {
        let status = match intent.status {
            PaymentIntentStatus::Succeeded => GatewayIntentStatus::Succeeded,
            PaymentIntentStatus::Processing => GatewayIntentStatus::Processing,
            PaymentIntentStatus::Canceled => GatewayIntentStatus::Canceled,
            _ => GatewayIntentStatus::AwaitingConfirmation,
        };

        Ok(GatewayIntent {
            id: intent.id.to_string(),
            client_secret: intent.client_secret.unwrap_or_default(),
            amount_cents: intent.amount,
            currency: intent.currency.to_string(),
            status,
            payment_method: intent.payment_method_types.first().cloned(),
        })
    }
}

fn map_stripe_error(err: StripeError) -> AppError {
    match err {
        StripeError::Stripe(request_error) if matches!(request_error.error_type, ErrorType::Card) => {
            AppError::Declined(
                request_error
                    .message
                    .unwrap_or_else(|| "Payment method was declined".to_string()),
            )
        }
        StripeError::Timeout => AppError::Gateway("Stripe request timed out".to_string()),
        e => AppError::Gateway(format!("Stripe error: {}", e)),
    }
}

#[async_trait]
impl PaymentGateway for StripeGateway {
    fn name(&self) -> &str {
        "stripe"
    }

    async fn create_intent(&self, params: &CreateIntentParams) -> Result<GatewayIntent> {
        let currency = params
            .currency
            .parse::<Currency>()
            .map_err(|_| AppError::Validation(format!("Unsupported currency: {}", params.currency)))?;

        let mut create = CreatePaymentIntent::new(params.amount_cents, currency);
        create.description = Some(&params.description);
        create.receipt_email = Some(&params.receipt_email);
        create.payment_method_types = Some(vec!["card".to_string()]);

        // Metadata lets the webhook path map back to the registration.
        let mut metadata = std::collections::HashMap::new();
        metadata.insert("registration_id".to_string(), params.registration_id.to_string());
        create.metadata = Some(metadata);

        let client = self
            .client
            .clone()
            .with_strategy(RequestStrategy::Idempotent(params.idempotency_key.clone()));

        let intent = PaymentIntent::create(&client, create)
            .await
            .map_err(map_stripe_error)?;

        let intent = Self::to_gateway_intent(intent)?;
        if intent.client_secret.is_empty() {
            return Err(AppError::Gateway("No client secret returned".to_string()));
        }
        Ok(intent)
    }

    async fn confirm_intent(&self, gateway_intent_id: &str, payment_method: &str) -> Result<ConfirmedCharge> {
        let intent_id = Self::parse_intent_id(gateway_intent_id)?;
        let attach = Self::attach_method_params(payment_method)?;

        PaymentIntent::update(&self.client, &intent_id, attach)
            .await
            .map_err(map_stripe_error)?;

        let intent = PaymentIntent::confirm(
            &self.client,
            intent_id.as_str(),
            PaymentIntentConfirmParams::default(),
        )
        .await
        .map_err(map_stripe_error)?;

        let intent = Self::to_gateway_intent(intent)?;
        match intent.status {
            GatewayIntentStatus::Succeeded => intent
                .confirmed_charge()
                .ok_or_else(|| AppError::Internal("Succeeded intent without charge".to_string())),
            GatewayIntentStatus::Canceled => {
                Err(AppError::Declined("Payment intent was canceled".to_string()))
            }
            status => Err(AppError::Gateway(format!(
                "Payment intent {} not completed: {:?}",
                intent.id, status
            ))),
        }
    }

    async fn retrieve_intent(&self, gateway_intent_id: &str) -> Result<GatewayIntent> {
        let intent_id = Self::parse_intent_id(gateway_intent_id)?;
        let intent = PaymentIntent::retrieve(&self.client, &intent_id, &[])
            .await
            .map_err(map_stripe_error)?;

        Self::to_gateway_intent(intent)
    }

    async fn cancel_intent(&self, gateway_intent_id: &str) -> Result<GatewayIntent> {
        let current = self.retrieve_intent(gateway_intent_id).await?;
        if current.status != GatewayIntentStatus::AwaitingConfirmation {
            return Ok(current);
        }

        let intent_id = Self::parse_intent_id(gateway_intent_id)?;
        let params = CancelPaymentIntent {
            cancellation_reason: Some(PaymentIntentCancellationReason::Abandoned),
        };
        let intent = PaymentIntent::cancel(&self.client, intent_id.as_str(), params)
            .await
            .map_err(map_stripe_error)?;

        Self::to_gateway_intent(intent)
    }

    fn verify_webhook(&self, payload: &str, signature: &str) -> Result<Option<ConfirmedCharge>> {
        // Verify webhook signature and construct event
        let event = Webhook::construct_event(payload, signature, &self.webhook_secret)
            .map_err(|e| match e {
                WebhookError::BadSignature => AppError::Validation("Invalid signature".to_string()),
                _ => AppError::Gateway(format!("Webhook error: {}", e)),
            })?;

        match event.type_ {
            EventType::PaymentIntentSucceeded => {
                if let EventObject::PaymentIntent(intent) = event.data.object {
                    let intent = Self::to_gateway_intent(intent)?;
                    return Ok(intent.confirmed_charge());
                }
                Ok(None)
            }
            EventType::PaymentIntentPaymentFailed => {
                tracing::warn!("Stripe reported a failed payment attempt");
                Ok(None)
            }
            _ => {
                tracing::debug!("Unhandled webhook event type: {:?}", event.type_);
                Ok(None)
            }
        }
    }
}
