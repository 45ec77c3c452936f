use std::{future::Future, sync::Arc};

use chrono::Utc;
use uuid::Uuid;

use crate::{
    config::PaymentsConfig,
    domain::*,
    error::{AppError, Result},
    payments::{ConfirmedCharge, CreateIntentParams, GatewayIntentStatus, PaymentGateway},
    repository::{CampRepository, IntentRepository, PaymentRepository},
    service::ledger::RegistrationLedger,
};

enum Released {
    Canceled,
    Settled,
}

/// Drives the gateway side of a payment and hands confirmed charges to the
/// ledger. Every gateway call is bounded by `payments.gateway_timeout_secs`
/// and retried with the same idempotency key.
pub struct PaymentIntentBroker {
    ledger: Arc<RegistrationLedger>,
    camp_repo: Arc<dyn CampRepository>,
    intent_repo: Arc<dyn IntentRepository>,
    payment_repo: Arc<dyn PaymentRepository>,
    gateway: Option<Arc<dyn PaymentGateway>>,
    config: PaymentsConfig,
}

impl PaymentIntentBroker {
    pub fn new(
        ledger: Arc<RegistrationLedger>,
        camp_repo: Arc<dyn CampRepository>,
        intent_repo: Arc<dyn IntentRepository>,
        payment_repo: Arc<dyn PaymentRepository>,
        gateway: Option<Arc<dyn PaymentGateway>>,
        config: PaymentsConfig,
    ) -> Self {
        Self {
            ledger,
            camp_repo,
            intent_repo,
            payment_repo,
            gateway,
            config,
        }
    }

    fn gateway(&self) -> Result<&Arc<dyn PaymentGateway>> {
        self.gateway
            .as_ref()
            .ok_or_else(|| AppError::Gateway("payment gateway not configured".to_string()))
    }

    pub async fn create_intent(&self, registration_id: Uuid, actor: &User) -> Result<IntentHandle> {
        let registration = self.ledger.get(registration_id).await?;
        Self::ensure_payer(&registration, actor)?;

        if registration.is_paid() {
            tracing::error!("Payment initiated for already-paid registration {}", registration_id);
            return Err(AppError::InvalidTransition(
                "Registration is already paid".to_string(),
            ));
        }

        let camp = self
            .camp_repo
            .find_by_id(registration.camp_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Camp not found".to_string()))?;

        let previous = match self.intent_repo.find_by_registration(registration_id).await? {
            Some(existing)
                if existing.status == IntentStatus::Succeeded
                    || (existing.status == IntentStatus::Created
                        && existing.amount_cents == camp.fee_cents) =>
            {
                tracing::debug!("Reusing intent {} for registration {}", existing.id, registration_id);
                return Ok(IntentHandle::from(&existing));
            }
            Some(existing) => {
                if existing.status == IntentStatus::Created {
                    tracing::info!(
                        "Camp fee for registration {} is now {}, intent {} was staged for {}; restaging",
                        registration_id, camp.fee_cents, existing.gateway_intent_id, existing.amount_cents
                    );
                    if let Released::Settled = self.release(&existing).await? {
                        return Err(AppError::InvalidTransition(
                            "Registration is already paid".to_string(),
                        ));
                    }
                }
                Some(existing)
            }
            None => None,
        };

        if camp.fee_cents == 0 {
            return Err(AppError::Validation(
                "Camp is free; there is nothing to pay".to_string(),
            ));
        }

        // A restaged intent needs its own key or the gateway replays the old one.
        let idempotency_key = match &previous {
            Some(p) => format!("{}:{}", registration_id, p.gateway_intent_id),
            None => registration_id.to_string(),
        };

        let gateway = self.gateway()?;
        let params = CreateIntentParams {
            registration_id,
            amount_cents: camp.fee_cents,
            currency: self.config.currency.clone(),
            idempotency_key,
            description: format!("Registration fee for {}", camp.name),
            receipt_email: registration.participant_email.clone(),
        };

        let intent = self
            .call_gateway("create_intent", || gateway.create_intent(&params))
            .await?;

        if intent.amount_cents != params.amount_cents {
            tracing::error!(
                "Gateway staged intent {} for {} minor units, expected {}",
                intent.id, intent.amount_cents, params.amount_cents
            );
            return Err(AppError::AmountMismatch {
                expected_cents: params.amount_cents,
                confirmed_cents: intent.amount_cents,
            });
        }

        let now = Utc::now();
        let staged = PaymentIntentRecord {
            id: previous.as_ref().map(|p| p.id).unwrap_or_else(Uuid::new_v4),
            registration_id,
            gateway_intent_id: intent.id,
            client_secret: intent.client_secret,
            amount_cents: params.amount_cents,
            currency: params.currency,
            status: IntentStatus::Created,
            created_at: now,
            updated_at: now,
        };
        let record = match previous {
            Some(_) => self.intent_repo.replace_canceled(staged).await?,
            None => self.intent_repo.create_or_get(staged).await?,
        };

        tracing::info!(
            "Payment intent {} ({}) created for registration {}: {} minor units via {}",
            record.id,
            record.gateway_intent_id,
            registration_id,
            record.amount_cents,
            gateway.name()
        );

        Ok(IntentHandle::from(&record))
    }

    pub async fn confirm_intent(
        &self,
        intent_id: Uuid,
        payment_method: &str,
        actor: &User,
    ) -> Result<PaymentReceipt> {
        let record = self
            .intent_repo
            .find_by_id(intent_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Payment intent not found".to_string()))?;

        let registration = self.ledger.get(record.registration_id).await?;
        Self::ensure_payer(&registration, actor)?;

        if let Some(receipt) = self.recorded_receipt(&record).await? {
            return Ok(receipt);
        }

        if record.status == IntentStatus::Canceled {
            return Err(AppError::InvalidTransition(
                "Payment intent was canceled; initiate payment again".to_string(),
            ));
        }

        let camp = self
            .camp_repo
            .find_by_id(registration.camp_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Camp not found".to_string()))?;
        if camp.fee_cents != record.amount_cents {
            tracing::warn!(
                "Intent {} was staged for {} but camp {} now costs {}",
                record.gateway_intent_id, record.amount_cents, camp.id, camp.fee_cents
            );
            return Err(AppError::Conflict(
                "Camp fee changed since payment was initiated; initiate payment again".to_string(),
            ));
        }

        let payment_method = payment_method.trim();
        if payment_method.is_empty() {
            return Err(AppError::Validation("payment_method is required".to_string()));
        }

        let gateway = self.gateway()?;
        let timeout = self.config.gateway_timeout();
        let mut attempt = 0;

        loop {
            let outcome = tokio::time::timeout(
                timeout,
                gateway.confirm_intent(&record.gateway_intent_id, payment_method),
            )
            .await
            .unwrap_or_else(|_| {
                Err(AppError::Gateway(format!(
                    "confirm_intent timed out after {}s",
                    timeout.as_secs()
                )))
            });

            let err = match outcome {
                Ok(charge) => return self.settle(&record, charge).await,
                Err(e) if !e.is_retryable() => {
                    if matches!(e, AppError::Declined(_)) {
                        tracing::info!("Payment for registration {} declined: {}", record.registration_id, e);
                    }
                    return Err(e);
                }
                Err(e) => e,
            };

            tracing::warn!(
                "Confirmation of intent {} failed (attempt {}): {}; re-querying before retry",
                record.gateway_intent_id,
                attempt + 1,
                err
            );

            if let Some(receipt) = self.reconcile(&record).await? {
                return Ok(receipt);
            }

            if attempt >= self.config.max_retries {
                return Err(err);
            }
            attempt += 1;
        }
    }

    /// Applies a signed gateway callback. Returns the receipt when the event
    /// settled (or had already settled) a registration.
    pub async fn handle_webhook(&self, payload: &str, signature: &str) -> Result<Option<PaymentReceipt>> {
        let gateway = self.gateway()?;
        let Some(charge) = gateway.verify_webhook(payload, signature)? else {
            return Ok(None);
        };

        let Some(record) = self.intent_repo.find_by_gateway_id(&charge.gateway_intent_id).await? else {
            tracing::warn!("Webhook for unknown intent {}", charge.gateway_intent_id);
            return Ok(None);
        };

        if let Some(receipt) = self.recorded_receipt(&record).await? {
            return Ok(Some(receipt));
        }

        self.settle(&record, charge).await.map(Some)
    }

    /// Deletes an unpaid registration after canceling its open intent. If
    /// the participant already paid through the gateway the charge is
    /// settled instead and the delete is refused.
    pub async fn withdraw_registration(&self, registration_id: Uuid, actor: &User) -> Result<()> {
        let registration = self.ledger.get(registration_id).await?;
        self.ledger.ensure_visible_to(&registration, actor).await?;

        if !registration.is_paid() {
            if let Some(record) = self.intent_repo.find_by_registration(registration_id).await? {
                if record.status == IntentStatus::Created {
                    self.release(&record).await?;
                }
            }
        }

        self.ledger.delete_registration(registration_id, actor).await
    }

    /// Cancels every open intent on the camp, settling any that were paid.
    pub async fn release_camp_intents(&self, camp_id: Uuid) -> Result<()> {
        for record in self.intent_repo.list_open_for_camp(camp_id).await? {
            self.release(&record).await?;
        }
        Ok(())
    }

    async fn release(&self, record: &PaymentIntentRecord) -> Result<Released> {
        let gateway = self.gateway()?;
        let intent = self
            .call_gateway("cancel_intent", || gateway.cancel_intent(&record.gateway_intent_id))
            .await?;

        match intent.status {
            GatewayIntentStatus::Canceled => {
                self.intent_repo.mark_canceled(record.id).await?;
                tracing::info!(
                    "Intent {} for registration {} canceled",
                    record.gateway_intent_id, record.registration_id
                );
                Ok(Released::Canceled)
            }
            GatewayIntentStatus::Succeeded => {
                let charge = intent.confirmed_charge().ok_or_else(|| {
                    AppError::Internal("Succeeded intent without charge".to_string())
                })?;
                tracing::warn!(
                    "Intent {} was paid before it could be canceled; settling registration {}",
                    record.gateway_intent_id, record.registration_id
                );
                if self.recorded_receipt(record).await?.is_none() {
                    self.settle(record, charge).await?;
                }
                Ok(Released::Settled)
            }
            _ => Err(AppError::Conflict(format!(
                "Payment for registration {} is being processed",
                record.registration_id
            ))),
        }
    }

    /// The receipt already in the ledger for this intent's registration, if any.
    async fn recorded_receipt(&self, record: &PaymentIntentRecord) -> Result<Option<PaymentReceipt>> {
        let Some(payment) = self.payment_repo.find_by_registration(record.registration_id).await? else {
            return Ok(None);
        };

        if payment.transaction_id != record.gateway_intent_id {
            tracing::error!(
                "Registration {} was settled by {}, not by intent {}",
                record.registration_id, payment.transaction_id, record.gateway_intent_id
            );
            return Err(AppError::InvalidTransition(
                "Registration is already paid by another transaction".to_string(),
            ));
        }

        Ok(Some(PaymentReceipt {
            registration_id: payment.registration_id,
            transaction_id: payment.transaction_id,
            amount_cents: payment.amount_cents,
            currency: payment.currency,
            payment_method: payment.payment_method,
        }))
    }

    /// After a failed or timed-out confirm: the ledger first, then the
    /// gateway's view of the intent.
    async fn reconcile(&self, record: &PaymentIntentRecord) -> Result<Option<PaymentReceipt>> {
        if let Some(receipt) = self.recorded_receipt(record).await? {
            return Ok(Some(receipt));
        }

        let gateway = self.gateway()?;
        let intent = match tokio::time::timeout(
            self.config.gateway_timeout(),
            gateway.retrieve_intent(&record.gateway_intent_id),
        )
        .await
        {
            Ok(Ok(intent)) => intent,
            Ok(Err(e)) => {
                tracing::warn!("Could not re-query intent {}: {}", record.gateway_intent_id, e);
                return Ok(None);
            }
            Err(_) => {
                tracing::warn!("Re-query of intent {} timed out", record.gateway_intent_id);
                return Ok(None);
            }
        };

        match intent.status {
            GatewayIntentStatus::Succeeded => match intent.confirmed_charge() {
                Some(charge) => self.settle(record, charge).await.map(Some),
                None => Ok(None),
            },
            GatewayIntentStatus::Canceled => Err(AppError::Declined(
                "Payment intent was canceled".to_string(),
            )),
            _ => Ok(None),
        }
    }

    async fn settle(&self, record: &PaymentIntentRecord, charge: ConfirmedCharge) -> Result<PaymentReceipt> {
        if charge.amount_cents != record.amount_cents {
            tracing::error!(
                "Amount mismatch on intent {} for registration {}: expected {}, gateway confirmed {}",
                record.gateway_intent_id,
                record.registration_id,
                record.amount_cents,
                charge.amount_cents
            );
            return Err(AppError::AmountMismatch {
                expected_cents: record.amount_cents,
                confirmed_cents: charge.amount_cents,
            });
        }

        let receipt = PaymentReceipt {
            registration_id: record.registration_id,
            transaction_id: charge.transaction_id,
            amount_cents: charge.amount_cents,
            currency: charge.currency,
            payment_method: charge.payment_method,
        };

        self.ledger.mark_paid(record.registration_id, &receipt).await?;
        self.intent_repo.mark_succeeded(record.id).await?;

        Ok(receipt)
    }

    async fn call_gateway<T, F, Fut>(&self, operation: &str, mut call: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let timeout = self.config.gateway_timeout();
        let mut attempt = 0;

        loop {
            let outcome = tokio::time::timeout(timeout, call())
                .await
                .unwrap_or_else(|_| {
                    Err(AppError::Gateway(format!(
                        "{} timed out after {}s",
                        operation,
                        timeout.as_secs()
                    )))
                });

            match outcome {
                Err(e) if e.is_retryable() && attempt < self.config.max_retries => {
                    attempt += 1;
                    tracing::warn!("{} failed ({}); retry {} of {}", operation, e, attempt, self.config.max_retries);
                }
                other => return other,
            }
        }
    }

    fn ensure_payer(registration: &Registration, actor: &User) -> Result<()> {
        if registration.participant_email.eq_ignore_ascii_case(&actor.email) {
            Ok(())
        } else {
            Err(AppError::Forbidden(
                "Only the registered participant can pay for this registration".to_string(),
            ))
        }
    }
}
