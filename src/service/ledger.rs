use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;
use validator::Validate;

use crate::{
    domain::*,
    error::{AppError, Result},
    repository::{CampRepository, PaymentRepository, RegistrationRepository},
};

/// Owns registration records and the only state machine in the system:
/// `unpaid -> paid`, with `paid` terminal.
pub struct RegistrationLedger {
    registration_repo: Arc<dyn RegistrationRepository>,
    camp_repo: Arc<dyn CampRepository>,
    payment_repo: Arc<dyn PaymentRepository>,
}

impl RegistrationLedger {
    pub fn new(
        registration_repo: Arc<dyn RegistrationRepository>,
        camp_repo: Arc<dyn CampRepository>,
        payment_repo: Arc<dyn PaymentRepository>,
    ) -> Self {
        Self {
            registration_repo,
            camp_repo,
            payment_repo,
        }
    }

    pub async fn create_registration(
        &self,
        camp_id: Uuid,
        participant: Participant,
        details: RegistrationDetails,
    ) -> Result<Registration> {
        participant.validate()?;
        let details = details.normalized();
        details.validate()?;

        let camp = self.find_camp(camp_id).await?;
        let now = Utc::now();
        Self::ensure_accepting(&camp, now)?;

        let registration = Registration {
            id: Uuid::new_v4(),
            camp_id,
            participant_name: participant.name.trim().to_string(),
            participant_email: participant.email.trim().to_lowercase(),
            age: details.age,
            phone: details.phone,
            gender: details.gender,
            emergency_contact: details.emergency_contact,
            payment_status: PaymentStatus::Unpaid,
            payment_transaction_id: None,
            paid_at: None,
            created_at: now,
            updated_at: now,
        };

        match self.registration_repo.create_reserving_seat(registration, now).await? {
            Some(created) => {
                tracing::info!(
                    "Registration {} created for camp {} by {}",
                    created.id, camp_id, created.participant_email
                );
                Ok(created)
            }
            None => {
                // Lost a race for the last seat, or the camp changed under us.
                let camp = self.find_camp(camp_id).await?;
                Self::ensure_accepting(&camp, now)?;
                Err(AppError::CapacityExceeded(camp.name))
            }
        }
    }

    /// Records a confirmed payment. Repeating the call with the same
    /// transaction id returns the already-paid registration.
    pub async fn mark_paid(&self, registration_id: Uuid, receipt: &PaymentReceipt) -> Result<Registration> {
        if receipt.registration_id != registration_id {
            return Err(AppError::Validation(format!(
                "Receipt belongs to registration {}, not {}",
                receipt.registration_id, registration_id
            )));
        }

        let registration = self.get(registration_id).await?;
        if registration.is_paid() {
            return self.already_paid(registration, &receipt.transaction_id);
        }

        if let Some(existing) = self
            .payment_repo
            .find_by_transaction_id(&receipt.transaction_id)
            .await?
        {
            if existing.registration_id == registration_id {
                let current = self.get(registration_id).await?;
                return self.already_paid(current, &receipt.transaction_id);
            }
            tracing::error!(
                "Transaction {} already settled registration {}; refusing to apply it to {}",
                receipt.transaction_id, existing.registration_id, registration_id
            );
            return Err(AppError::InvalidTransition(format!(
                "Transaction {} is already recorded",
                receipt.transaction_id
            )));
        }

        let payment = Payment {
            id: Uuid::new_v4(),
            registration_id,
            camp_id: registration.camp_id,
            payer_email: registration.participant_email.clone(),
            amount_cents: receipt.amount_cents,
            currency: receipt.currency.clone(),
            payment_method: receipt.payment_method.clone(),
            transaction_id: receipt.transaction_id.clone(),
            created_at: Utc::now(),
        };

        if !self.registration_repo.mark_paid_with_receipt(&payment).await? {
            // Someone else settled it between our read and the swap.
            let current = self.get(registration_id).await?;
            return self.already_paid(current, &receipt.transaction_id);
        }

        tracing::info!(
            "Registration {} marked paid (transaction {}, {} {})",
            registration_id,
            payment.transaction_id,
            payment.amount(),
            payment.currency
        );

        self.get(registration_id).await
    }

    /// Status change requested directly by a client. Only no-ops succeed:
    /// `paid` is reachable solely through [`Self::mark_paid`].
    pub async fn transition(&self, registration_id: Uuid, target: PaymentStatus) -> Result<Registration> {
        let registration = self.get(registration_id).await?;

        match (registration.payment_status, target) {
            (current, target) if current == target => Ok(registration),
            (PaymentStatus::Paid, PaymentStatus::Unpaid) => {
                tracing::error!(
                    "Rejected attempt to move paid registration {} back to unpaid",
                    registration_id
                );
                Err(AppError::InvalidTransition(
                    "A paid registration cannot become unpaid".to_string(),
                ))
            }
            _ => Err(AppError::Forbidden(
                "Registrations become paid only through a confirmed payment".to_string(),
            )),
        }
    }

    /// Removes an unpaid registration and frees its seat. Storage refuses
    /// while a payment intent for it is open; see
    /// `PaymentIntentBroker::withdraw_registration`.
    pub async fn delete_registration(&self, registration_id: Uuid, actor: &User) -> Result<()> {
        let registration = self.get(registration_id).await?;

        if registration.is_paid() {
            return Err(AppError::Forbidden(
                "Paid registrations cannot be deleted".to_string(),
            ));
        }
        self.ensure_visible_to(&registration, actor).await?;

        if !self.registration_repo.delete_unpaid(registration_id).await? {
            return match self.registration_repo.find_by_id(registration_id).await? {
                Some(r) if r.is_paid() => Err(AppError::Forbidden(
                    "Paid registrations cannot be deleted".to_string(),
                )),
                Some(_) => Err(AppError::Conflict(
                    "Registration has a payment in progress; cancel it first".to_string(),
                )),
                None => Err(AppError::NotFound("Registration not found".to_string())),
            };
        }

        tracing::info!(
            "Registration {} deleted by {}; seat released on camp {}",
            registration_id, actor.email, registration.camp_id
        );
        Ok(())
    }

    pub async fn get(&self, registration_id: Uuid) -> Result<Registration> {
        self.registration_repo
            .find_by_id(registration_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Registration not found".to_string()))
    }

    pub async fn list_for_participant(&self, email: &str) -> Result<Vec<Registration>> {
        self.registration_repo.list_by_participant(&email.to_lowercase()).await
    }

    pub async fn list_for_camp(&self, camp_id: Uuid) -> Result<Vec<Registration>> {
        self.registration_repo.list_by_camp(camp_id).await
    }

    /// A registration is visible to its participant and to the organizer
    /// who owns the camp.
    pub async fn ensure_visible_to(&self, registration: &Registration, actor: &User) -> Result<()> {
        if registration.participant_email.eq_ignore_ascii_case(&actor.email) {
            return Ok(());
        }

        if actor.is_organizer() {
            let camp = self.camp_repo.find_by_id(registration.camp_id).await?;
            if camp.is_some_and(|c| c.created_by.eq_ignore_ascii_case(&actor.email)) {
                return Ok(());
            }
        }

        Err(AppError::Forbidden(
            "Not allowed to access this registration".to_string(),
        ))
    }

    fn already_paid(&self, registration: Registration, transaction_id: &str) -> Result<Registration> {
        if registration.payment_transaction_id.as_deref() == Some(transaction_id) {
            return Ok(registration);
        }

        tracing::error!(
            "Registration {} is already paid by {:?}; rejecting second transaction {}",
            registration.id, registration.payment_transaction_id, transaction_id
        );
        Err(AppError::InvalidTransition(format!(
            "Registration {} is already paid",
            registration.id
        )))
    }

    async fn find_camp(&self, camp_id: Uuid) -> Result<Camp> {
        self.camp_repo
            .find_by_id(camp_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Camp not found".to_string()))
    }

    fn ensure_accepting(camp: &Camp, now: chrono::DateTime<Utc>) -> Result<()> {
        if !camp.is_open_at(now) {
            return Err(AppError::ExpiredCamp(camp.name.clone()));
        }
        if camp.is_full() {
            return Err(AppError::CapacityExceeded(camp.name.clone()));
        }
        Ok(())
    }
}
