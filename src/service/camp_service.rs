use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;
use validator::Validate;

use crate::{
    domain::*,
    error::{AppError, Result},
    repository::CampRepository,
    service::broker::PaymentIntentBroker,
};

pub struct CampService {
    repo: Arc<dyn CampRepository>,
    broker: Arc<PaymentIntentBroker>,
}

impl CampService {
    pub fn new(repo: Arc<dyn CampRepository>, broker: Arc<PaymentIntentBroker>) -> Self {
        Self { repo, broker }
    }

    pub async fn create_camp(&self, organizer: &User, request: CreateCampRequest) -> Result<Camp> {
        Self::ensure_organizer(organizer)?;
        request.validate()?;

        let now = Utc::now();
        if request.scheduled_at <= now {
            return Err(AppError::Validation(
                "scheduled_at must be in the future".to_string(),
            ));
        }

        let camp = Camp {
            id: Uuid::new_v4(),
            name: request.name.trim().to_string(),
            fee_cents: to_minor_units(request.fee)?,
            capacity: request.capacity,
            participant_count: 0,
            scheduled_at: request.scheduled_at,
            location: request.location,
            healthcare_professional: request.healthcare_professional,
            description: request.description,
            image_url: request.image_url,
            created_by: organizer.email.clone(),
            created_at: now,
            updated_at: now,
        };

        let camp = self.repo.create(camp).await?;
        tracing::info!("Camp {} ({}) created by {}", camp.id, camp.name, organizer.email);
        Ok(camp)
    }

    pub async fn get_camp(&self, id: Uuid) -> Result<Camp> {
        self.repo
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Camp not found".to_string()))
    }

    /// Upcoming camps first, then past ones.
    pub async fn list_camps(&self, limit: i64) -> Result<Vec<Camp>> {
        let now = Utc::now();
        let mut camps = self.repo.list_upcoming(now, limit).await?;
        if (camps.len() as i64) < limit {
            let past = self.repo.list(limit, 0).await?;
            camps.extend(
                past.into_iter()
                    .filter(|c| !c.is_open_at(now))
                    .take((limit as usize).saturating_sub(camps.len())),
            );
        }
        Ok(camps)
    }

    pub async fn list_for_organizer(&self, organizer: &User) -> Result<Vec<Camp>> {
        Self::ensure_organizer(organizer)?;
        self.repo.list_by_organizer(&organizer.email).await
    }

    pub async fn update_camp(&self, id: Uuid, actor: &User, request: UpdateCampRequest) -> Result<Camp> {
        request.check()?;
        let mut camp = self.owned_camp(id, actor).await?;

        if let Some(name) = request.name {
            camp.name = name.trim().to_string();
        }
        if let Some(fee) = request.fee {
            let fee_cents = to_minor_units(fee)?;
            if fee_cents != camp.fee_cents {
                // Staged intents carry the old amount.
                self.broker.release_camp_intents(id).await?;
                camp.fee_cents = fee_cents;
            }
        }
        if let Some(capacity) = request.capacity {
            camp.capacity = capacity;
        }
        if let Some(scheduled_at) = request.scheduled_at {
            camp.scheduled_at = scheduled_at;
        }
        if let Some(location) = request.location {
            camp.location = location;
        }
        if let Some(professional) = request.healthcare_professional {
            camp.healthcare_professional = professional;
        }
        if let Some(description) = request.description {
            camp.description = description;
        }
        if request.image_url.is_some() {
            camp.image_url = request.image_url;
        }

        let updated = self.repo.update(id, camp).await?.ok_or_else(|| {
            AppError::Conflict(
                "Capacity cannot be lower than the number of registered participants".to_string(),
            )
        })?;

        tracing::info!("Camp {} updated by {}", id, actor.email);
        Ok(updated)
    }

    pub async fn delete_camp(&self, id: Uuid, actor: &User) -> Result<()> {
        self.owned_camp(id, actor).await?;
        self.broker.release_camp_intents(id).await?;

        if !self.repo.delete_if_no_paid_registrations(id).await? {
            return Err(AppError::Conflict(
                "Camp has paid registrations or payments in progress and cannot be deleted"
                    .to_string(),
            ));
        }

        tracing::info!("Camp {} deleted by {}", id, actor.email);
        Ok(())
    }

    /// Returns the camp if `actor` is the organizer who created it.
    pub async fn owned_camp(&self, id: Uuid, actor: &User) -> Result<Camp> {
        Self::ensure_organizer(actor)?;
        let camp = self.get_camp(id).await?;
        if !camp.created_by.eq_ignore_ascii_case(&actor.email) {
            return Err(AppError::Forbidden(
                "Only the organizer who created this camp can manage it".to_string(),
            ));
        }
        Ok(camp)
    }

    fn ensure_organizer(user: &User) -> Result<()> {
        if user.is_organizer() {
            Ok(())
        } else {
            Err(AppError::Forbidden("Organizer role required".to_string()))
        }
    }
}
