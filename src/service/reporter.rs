use std::{collections::HashMap, sync::Arc};

use chrono::Utc;
use uuid::Uuid;

use crate::{
    domain::*,
    error::{AppError, Result},
    repository::{CampRepository, RegistrationRepository},
};

/// Read-only aggregates over the ledger. Nothing is cached between requests.
pub struct ReconciliationReporter {
    registration_repo: Arc<dyn RegistrationRepository>,
    camp_repo: Arc<dyn CampRepository>,
}

impl ReconciliationReporter {
    pub fn new(
        registration_repo: Arc<dyn RegistrationRepository>,
        camp_repo: Arc<dyn CampRepository>,
    ) -> Self {
        Self {
            registration_repo,
            camp_repo,
        }
    }

    pub async fn camp_stats(&self, camp_id: Uuid) -> Result<CampStats> {
        let camp = self
            .camp_repo
            .find_by_id(camp_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Camp not found".to_string()))?;

        let (total, paid) = self.registration_repo.count_for_camp(camp_id).await?;
        Ok(CampStats::new(camp.id, camp.name, total, paid))
    }

    pub async fn organizer_overview(&self, organizer_email: &str) -> Result<OrganizerOverview> {
        let camps: Vec<CampStats> = self
            .registration_repo
            .counts_for_organizer(organizer_email)
            .await?
            .into_iter()
            .map(|(id, name, total, paid)| CampStats::new(id, name, total, paid))
            .collect();

        let total = camps.iter().map(|c| c.total_registrations).sum::<i64>();
        let paid = camps.iter().map(|c| c.paid_registrations).sum::<i64>();

        Ok(OrganizerOverview {
            organizer_email: organizer_email.to_string(),
            camps,
            total_registrations: total,
            paid_registrations: paid,
            unpaid_registrations: total - paid,
        })
    }

    pub async fn participant_summary(&self, email: &str) -> Result<ParticipantSummary> {
        let registrations = self
            .registration_repo
            .list_by_participant(&email.to_lowercase())
            .await?;

        let mut camps: HashMap<Uuid, Camp> = HashMap::new();
        for registration in &registrations {
            if camps.contains_key(&registration.camp_id) {
                continue;
            }
            if let Some(camp) = self.camp_repo.find_by_id(registration.camp_id).await? {
                camps.insert(camp.id, camp);
            }
        }

        let now = Utc::now();
        let mut entries = Vec::with_capacity(registrations.len());
        for registration in &registrations {
            // Registrations always reference an existing camp; the FK cascades.
            let Some(camp) = camps.get(&registration.camp_id) else {
                continue;
            };
            entries.push(ParticipantCampEntry {
                camp_id: camp.id,
                camp_name: camp.name.clone(),
                scheduled_at: camp.scheduled_at,
                registration_id: registration.id,
                payment_status: registration.payment_status,
                fee_cents: camp.fee_cents,
            });
        }
        entries.sort_by_key(|e| e.scheduled_at);

        let total = entries.len() as i64;
        let paid = entries
            .iter()
            .filter(|e| e.payment_status == PaymentStatus::Paid)
            .count() as i64;
        let upcoming = entries.iter().filter(|e| e.scheduled_at > now).count() as i64;

        Ok(ParticipantSummary {
            participant_email: email.to_lowercase(),
            total_registrations: total,
            paid_registrations: paid,
            unpaid_registrations: total - paid,
            upcoming_registrations: upcoming,
            camps: entries,
        })
    }
}
