use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::registration::PaymentStatus;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CampStats {
    pub camp_id: Uuid,
    pub camp_name: String,
    pub total_registrations: i64,
    pub paid_registrations: i64,
    pub unpaid_registrations: i64,
}

impl CampStats {
    /// Derives the unpaid count so `unpaid == total - paid` always holds.
    pub fn new(camp_id: Uuid, camp_name: String, total: i64, paid: i64) -> Self {
        Self {
            camp_id,
            camp_name,
            total_registrations: total,
            paid_registrations: paid,
            unpaid_registrations: total - paid,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OrganizerOverview {
    pub organizer_email: String,
    pub camps: Vec<CampStats>,
    pub total_registrations: i64,
    pub paid_registrations: i64,
    pub unpaid_registrations: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ParticipantCampEntry {
    pub camp_id: Uuid,
    pub camp_name: String,
    pub scheduled_at: DateTime<Utc>,
    pub registration_id: Uuid,
    pub payment_status: PaymentStatus,
    pub fee_cents: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ParticipantSummary {
    pub participant_email: String,
    pub total_registrations: i64,
    pub paid_registrations: i64,
    pub unpaid_registrations: i64,
    /// Registrations still ahead of their camp start time.
    pub upcoming_registrations: i64,
    pub camps: Vec<ParticipantCampEntry>,
}
