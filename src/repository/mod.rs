use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;
use crate::domain::*;
use crate::error::{AppError, Result};

pub mod camp_repository;
pub mod registration_repository;
pub mod payment_repository;
pub mod intent_repository;
pub mod user_repository;
pub mod feedback_repository;

pub use camp_repository::SqliteCampRepository;
pub use registration_repository::SqliteRegistrationRepository;
pub use payment_repository::SqlitePaymentRepository;
pub use intent_repository::SqliteIntentRepository;
pub use user_repository::SqliteUserRepository;
pub use feedback_repository::SqliteFeedbackRepository;

#[async_trait]
pub trait CampRepository: Send + Sync {
    async fn create(&self, camp: Camp) -> Result<Camp>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Camp>>;
    async fn list(&self, limit: i64, offset: i64) -> Result<Vec<Camp>>;
    async fn list_upcoming(&self, now: DateTime<Utc>, limit: i64) -> Result<Vec<Camp>>;
    async fn list_by_organizer(&self, organizer_email: &str) -> Result<Vec<Camp>>;
    /// Updates editable fields. Returns `None` if the new capacity would be
    /// below the current participant count.
    async fn update(&self, id: Uuid, camp: Camp) -> Result<Option<Camp>>;
    /// Deletes the camp together with its unpaid registrations. Returns
    /// `false` and changes nothing if any registration is paid or still has
    /// an open payment intent.
    async fn delete_if_no_paid_registrations(&self, id: Uuid) -> Result<bool>;
}

/// Storage for the registration ledger. Every method that touches more than
/// one row runs in a single transaction whose first statement is a write.
#[async_trait]
pub trait RegistrationRepository: Send + Sync {
    /// Atomically takes a seat on the camp and inserts the registration.
    /// Returns `None` when no seat could be taken (camp missing, started, or full).
    async fn create_reserving_seat(
        &self,
        registration: Registration,
        now: DateTime<Utc>,
    ) -> Result<Option<Registration>>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Registration>>;
    async fn list_by_participant(&self, email: &str) -> Result<Vec<Registration>>;
    async fn list_by_camp(&self, camp_id: Uuid) -> Result<Vec<Registration>>;
    /// Compare-and-swap `unpaid -> paid` plus receipt insert. Returns `false`
    /// if the registration was no longer unpaid.
    async fn mark_paid_with_receipt(&self, payment: &Payment) -> Result<bool>;
    /// Deletes an unpaid registration and releases its seat. Returns `false`
    /// if nothing was deleted, including when an intent for it is still open.
    async fn delete_unpaid(&self, id: Uuid) -> Result<bool>;
    /// `(total, paid)` registration counts for one camp.
    async fn count_for_camp(&self, camp_id: Uuid) -> Result<(i64, i64)>;
    /// `(camp_id, camp_name, total, paid)` for every camp an organizer owns.
    async fn counts_for_organizer(&self, organizer_email: &str) -> Result<Vec<(Uuid, String, i64, i64)>>;
}

#[async_trait]
pub trait PaymentRepository: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Payment>>;
    async fn find_by_transaction_id(&self, transaction_id: &str) -> Result<Option<Payment>>;
    async fn find_by_registration(&self, registration_id: Uuid) -> Result<Option<Payment>>;
    async fn list_by_payer(&self, email: &str) -> Result<Vec<Payment>>;
}

#[async_trait]
pub trait IntentRepository: Send + Sync {
    /// Inserts the record unless the registration already has one; returns
    /// whichever record is stored afterwards.
    async fn create_or_get(&self, record: PaymentIntentRecord) -> Result<PaymentIntentRecord>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<PaymentIntentRecord>>;
    async fn find_by_registration(&self, registration_id: Uuid) -> Result<Option<PaymentIntentRecord>>;
    async fn find_by_gateway_id(&self, gateway_intent_id: &str) -> Result<Option<PaymentIntentRecord>>;
    async fn mark_succeeded(&self, id: Uuid) -> Result<()>;
    async fn mark_canceled(&self, id: Uuid) -> Result<()>;
    /// Points a canceled record at a freshly staged gateway intent. Returns
    /// whichever record is stored afterwards.
    async fn replace_canceled(&self, record: PaymentIntentRecord) -> Result<PaymentIntentRecord>;
    /// Intents still in `created` for registrations on the camp.
    async fn list_open_for_camp(&self, camp_id: Uuid) -> Result<Vec<PaymentIntentRecord>>;
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Inserts or refreshes a user. An existing organizer is never demoted.
    async fn upsert(&self, email: &str, display_name: &str, role: Role) -> Result<User>;
    async fn find_by_email(&self, email: &str) -> Result<Option<User>>;
}

#[async_trait]
pub trait FeedbackRepository: Send + Sync {
    async fn create(&self, feedback: Feedback) -> Result<Feedback>;
    async fn list_recent(&self, limit: i64) -> Result<Vec<Feedback>>;
    async fn list_by_camp(&self, camp_id: Uuid) -> Result<Vec<Feedback>>;
}

pub(crate) fn parse_uuid(s: &str) -> Result<Uuid> {
    Uuid::parse_str(s).map_err(|e| AppError::Database(e.to_string()))
}

pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.is_unique_violation(),
        _ => false,
    }
}
