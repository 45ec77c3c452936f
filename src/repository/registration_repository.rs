use async_trait::async_trait;
use chrono::{DateTime, Utc, NaiveDateTime};
use sqlx::{SqlitePool, FromRow};
use uuid::Uuid;

use crate::{
    domain::{Gender, Payment, PaymentStatus, Registration},
    error::{AppError, Result},
    repository::{is_unique_violation, parse_uuid, RegistrationRepository},
};

#[derive(FromRow)]
struct RegistrationRow {
    id: String,
    camp_id: String,
    participant_name: String,
    participant_email: String,
    age: i32,
    phone: String,
    gender: String,
    emergency_contact: String,
    payment_status: String,
    payment_transaction_id: Option<String>,
    paid_at: Option<NaiveDateTime>,
    created_at: NaiveDateTime,
    updated_at: NaiveDateTime,
}

const REGISTRATION_COLUMNS: &str = r#"
    id, camp_id, participant_name, participant_email, age, phone, gender,
    emergency_contact, payment_status, payment_transaction_id, paid_at,
    created_at, updated_at
"#;

pub struct SqliteRegistrationRepository {
    pool: SqlitePool,
}

impl SqliteRegistrationRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_registration(row: RegistrationRow) -> Result<Registration> {
        Ok(Registration {
            id: parse_uuid(&row.id)?,
            camp_id: parse_uuid(&row.camp_id)?,
            participant_name: row.participant_name,
            participant_email: row.participant_email,
            age: row.age,
            phone: row.phone,
            gender: Gender::from_str(&row.gender)
                .ok_or_else(|| AppError::Database(format!("Invalid gender: {}", row.gender)))?,
            emergency_contact: row.emergency_contact,
            payment_status: PaymentStatus::from_str(&row.payment_status).ok_or_else(|| {
                AppError::Database(format!("Invalid payment status: {}", row.payment_status))
            })?,
            payment_transaction_id: row.payment_transaction_id,
            paid_at: row.paid_at.map(|dt| DateTime::from_naive_utc_and_offset(dt, Utc)),
            created_at: DateTime::from_naive_utc_and_offset(row.created_at, Utc),
            updated_at: DateTime::from_naive_utc_and_offset(row.updated_at, Utc),
        })
    }
}

#[async_trait]
impl RegistrationRepository for SqliteRegistrationRepository {
    async fn create_reserving_seat(
        &self,
        registration: Registration,
        now: DateTime<Utc>,
    ) -> Result<Option<Registration>> {
        let camp_id_str = registration.camp_id.to_string();
        let now_naive = now.naive_utc();
        let mut tx = self.pool.begin().await?;

        // Single guarded increment: never read-then-write the counter.
        let reserved = sqlx::query(
            r#"
            UPDATE camps
            SET participant_count = participant_count + 1
            WHERE id = ?
              AND scheduled_at > ?
              AND (capacity IS NULL OR participant_count < capacity)
            "#
        )
        .bind(&camp_id_str)
        .bind(now_naive)
        .execute(&mut *tx)
        .await?;

        if reserved.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(None);
        }

        let inserted = sqlx::query(
            r#"
            INSERT INTO registrations (
                id, camp_id, participant_name, participant_email, age, phone,
                gender, emergency_contact, payment_status, payment_transaction_id,
                paid_at, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, 'unpaid', NULL, NULL, ?, ?)
            "#
        )
        .bind(registration.id.to_string())
        .bind(&camp_id_str)
        .bind(&registration.participant_name)
        .bind(&registration.participant_email)
        .bind(registration.age)
        .bind(&registration.phone)
        .bind(registration.gender.as_str())
        .bind(&registration.emergency_contact)
        .bind(now_naive)
        .bind(now_naive)
        .execute(&mut *tx)
        .await;

        if let Err(e) = inserted {
            tx.rollback().await?;
            if is_unique_violation(&e) {
                return Err(AppError::Conflict(
                    "Participant is already registered for this camp".to_string(),
                ));
            }
            return Err(e.into());
        }

        tx.commit().await?;

        self.find_by_id(registration.id).await?.map(Some).ok_or_else(|| {
            AppError::Database("Failed to retrieve created registration".to_string())
        })
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Registration>> {
        let row = sqlx::query_as::<_, RegistrationRow>(
            &format!("SELECT {} FROM registrations WHERE id = ?", REGISTRATION_COLUMNS)
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_registration).transpose()
    }

    async fn list_by_participant(&self, email: &str) -> Result<Vec<Registration>> {
        let rows = sqlx::query_as::<_, RegistrationRow>(
            &format!(
                "SELECT {} FROM registrations WHERE participant_email = ? ORDER BY created_at DESC",
                REGISTRATION_COLUMNS
            )
        )
        .bind(email)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(Self::row_to_registration)
            .collect()
    }

    async fn list_by_camp(&self, camp_id: Uuid) -> Result<Vec<Registration>> {
        let rows = sqlx::query_as::<_, RegistrationRow>(
            &format!(
                "SELECT {} FROM registrations WHERE camp_id = ? ORDER BY created_at ASC",
                REGISTRATION_COLUMNS
            )
        )
        .bind(camp_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(Self::row_to_registration)
            .collect()
    }

    async fn mark_paid_with_receipt(&self, payment: &Payment) -> Result<bool> {
        let now = payment.created_at.naive_utc();
        let mut tx = self.pool.begin().await?;

        let swapped = sqlx::query(
            r#"
            UPDATE registrations
            SET payment_status = 'paid',
                payment_transaction_id = ?,
                paid_at = ?,
                updated_at = ?
            WHERE id = ? AND payment_status = 'unpaid'
            "#
        )
        .bind(&payment.transaction_id)
        .bind(now)
        .bind(now)
        .bind(payment.registration_id.to_string())
        .execute(&mut *tx)
        .await?;

        if swapped.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        let inserted = sqlx::query(
            r#"
            INSERT INTO payments (
                id, registration_id, camp_id, payer_email, amount_cents,
                currency, payment_method, transaction_id, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#
        )
        .bind(payment.id.to_string())
        .bind(payment.registration_id.to_string())
        .bind(payment.camp_id.to_string())
        .bind(&payment.payer_email)
        .bind(payment.amount_cents)
        .bind(&payment.currency)
        .bind(&payment.payment_method)
        .bind(&payment.transaction_id)
        .bind(now)
        .execute(&mut *tx)
        .await;

        if let Err(e) = inserted {
            tx.rollback().await?;
            if is_unique_violation(&e) {
                return Err(AppError::InvalidTransition(format!(
                    "Transaction {} is already recorded against another registration",
                    payment.transaction_id
                )));
            }
            return Err(e.into());
        }

        tx.commit().await?;
        Ok(true)
    }

    async fn delete_unpaid(&self, id: Uuid) -> Result<bool> {
        let mut tx = self.pool.begin().await?;

        let camp_id: Option<(String,)> = sqlx::query_as(
            r#"
            DELETE FROM registrations
            WHERE id = ? AND payment_status = 'unpaid'
              AND NOT EXISTS (
                  SELECT 1 FROM payment_intents
                  WHERE registration_id = registrations.id AND status = 'created'
              )
            RETURNING camp_id
            "#
        )
        .bind(id.to_string())
        .fetch_optional(&mut *tx)
        .await?;

        let Some((camp_id,)) = camp_id else {
            tx.rollback().await?;
            return Ok(false);
        };

        sqlx::query(
            "UPDATE camps SET participant_count = participant_count - 1 WHERE id = ? AND participant_count > 0"
        )
        .bind(&camp_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(true)
    }

    async fn count_for_camp(&self, camp_id: Uuid) -> Result<(i64, i64)> {
        let row: (i64, i64) = sqlx::query_as(
            r#"
            SELECT COUNT(*),
                   COALESCE(SUM(CASE WHEN payment_status = 'paid' THEN 1 ELSE 0 END), 0)
            FROM registrations
            WHERE camp_id = ?
            "#
        )
        .bind(camp_id.to_string())
        .fetch_one(&self.pool)
        .await?;

        Ok(row)
    }

    async fn counts_for_organizer(&self, organizer_email: &str) -> Result<Vec<(Uuid, String, i64, i64)>> {
        let rows: Vec<(String, String, i64, i64)> = sqlx::query_as(
            r#"
            SELECT c.id, c.name,
                   COUNT(r.id),
                   COALESCE(SUM(CASE WHEN r.payment_status = 'paid' THEN 1 ELSE 0 END), 0)
            FROM camps c
            LEFT JOIN registrations r ON r.camp_id = c.id
            WHERE c.created_by = ?
            GROUP BY c.id, c.name
            ORDER BY c.scheduled_at DESC
            "#
        )
        .bind(organizer_email)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|(id, name, total, paid)| Ok((parse_uuid(&id)?, name, total, paid)))
            .collect()
    }
}
