use async_trait::async_trait;
use chrono::{DateTime, Utc, NaiveDateTime};
use sqlx::{SqlitePool, FromRow};
use uuid::Uuid;

use crate::{
    domain::Camp,
    error::{AppError, Result},
    repository::{parse_uuid, CampRepository},
};

#[derive(FromRow)]
struct CampRow {
    id: String,
    name: String,
    fee_cents: i64,
    capacity: Option<i64>,
    participant_count: i64,
    scheduled_at: NaiveDateTime,
    location: String,
    healthcare_professional: String,
    description: String,
    image_url: Option<String>,
    created_by: String,
    created_at: NaiveDateTime,
    updated_at: NaiveDateTime,
}

const CAMP_COLUMNS: &str = r#"
    id, name, fee_cents, capacity, participant_count, scheduled_at,
    location, healthcare_professional, description, image_url,
    created_by, created_at, updated_at
"#;

pub struct SqliteCampRepository {
    pool: SqlitePool,
}

impl SqliteCampRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_camp(row: CampRow) -> Result<Camp> {
        Ok(Camp {
            id: parse_uuid(&row.id)?,
            name: row.name,
            fee_cents: row.fee_cents,
            capacity: row.capacity,
            participant_count: row.participant_count,
            scheduled_at: DateTime::from_naive_utc_and_offset(row.scheduled_at, Utc),
            location: row.location,
            healthcare_professional: row.healthcare_professional,
            description: row.description,
            image_url: row.image_url,
            created_by: row.created_by,
            created_at: DateTime::from_naive_utc_and_offset(row.created_at, Utc),
            updated_at: DateTime::from_naive_utc_and_offset(row.updated_at, Utc),
        })
    }
}

#[async_trait]
impl CampRepository for SqliteCampRepository {
    async fn create(&self, camp: Camp) -> Result<Camp> {
        let now = Utc::now().naive_utc();

        sqlx::query(
            r#"
            INSERT INTO camps (
                id, name, fee_cents, capacity, participant_count, scheduled_at,
                location, healthcare_professional, description, image_url,
                created_by, created_at, updated_at
            ) VALUES (?, ?, ?, ?, 0, ?, ?, ?, ?, ?, ?, ?, ?)
            "#
        )
        .bind(camp.id.to_string())
        .bind(&camp.name)
        .bind(camp.fee_cents)
        .bind(camp.capacity)
        .bind(camp.scheduled_at.naive_utc())
        .bind(&camp.location)
        .bind(&camp.healthcare_professional)
        .bind(&camp.description)
        .bind(&camp.image_url)
        .bind(&camp.created_by)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        self.find_by_id(camp.id).await?.ok_or_else(|| {
            AppError::Database("Failed to retrieve created camp".to_string())
        })
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Camp>> {
        let row = sqlx::query_as::<_, CampRow>(
            &format!("SELECT {} FROM camps WHERE id = ?", CAMP_COLUMNS)
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_camp).transpose()
    }

    async fn list(&self, limit: i64, offset: i64) -> Result<Vec<Camp>> {
        let rows = sqlx::query_as::<_, CampRow>(
            &format!(
                "SELECT {} FROM camps ORDER BY scheduled_at DESC LIMIT ? OFFSET ?",
                CAMP_COLUMNS
            )
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(Self::row_to_camp)
            .collect()
    }

    async fn list_upcoming(&self, now: DateTime<Utc>, limit: i64) -> Result<Vec<Camp>> {
        let rows = sqlx::query_as::<_, CampRow>(
            &format!(
                "SELECT {} FROM camps WHERE scheduled_at > ? ORDER BY scheduled_at ASC LIMIT ?",
                CAMP_COLUMNS
            )
        )
        .bind(now.naive_utc())
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(Self::row_to_camp)
            .collect()
    }

    async fn list_by_organizer(&self, organizer_email: &str) -> Result<Vec<Camp>> {
        let rows = sqlx::query_as::<_, CampRow>(
            &format!(
                "SELECT {} FROM camps WHERE created_by = ? ORDER BY scheduled_at DESC",
                CAMP_COLUMNS
            )
        )
        .bind(organizer_email)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(Self::row_to_camp)
            .collect()
    }

    async fn update(&self, id: Uuid, camp: Camp) -> Result<Option<Camp>> {
        let now = Utc::now().naive_utc();

        // The capacity guard is evaluated against the live counter.
        let result = sqlx::query(
            r#"
            UPDATE camps
            SET name = ?, fee_cents = ?, capacity = ?, scheduled_at = ?,
                location = ?, healthcare_professional = ?, description = ?,
                image_url = ?, updated_at = ?
            WHERE id = ? AND (? IS NULL OR participant_count <= ?)
            "#
        )
        .bind(&camp.name)
        .bind(camp.fee_cents)
        .bind(camp.capacity)
        .bind(camp.scheduled_at.naive_utc())
        .bind(&camp.location)
        .bind(&camp.healthcare_professional)
        .bind(&camp.description)
        .bind(&camp.image_url)
        .bind(now)
        .bind(id.to_string())
        .bind(camp.capacity)
        .bind(camp.capacity)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }

        self.find_by_id(id).await
    }

    async fn delete_if_no_paid_registrations(&self, id: Uuid) -> Result<bool> {
        let id_str = id.to_string();
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            DELETE FROM registrations
            WHERE camp_id = ? AND payment_status = 'unpaid'
              AND NOT EXISTS (
                  SELECT 1 FROM payment_intents
                  WHERE registration_id = registrations.id AND status = 'created'
              )
            "#
        )
        .bind(&id_str)
        .execute(&mut *tx)
        .await?;

        let (remaining,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM registrations WHERE camp_id = ?"
        )
        .bind(&id_str)
        .fetch_one(&mut *tx)
        .await?;

        if remaining > 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        sqlx::query("DELETE FROM feedback WHERE camp_id = ?")
            .bind(&id_str)
            .execute(&mut *tx)
            .await?;

        sqlx::query("DELETE FROM camps WHERE id = ?")
            .bind(&id_str)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(true)
    }
}
