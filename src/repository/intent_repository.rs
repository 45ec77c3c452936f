use async_trait::async_trait;
use chrono::{DateTime, Utc, NaiveDateTime};
use sqlx::{SqlitePool, FromRow};
use uuid::Uuid;

use crate::{
    domain::{IntentStatus, PaymentIntentRecord},
    error::{AppError, Result},
    repository::{parse_uuid, IntentRepository},
};

#[derive(FromRow)]
struct IntentRow {
    id: String,
    registration_id: String,
    gateway_intent_id: String,
    client_secret: String,
    amount_cents: i64,
    currency: String,
    status: String,
    created_at: NaiveDateTime,
    updated_at: NaiveDateTime,
}

const INTENT_COLUMNS: &str = r#"
    id, registration_id, gateway_intent_id, client_secret, amount_cents,
    currency, status, created_at, updated_at
"#;

pub struct SqliteIntentRepository {
    pool: SqlitePool,
}

impl SqliteIntentRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_record(row: IntentRow) -> Result<PaymentIntentRecord> {
        Ok(PaymentIntentRecord {
            id: parse_uuid(&row.id)?,
            registration_id: parse_uuid(&row.registration_id)?,
            gateway_intent_id: row.gateway_intent_id,
            client_secret: row.client_secret,
            amount_cents: row.amount_cents,
            currency: row.currency,
            status: IntentStatus::from_str(&row.status)
                .ok_or_else(|| AppError::Database(format!("Invalid intent status: {}", row.status)))?,
            created_at: DateTime::from_naive_utc_and_offset(row.created_at, Utc),
            updated_at: DateTime::from_naive_utc_and_offset(row.updated_at, Utc),
        })
    }

    async fn find_one(&self, column: &str, value: String) -> Result<Option<PaymentIntentRecord>> {
        let row = sqlx::query_as::<_, IntentRow>(&format!(
            "SELECT {} FROM payment_intents WHERE {} = ?",
            INTENT_COLUMNS, column
        ))
        .bind(value)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_record).transpose()
    }
}

#[async_trait]
impl IntentRepository for SqliteIntentRepository {
    async fn create_or_get(&self, record: PaymentIntentRecord) -> Result<PaymentIntentRecord> {
        let now = Utc::now().naive_utc();

        sqlx::query(
            r#"
            INSERT INTO payment_intents (
                id, registration_id, gateway_intent_id, client_secret,
                amount_cents, currency, status, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT (registration_id) DO NOTHING
            "#
        )
        .bind(record.id.to_string())
        .bind(record.registration_id.to_string())
        .bind(&record.gateway_intent_id)
        .bind(&record.client_secret)
        .bind(record.amount_cents)
        .bind(&record.currency)
        .bind(record.status.as_str())
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        self.find_by_registration(record.registration_id).await?.ok_or_else(|| {
            AppError::Database("Failed to retrieve payment intent".to_string())
        })
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<PaymentIntentRecord>> {
        self.find_one("id", id.to_string()).await
    }

    async fn find_by_registration(&self, registration_id: Uuid) -> Result<Option<PaymentIntentRecord>> {
        self.find_one("registration_id", registration_id.to_string()).await
    }

    async fn find_by_gateway_id(&self, gateway_intent_id: &str) -> Result<Option<PaymentIntentRecord>> {
        self.find_one("gateway_intent_id", gateway_intent_id.to_string()).await
    }

    async fn mark_succeeded(&self, id: Uuid) -> Result<()> {
        sqlx::query(
            "UPDATE payment_intents SET status = 'succeeded', updated_at = ? WHERE id = ?"
        )
        .bind(Utc::now().naive_utc())
        .bind(id.to_string())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn mark_canceled(&self, id: Uuid) -> Result<()> {
        sqlx::query(
            "UPDATE payment_intents SET status = 'canceled', updated_at = ? WHERE id = ? AND status = 'created'"
        )
        .bind(Utc::now().naive_utc())
        .bind(id.to_string())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn replace_canceled(&self, record: PaymentIntentRecord) -> Result<PaymentIntentRecord> {
        sqlx::query(
            r#"
            UPDATE payment_intents
            SET gateway_intent_id = ?, client_secret = ?, amount_cents = ?,
                currency = ?, status = 'created', updated_at = ?
            WHERE registration_id = ? AND status = 'canceled'
            "#
        )
        .bind(&record.gateway_intent_id)
        .bind(&record.client_secret)
        .bind(record.amount_cents)
        .bind(&record.currency)
        .bind(Utc::now().naive_utc())
        .bind(record.registration_id.to_string())
        .execute(&self.pool)
        .await?;

        self.find_by_registration(record.registration_id).await?.ok_or_else(|| {
            AppError::Database("Failed to retrieve payment intent".to_string())
        })
    }

    async fn list_open_for_camp(&self, camp_id: Uuid) -> Result<Vec<PaymentIntentRecord>> {
        let rows = sqlx::query_as::<_, IntentRow>(&format!(
            r#"
            SELECT {} FROM payment_intents
            WHERE status = 'created'
              AND registration_id IN (SELECT id FROM registrations WHERE camp_id = ?)
            ORDER BY created_at
            "#,
            INTENT_COLUMNS
        ))
        .bind(camp_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_record).collect()
    }
}
