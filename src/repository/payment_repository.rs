use async_trait::async_trait;
use chrono::{DateTime, Utc, NaiveDateTime};
use sqlx::{SqlitePool, FromRow};
use uuid::Uuid;

use crate::{
    domain::Payment,
    error::Result,
    repository::{parse_uuid, PaymentRepository},
};

#[derive(FromRow)]
struct PaymentRow {
    id: String,
    registration_id: String,
    camp_id: String,
    payer_email: String,
    amount_cents: i64,
    currency: String,
    payment_method: String,
    transaction_id: String,
    created_at: NaiveDateTime,
}

/// Read side of the receipts table. Receipts are only ever written by the
/// ledger, in the same transaction that flips the registration to paid.
pub struct SqlitePaymentRepository {
    pool: SqlitePool,
}

impl SqlitePaymentRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_payment(row: PaymentRow) -> Result<Payment> {
        Ok(Payment {
            id: parse_uuid(&row.id)?,
            registration_id: parse_uuid(&row.registration_id)?,
            camp_id: parse_uuid(&row.camp_id)?,
            payer_email: row.payer_email,
            amount_cents: row.amount_cents,
            currency: row.currency,
            payment_method: row.payment_method,
            transaction_id: row.transaction_id,
            created_at: DateTime::from_naive_utc_and_offset(row.created_at, Utc),
        })
    }

    async fn find_one(&self, column: &str, value: String) -> Result<Option<Payment>> {
        let row = sqlx::query_as::<_, PaymentRow>(&format!(
            r#"
            SELECT id, registration_id, camp_id, payer_email, amount_cents,
                   currency, payment_method, transaction_id, created_at
            FROM payments
            WHERE {} = ?
            "#,
            column
        ))
        .bind(value)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_payment).transpose()
    }
}

#[async_trait]
impl PaymentRepository for SqlitePaymentRepository {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Payment>> {
        self.find_one("id", id.to_string()).await
    }

    async fn find_by_transaction_id(&self, transaction_id: &str) -> Result<Option<Payment>> {
        self.find_one("transaction_id", transaction_id.to_string()).await
    }

    async fn find_by_registration(&self, registration_id: Uuid) -> Result<Option<Payment>> {
        self.find_one("registration_id", registration_id.to_string()).await
    }

    async fn list_by_payer(&self, email: &str) -> Result<Vec<Payment>> {
        let rows = sqlx::query_as::<_, PaymentRow>(
            r#"
            SELECT id, registration_id, camp_id, payer_email, amount_cents,
                   currency, payment_method, transaction_id, created_at
            FROM payments
            WHERE payer_email = ?
            ORDER BY created_at DESC
            "#
        )
        .bind(email)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(Self::row_to_payment)
            .collect()
    }
}
