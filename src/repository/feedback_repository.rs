use async_trait::async_trait;
use chrono::{DateTime, Utc, NaiveDateTime};
use sqlx::{SqlitePool, FromRow};
use uuid::Uuid;

use crate::{
    domain::Feedback,
    error::{AppError, Result},
    repository::{parse_uuid, FeedbackRepository},
};

#[derive(FromRow)]
struct FeedbackRow {
    id: String,
    camp_id: String,
    participant_name: String,
    participant_email: String,
    rating: i32,
    comment: Option<String>,
    created_at: NaiveDateTime,
}

pub struct SqliteFeedbackRepository {
    pool: SqlitePool,
}

impl SqliteFeedbackRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_feedback(row: FeedbackRow) -> Result<Feedback> {
        Ok(Feedback {
            id: parse_uuid(&row.id)?,
            camp_id: parse_uuid(&row.camp_id)?,
            participant_name: row.participant_name,
            participant_email: row.participant_email,
            rating: row.rating,
            comment: row.comment,
            created_at: DateTime::from_naive_utc_and_offset(row.created_at, Utc),
        })
    }
}

#[async_trait]
impl FeedbackRepository for SqliteFeedbackRepository {
    async fn create(&self, feedback: Feedback) -> Result<Feedback> {
        sqlx::query(
            r#"
            INSERT INTO feedback (
                id, camp_id, participant_name, participant_email,
                rating, comment, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?)
            "#
        )
        .bind(feedback.id.to_string())
        .bind(feedback.camp_id.to_string())
        .bind(&feedback.participant_name)
        .bind(&feedback.participant_email)
        .bind(feedback.rating)
        .bind(&feedback.comment)
        .bind(feedback.created_at.naive_utc())
        .execute(&self.pool)
        .await?;

        let row = sqlx::query_as::<_, FeedbackRow>(
            r#"
            SELECT id, camp_id, participant_name, participant_email, rating, comment, created_at
            FROM feedback
            WHERE id = ?
            "#
        )
        .bind(feedback.id.to_string())
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::Database("Failed to retrieve created feedback".to_string()))?;

        Self::row_to_feedback(row)
    }

    async fn list_recent(&self, limit: i64) -> Result<Vec<Feedback>> {
        let rows = sqlx::query_as::<_, FeedbackRow>(
            r#"
            SELECT id, camp_id, participant_name, participant_email, rating, comment, created_at
            FROM feedback
            ORDER BY created_at DESC
            LIMIT ?
            "#
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(Self::row_to_feedback)
            .collect()
    }

    async fn list_by_camp(&self, camp_id: Uuid) -> Result<Vec<Feedback>> {
        let rows = sqlx::query_as::<_, FeedbackRow>(
            r#"
            SELECT id, camp_id, participant_name, participant_email, rating, comment, created_at
            FROM feedback
            WHERE camp_id = ?
            ORDER BY created_at DESC
            "#
        )
        .bind(camp_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(Self::row_to_feedback)
            .collect()
    }
}
