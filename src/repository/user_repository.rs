use async_trait::async_trait;
use chrono::{DateTime, Utc, NaiveDateTime};
use sqlx::{SqlitePool, FromRow};

use crate::{
    domain::{Role, User},
    error::{AppError, Result},
    repository::UserRepository,
};

#[derive(FromRow)]
struct UserRow {
    email: String,
    display_name: String,
    role: String,
    created_at: NaiveDateTime,
    last_login_at: NaiveDateTime,
}

pub struct SqliteUserRepository {
    pool: SqlitePool,
}

impl SqliteUserRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_user(row: UserRow) -> Result<User> {
        Ok(User {
            role: Role::from_str(&row.role)
                .ok_or_else(|| AppError::Database(format!("Invalid role: {}", row.role)))?,
            email: row.email,
            display_name: row.display_name,
            created_at: DateTime::from_naive_utc_and_offset(row.created_at, Utc),
            last_login_at: DateTime::from_naive_utc_and_offset(row.last_login_at, Utc),
        })
    }
}

#[async_trait]
impl UserRepository for SqliteUserRepository {
    async fn upsert(&self, email: &str, display_name: &str, role: Role) -> Result<User> {
        let now = Utc::now().naive_utc();

        sqlx::query(
            r#"
            INSERT INTO users (email, display_name, role, created_at, last_login_at)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT (email) DO UPDATE SET
                display_name = excluded.display_name,
                role = CASE WHEN users.role = 'organizer' THEN 'organizer' ELSE excluded.role END,
                last_login_at = excluded.last_login_at
            "#
        )
        .bind(email)
        .bind(display_name)
        .bind(role.as_str())
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        self.find_by_email(email).await?.ok_or_else(|| {
            AppError::Database("Failed to retrieve user".to_string())
        })
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT email, display_name, role, created_at, last_login_at
            FROM users
            WHERE email = ?
            "#
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_user).transpose()
    }
}
