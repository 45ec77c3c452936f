#![allow(dead_code)]

use std::{str::FromStr, sync::Arc};

use chrono::{Duration, Utc};
use medcamp::{
    config::Settings,
    domain::{Camp, CreateCampRequest, Gender, Participant, RegistrationDetails, Role, User},
    payments::{FakeGateway, PaymentGateway},
    repository::{CampRepository, SqliteCampRepository},
    service::ServiceContext,
};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions},
    SqlitePool,
};
use uuid::Uuid;

pub const WEBHOOK_SECRET: &str = "whsec_test";
pub const IDENTITY_SECRET: &str = "identity-test-secret";
pub const ORGANIZER_EMAIL: &str = "lead@medcamp.test";

/// Single connection so every query sees the same in-memory database.
pub async fn memory_pool() -> anyhow::Result<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await?;
    sqlx::migrate!("./migrations").run(&pool).await?;
    Ok(pool)
}

/// File-backed pool for tests that need real concurrent connections.
pub async fn file_pool(max_connections: u32) -> anyhow::Result<SqlitePool> {
    let path = std::env::temp_dir().join(format!("medcamp-test-{}.db", Uuid::new_v4()));
    let options = SqliteConnectOptions::from_str(&format!("sqlite://{}", path.display()))?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(std::time::Duration::from_secs(30));
    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .connect_with(options)
        .await?;
    sqlx::migrate!("./migrations").run(&pool).await?;
    Ok(pool)
}

pub fn test_settings() -> Settings {
    let mut settings = Settings::default();
    settings.auth.identity_secret = IDENTITY_SECRET.to_string();
    settings.auth.organizer_emails = vec![ORGANIZER_EMAIL.to_string()];
    settings.payments.gateway_timeout_secs = 1;
    settings.payments.max_retries = 2;
    settings
}

pub struct TestEnv {
    pub ctx: Arc<ServiceContext>,
    pub gateway: Arc<FakeGateway>,
    pub organizer: User,
    pub participant: User,
    pub pool: SqlitePool,
}

impl TestEnv {
    pub async fn new() -> anyhow::Result<Self> {
        Self::with_pool(memory_pool().await?).await
    }

    pub async fn with_pool(pool: SqlitePool) -> anyhow::Result<Self> {
        let gateway = Arc::new(FakeGateway::new(WEBHOOK_SECRET));
        let dyn_gateway: Arc<dyn PaymentGateway> = gateway.clone();
        let ctx = Arc::new(ServiceContext::new(pool.clone(), Some(dyn_gateway), &test_settings()));

        let organizer = ctx
            .user_repo
            .upsert(ORGANIZER_EMAIL, "Dr. Organizer", Role::Organizer)
            .await?;
        let participant = ctx
            .user_repo
            .upsert("nadia@example.com", "Nadia Islam", Role::Participant)
            .await?;

        Ok(Self {
            ctx,
            gateway,
            organizer,
            participant,
            pool,
        })
    }

    pub async fn user(&self, email: &str) -> anyhow::Result<User> {
        Ok(self.ctx.user_repo.upsert(email, email, Role::Participant).await?)
    }

    pub async fn camp(&self, fee: f64, capacity: Option<i64>) -> anyhow::Result<Camp> {
        Ok(self
            .ctx
            .camp_service
            .create_camp(&self.organizer, camp_request(fee, capacity))
            .await?)
    }

    /// Inserts a camp that has already started, bypassing the service check.
    pub async fn past_camp(&self) -> anyhow::Result<Camp> {
        let repo = SqliteCampRepository::new(self.pool.clone());
        let now = Utc::now();
        Ok(repo
            .create(Camp {
                id: Uuid::new_v4(),
                name: "Last Week's Camp".to_string(),
                fee_cents: 50_000,
                capacity: Some(10),
                participant_count: 0,
                scheduled_at: now - Duration::days(7),
                location: "Sylhet".to_string(),
                healthcare_professional: "Dr. Past".to_string(),
                description: "Already happened".to_string(),
                image_url: None,
                created_by: ORGANIZER_EMAIL.to_string(),
                created_at: now,
                updated_at: now,
            })
            .await?)
    }
}

pub fn camp_request(fee: f64, capacity: Option<i64>) -> CreateCampRequest {
    CreateCampRequest {
        name: "Emergency Medicine Bootcamp".to_string(),
        fee,
        capacity,
        scheduled_at: Utc::now() + Duration::days(10),
        location: "Dhaka Medical College".to_string(),
        healthcare_professional: "Dr. Karim".to_string(),
        description: "Two days of hands-on trauma care".to_string(),
        image_url: None,
    }
}

pub fn participant_of(user: &User) -> Participant {
    Participant {
        name: user.display_name.clone(),
        email: user.email.clone(),
    }
}

pub fn details() -> RegistrationDetails {
    RegistrationDetails {
        age: 27,
        phone: "+8801711000000".to_string(),
        gender: Gender::Female,
        emergency_contact: "Rahim Islam, +8801811000000".to_string(),
    }
}
