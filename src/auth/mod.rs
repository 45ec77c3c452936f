use std::sync::Arc;

use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

use crate::{
    config::AuthConfig,
    domain::{Role, User},
    error::{AppError, Result},
    repository::UserRepository,
};

pub mod session;

use session::{Session, SessionStore};

/// Claims carried by the identity provider's token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityClaims {
    pub sub: String,
    pub email: String,
    #[serde(default)]
    pub name: Option<String>,
    pub exp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,
}

pub struct AuthService {
    session_store: SessionStore,
    user_repo: Arc<dyn UserRepository>,
    config: AuthConfig,
}

impl AuthService {
    pub fn new(pool: SqlitePool, user_repo: Arc<dyn UserRepository>, config: AuthConfig) -> Self {
        Self {
            session_store: SessionStore::new(pool),
            user_repo,
            config,
        }
    }

    pub fn verify_identity_token(&self, token: &str) -> Result<IdentityClaims> {
        let mut validation = Validation::new(Algorithm::HS256);
        if let Some(issuer) = &self.config.identity_issuer {
            validation.set_issuer(&[issuer]);
        }

        let data = jsonwebtoken::decode::<IdentityClaims>(
            token,
            &DecodingKey::from_secret(self.config.identity_secret.as_bytes()),
            &validation,
        )
        .map_err(|e| {
            tracing::debug!("Rejected identity token: {}", e);
            AppError::Unauthorized
        })?;

        Ok(data.claims)
    }

    /// Exchanges a verified identity token for a server-side session.
    pub async fn establish_session(&self, identity_token: &str) -> Result<(User, Session, String)> {
        let claims = self.verify_identity_token(identity_token)?;
        let email = claims.email.trim().to_lowercase();
        if email.is_empty() {
            return Err(AppError::Unauthorized);
        }

        let role = if self.config.is_organizer_email(&email) {
            Role::Organizer
        } else {
            Role::Participant
        };
        let display_name = claims
            .name
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| email.clone());

        let user = self.user_repo.upsert(&email, &display_name, role).await?;
        let (session, token) = self
            .create_session(&user.email, self.config.session_duration_hours)
            .await?;

        tracing::info!("Session established for {} ({})", user.email, user.role.as_str());
        Ok((user, session, token))
    }

    pub async fn create_session(&self, user_email: &str, duration_hours: i64) -> Result<(Session, String)> {
        let token = generate_token();
        let expires_at = Utc::now() + Duration::hours(duration_hours);

        let session = self.session_store
            .create(user_email, &token, expires_at)
            .await?;

        Ok((session, token))
    }

    /// Resolves a bearer token to its user, or `None` if the session is
    /// unknown or expired.
    pub async fn authenticate(&self, token: &str) -> Result<Option<User>> {
        let Some(session) = self.session_store.find_by_token(token).await? else {
            return Ok(None);
        };
        self.user_repo.find_by_email(&session.user_email).await
    }

    pub async fn invalidate_session(&self, token: &str) -> Result<()> {
        self.session_store.delete_by_token(token).await
    }

    pub async fn cleanup_expired_sessions(&self) -> Result<u64> {
        self.session_store.cleanup_expired().await
    }
}

/// Signs identity claims with a shared secret. Used by the seed tool and
/// tests to stand in for the identity provider.
pub fn sign_identity_token(secret: &str, claims: &IdentityClaims) -> Result<String> {
    jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(format!("Failed to sign identity token: {}", e)))
}

fn generate_token() -> String {
    use rand::RngCore;
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}
