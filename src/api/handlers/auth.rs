use axum::{
    extract::State,
    http::StatusCode,
    Json,
};
use axum_extra::{
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    api::{handlers::MessageResponse, state::AppState},
    domain::User,
    error::Result,
};

#[derive(Debug, Deserialize)]
pub struct SessionRequest {
    /// Token issued by the identity provider after sign-in.
    pub id_token: String,
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub user: User,
}

pub async fn create_session(
    State(state): State<AppState>,
    Json(req): Json<SessionRequest>,
) -> Result<(StatusCode, Json<SessionResponse>)> {
    let (user, session, token) = state.service_context.auth_service
        .establish_session(&req.id_token)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(SessionResponse {
            token,
            expires_at: session.expires_at,
            user,
        }),
    ))
}

pub async fn delete_session(
    State(state): State<AppState>,
    TypedHeader(Authorization(bearer)): TypedHeader<Authorization<Bearer>>,
) -> Result<Json<MessageResponse>> {
    state.service_context.auth_service
        .invalidate_session(bearer.token())
        .await?;

    Ok(Json(MessageResponse::new("Signed out")))
}
