use axum::{
    extract::{Extension, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    api::{middleware::auth::CurrentUser, state::AppState},
    domain::{CreateFeedbackRequest, Feedback},
    error::Result,
};

#[derive(Debug, Deserialize)]
pub struct ListParams {
    camp_id: Option<Uuid>,
    #[serde(default = "default_limit")]
    limit: i64,
}

fn default_limit() -> i64 {
    20
}

pub async fn list(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Json<Vec<Feedback>>> {
    let service = &state.service_context.feedback_service;
    let feedback = match params.camp_id {
        Some(camp_id) => service.list_for_camp(camp_id).await?,
        None => service.list_recent(params.limit).await?,
    };

    Ok(Json(feedback))
}

pub async fn create(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Json(request): Json<CreateFeedbackRequest>,
) -> Result<(StatusCode, Json<Feedback>)> {
    let feedback = state.service_context.feedback_service
        .submit(&current.user, request)
        .await?;

    Ok((StatusCode::CREATED, Json(feedback)))
}
