use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    api::{handlers::MessageResponse, middleware::auth::CurrentUser, state::AppState},
    domain::{Camp, CreateCampRequest, Registration, UpdateCampRequest},
    error::Result,
};

#[derive(Debug, Deserialize)]
pub struct ListParams {
    #[serde(default = "default_limit")]
    limit: i64,
}

fn default_limit() -> i64 {
    50
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CampDto {
    pub id: Uuid,
    pub name: String,
    /// Major units.
    pub fee: f64,
    pub fee_cents: i64,
    pub capacity: Option<i64>,
    pub participant_count: i64,
    pub seats_remaining: Option<i64>,
    pub scheduled_at: DateTime<Utc>,
    pub location: String,
    pub healthcare_professional: String,
    pub description: String,
    pub image_url: Option<String>,
    pub created_by: String,
    pub open_for_registration: bool,
}

impl From<Camp> for CampDto {
    fn from(camp: Camp) -> Self {
        Self {
            fee: camp.fee(),
            seats_remaining: camp.seats_remaining(),
            open_for_registration: camp.is_open_at(Utc::now()) && !camp.is_full(),
            id: camp.id,
            name: camp.name,
            fee_cents: camp.fee_cents,
            capacity: camp.capacity,
            participant_count: camp.participant_count,
            scheduled_at: camp.scheduled_at,
            location: camp.location,
            healthcare_professional: camp.healthcare_professional,
            description: camp.description,
            image_url: camp.image_url,
            created_by: camp.created_by,
        }
    }
}

pub async fn list(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Json<Vec<CampDto>>> {
    let camps = state.service_context.camp_service
        .list_camps(params.limit.clamp(1, 200))
        .await?;

    Ok(Json(camps.into_iter().map(Into::into).collect()))
}

pub async fn get(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<CampDto>> {
    let camp = state.service_context.camp_service.get_camp(id).await?;
    Ok(Json(camp.into()))
}

pub async fn create(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Json(request): Json<CreateCampRequest>,
) -> Result<(StatusCode, Json<CampDto>)> {
    let camp = state.service_context.camp_service
        .create_camp(&current.user, request)
        .await?;

    Ok((StatusCode::CREATED, Json(camp.into())))
}

pub async fn update(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateCampRequest>,
) -> Result<Json<CampDto>> {
    let camp = state.service_context.camp_service
        .update_camp(id, &current.user, request)
        .await?;

    Ok(Json(camp.into()))
}

pub async fn delete(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<MessageResponse>> {
    state.service_context.camp_service
        .delete_camp(id, &current.user)
        .await?;

    Ok(Json(MessageResponse::new("Camp deleted")))
}

pub async fn mine(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
) -> Result<Json<Vec<CampDto>>> {
    let camps = state.service_context.camp_service
        .list_for_organizer(&current.user)
        .await?;

    Ok(Json(camps.into_iter().map(Into::into).collect()))
}

pub async fn registrations(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<Registration>>> {
    let ctx = &state.service_context;
    ctx.camp_service.owned_camp(id, &current.user).await?;

    Ok(Json(ctx.ledger.list_for_camp(id).await?))
}
