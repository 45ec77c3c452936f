use axum::{
    extract::{Extension, Path, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use crate::{
    api::{handlers::MessageResponse, middleware::auth::CurrentUser, state::AppState},
    domain::{CreateRegistrationRequest, Participant, Registration, UpdateRegistrationStatusRequest},
    error::Result,
};

pub async fn create(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Json(request): Json<CreateRegistrationRequest>,
) -> Result<(StatusCode, Json<Registration>)> {
    let participant = Participant {
        name: current.user.display_name.clone(),
        email: current.user.email.clone(),
    };

    let registration = state.service_context.ledger
        .create_registration(request.camp_id, participant, request.details)
        .await?;

    Ok((StatusCode::CREATED, Json(registration)))
}

pub async fn mine(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
) -> Result<Json<Vec<Registration>>> {
    let registrations = state.service_context.ledger
        .list_for_participant(&current.user.email)
        .await?;

    Ok(Json(registrations))
}

pub async fn get(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<Registration>> {
    let ledger = &state.service_context.ledger;
    let registration = ledger.get(id).await?;
    ledger.ensure_visible_to(&registration, &current.user).await?;

    Ok(Json(registration))
}

pub async fn update_status(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateRegistrationStatusRequest>,
) -> Result<Json<Registration>> {
    let ledger = &state.service_context.ledger;
    let registration = ledger.get(id).await?;
    ledger.ensure_visible_to(&registration, &current.user).await?;

    Ok(Json(ledger.transition(id, request.payment_status).await?))
}

pub async fn delete(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<MessageResponse>> {
    state.service_context.broker
        .withdraw_registration(id, &current.user)
        .await?;

    Ok(Json(MessageResponse::new("Registration deleted")))
}
