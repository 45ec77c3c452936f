use axum::{
    extract::{Extension, Path, State},
    Json,
};
use uuid::Uuid;

use crate::{
    api::{middleware::auth::CurrentUser, state::AppState},
    domain::{CampStats, OrganizerOverview, ParticipantSummary},
    error::Result,
};

pub async fn camp(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<CampStats>> {
    let ctx = &state.service_context;
    ctx.camp_service.owned_camp(id, &current.user).await?;

    Ok(Json(ctx.reporter.camp_stats(id).await?))
}

pub async fn organizer(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
) -> Result<Json<OrganizerOverview>> {
    let overview = state.service_context.reporter
        .organizer_overview(&current.user.email)
        .await?;

    Ok(Json(overview))
}

pub async fn me(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
) -> Result<Json<ParticipantSummary>> {
    let summary = state.service_context.reporter
        .participant_summary(&current.user.email)
        .await?;

    Ok(Json(summary))
}
