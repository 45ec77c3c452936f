use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use axum_extra::{
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};

use crate::{
    api::state::AppState,
    domain::User,
    error::AppError,
};

#[derive(Clone)]
pub struct CurrentUser {
    pub user: User,
}

async fn authenticate(
    state: &AppState,
    header: Option<TypedHeader<Authorization<Bearer>>>,
) -> Result<User, AppError> {
    let TypedHeader(Authorization(bearer)) = header.ok_or(AppError::Unauthorized)?;

    state
        .service_context
        .auth_service
        .authenticate(bearer.token())
        .await?
        .ok_or(AppError::Unauthorized)
}

pub async fn require_auth(
    State(state): State<AppState>,
    header: Option<TypedHeader<Authorization<Bearer>>>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let user = authenticate(&state, header).await?;

    request.extensions_mut().insert(CurrentUser { user });

    Ok(next.run(request).await)
}

pub async fn require_organizer(
    State(state): State<AppState>,
    header: Option<TypedHeader<Authorization<Bearer>>>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let user = authenticate(&state, header).await?;

    if !user.is_organizer() {
        return Err(AppError::Forbidden("Organizer role required".to_string()));
    }

    request.extensions_mut().insert(CurrentUser { user });

    Ok(next.run(request).await)
}
