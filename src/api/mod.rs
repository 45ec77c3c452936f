pub mod handlers;
pub mod middleware;
pub mod state;

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::{
    compression::CompressionLayer,
    cors::CorsLayer,
    trace::TraceLayer,
};
use std::sync::Arc;

use crate::{
    config::Settings,
    service::ServiceContext,
};
use state::AppState;

pub fn create_app(service_context: Arc<ServiceContext>, settings: Arc<Settings>) -> Router {
    let app_state = AppState::new(service_context, settings);

    Router::new()
        // Root and health endpoints
        .route("/", get(handlers::root::root))
        .route("/health", get(handlers::root::health_check))

        // Session exchange for identity-provider tokens
        .route(
            "/auth/session",
            post(handlers::auth::create_session).delete(handlers::auth::delete_session),
        )

        .nest("/api", api_routes(app_state.clone()))

        .with_state(app_state)

        // Middleware
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

fn api_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .nest("/camps", camp_routes(state.clone()))
        .nest("/registrations", registration_routes(state.clone()))
        .nest("/payments", payment_routes(state.clone()))
        .nest("/stats", stats_routes(state.clone()))
        .nest("/feedback", feedback_routes(state))
}

fn camp_routes(state: AppState) -> Router<AppState> {
    let public = Router::new()
        .route("/", get(handlers::camps::list))
        .route("/:id", get(handlers::camps::get));

    let organizer = Router::new()
        .route("/", post(handlers::camps::create))
        .route("/mine", get(handlers::camps::mine))
        .route(
            "/:id",
            axum::routing::put(handlers::camps::update).delete(handlers::camps::delete),
        )
        .route("/:id/registrations", get(handlers::camps::registrations))
        .route_layer(axum::middleware::from_fn_with_state(
            state,
            middleware::auth::require_organizer,
        ));

    public.merge(organizer)
}

fn registration_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/", post(handlers::registrations::create))
        .route("/mine", get(handlers::registrations::mine))
        .route(
            "/:id",
            get(handlers::registrations::get)
                .patch(handlers::registrations::update_status)
                .delete(handlers::registrations::delete),
        )
        .route_layer(axum::middleware::from_fn_with_state(
            state,
            middleware::auth::require_auth,
        ))
}

fn payment_routes(state: AppState) -> Router<AppState> {
    let protected = Router::new()
        .route("/intents", post(handlers::payments::create_intent))
        .route("/intents/:id/confirm", post(handlers::payments::confirm_intent))
        .route("/mine", get(handlers::payments::mine))
        .route_layer(axum::middleware::from_fn_with_state(
            state,
            middleware::auth::require_auth,
        ));

    // Gateway callback authenticates by signature, not session.
    Router::new()
        .route("/webhook", post(handlers::payments::webhook))
        .merge(protected)
}

fn stats_routes(state: AppState) -> Router<AppState> {
    let organizer = Router::new()
        .route("/camps/:id", get(handlers::stats::camp))
        .route("/organizer", get(handlers::stats::organizer))
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::require_organizer,
        ));

    Router::new()
        .route("/me", get(handlers::stats::me))
        .route_layer(axum::middleware::from_fn_with_state(
            state,
            middleware::auth::require_auth,
        ))
        .merge(organizer)
}

fn feedback_routes(state: AppState) -> Router<AppState> {
    let protected = Router::new()
        .route("/", post(handlers::feedback::create))
        .route_layer(axum::middleware::from_fn_with_state(
            state,
            middleware::auth::require_auth,
        ));

    Router::new()
        .route("/", get(handlers::feedback::list))
        .merge(protected)
}
