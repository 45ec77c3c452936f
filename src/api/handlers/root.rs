use axum::{http::StatusCode, Json, response::IntoResponse};
use serde_json::json;

pub async fn root() -> impl IntoResponse {
    Json(json!({
        "name": "MedCamp API",
        "version": env!("CARGO_PKG_VERSION"),
        "description": "Registration and payment lifecycle for medical bootcamps",
        "status": "operational",
        "endpoints": {
            "health": "/health",
            "session": "/auth/session",
            "camps": "/api/camps",
            "registrations": "/api/registrations",
            "payments": "/api/payments",
            "stats": "/api/stats",
            "feedback": "/api/feedback"
        }
    }))
}

pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    })))
}
