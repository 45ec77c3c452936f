use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Camp has already started: {0}")]
    ExpiredCamp(String),

    #[error("Camp is full: {0}")]
    CapacityExceeded(String),

    /// Integrity violation on the registration state machine. Never retried.
    #[error("Invalid transition: {0}")]
    InvalidTransition(String),

    /// Transient gateway failure; callers retry with the same idempotency key.
    #[error("Payment gateway error: {0}")]
    Gateway(String),

    #[error("Payment declined: {0}")]
    Declined(String),

    /// Confirmed amount differs from the intent. Requires manual reconciliation.
    #[error("Amount mismatch: expected {expected_cents}, gateway confirmed {confirmed_cents}")]
    AmountMismatch {
        expected_cents: i64,
        confirmed_cents: i64,
    },

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    /// Stable machine-readable discriminator used in error bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::Database(_) => "database",
            AppError::NotFound(_) => "not_found",
            AppError::Unauthorized => "unauthorized",
            AppError::Forbidden(_) => "forbidden",
            AppError::Validation(_) => "validation",
            AppError::Conflict(_) => "conflict",
            AppError::ExpiredCamp(_) => "expired_camp",
            AppError::CapacityExceeded(_) => "capacity_exceeded",
            AppError::InvalidTransition(_) => "invalid_transition",
            AppError::Gateway(_) => "gateway",
            AppError::Declined(_) => "declined",
            AppError::AmountMismatch { .. } => "amount_mismatch",
            AppError::Internal(_) => "internal",
        }
    }

    /// Whether retrying the same request with the same idempotency key may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AppError::Gateway(_))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let kind = self.kind();
        let (status, error_message) = match self {
            AppError::Database(ref msg) => {
                tracing::error!("Database error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Database error occurred".to_string())
            }
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "Unauthorized".to_string()),
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg),
            AppError::Validation(msg) => (StatusCode::UNPROCESSABLE_ENTITY, msg),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            AppError::ExpiredCamp(msg) => (StatusCode::CONFLICT, msg),
            AppError::CapacityExceeded(msg) => (StatusCode::CONFLICT, msg),
            AppError::InvalidTransition(msg) => (StatusCode::CONFLICT, msg),
            AppError::Gateway(ref msg) => {
                tracing::warn!("Payment gateway error: {}", msg);
                (StatusCode::BAD_GATEWAY, msg.clone())
            }
            AppError::Declined(msg) => (StatusCode::PAYMENT_REQUIRED, msg),
            err @ AppError::AmountMismatch { .. } => {
                (StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
            }
            AppError::Internal(ref msg) => {
                tracing::error!("Internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
            }
        };

        let body = Json(json!({
            "error": error_message,
            "kind": kind,
        }));

        (status, body).into_response()
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::Database(err.to_string())
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut fields: Vec<String> = errors
            .field_errors()
            .into_iter()
            .map(|(field, errs)| {
                let reason = errs
                    .iter()
                    .find_map(|e| e.message.as_ref().map(|m| m.to_string()))
                    .unwrap_or_else(|| "is invalid".to_string());
                format!("{} {}", field, reason)
            })
            .collect();
        fields.sort();
        AppError::Validation(fields.join("; "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integrity_errors_are_not_retryable() {
        assert!(!AppError::InvalidTransition("x".into()).is_retryable());
        assert!(!AppError::AmountMismatch { expected_cents: 1, confirmed_cents: 2 }.is_retryable());
        assert!(!AppError::Declined("card".into()).is_retryable());
        assert!(AppError::Gateway("timeout".into()).is_retryable());
    }

    #[test]
    fn status_codes() {
        let cases = [
            (AppError::Validation("age".into()), StatusCode::UNPROCESSABLE_ENTITY),
            (AppError::NotFound("camp".into()), StatusCode::NOT_FOUND),
            (AppError::ExpiredCamp("camp".into()), StatusCode::CONFLICT),
            (AppError::Forbidden("paid".into()), StatusCode::FORBIDDEN),
            (AppError::Declined("card".into()), StatusCode::PAYMENT_REQUIRED),
            (AppError::Gateway("down".into()), StatusCode::BAD_GATEWAY),
            (
                AppError::AmountMismatch { expected_cents: 100, confirmed_cents: 90 },
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (err, expected) in cases {
            assert_eq!(err.into_response().status(), expected);
        }
    }
}
