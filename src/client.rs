//! Typed HTTP client for the lifecycle API, as used by a UI or another service.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::{de::DeserializeOwned, Deserialize};
use uuid::Uuid;

use crate::{
    domain::{
        CampStats, ConfirmIntentRequest, CreateIntentRequest, CreateRegistrationRequest,
        IntentHandle, PaymentReceipt, Registration,
    },
    error::{AppError, Result},
};

/// Supplies the bearer token for each request. Lets callers refresh or
/// swap sessions without the client holding ambient state.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    async fn token(&self) -> Result<String>;
}

/// A fixed session token.
pub struct StaticToken(pub String);

#[async_trait]
impl TokenProvider for StaticToken {
    async fn token(&self) -> Result<String> {
        Ok(self.0.clone())
    }
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
    kind: String,
}

pub struct LifecycleClient {
    http: reqwest::Client,
    base_url: String,
    tokens: Arc<dyn TokenProvider>,
    confirm_retries: u32,
}

impl LifecycleClient {
    pub fn new(base_url: impl Into<String>, tokens: Arc<dyn TokenProvider>) -> Result<Self> {
        Self::with_timeout(base_url, tokens, Duration::from_secs(30))
    }

    pub fn with_timeout(
        base_url: impl Into<String>,
        tokens: Arc<dyn TokenProvider>,
        timeout: Duration,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            tokens,
            confirm_retries: 2,
        })
    }

    pub async fn submit_registration(&self, request: &CreateRegistrationRequest) -> Result<Registration> {
        let req = self.request(Method::POST, "/api/registrations").await?.json(request);
        self.send(req).await
    }

    pub async fn get_registration(&self, registration_id: Uuid) -> Result<Registration> {
        let req = self
            .request(Method::GET, &format!("/api/registrations/{}", registration_id))
            .await?;
        self.send(req).await
    }

    pub async fn initiate_payment(&self, registration_id: Uuid) -> Result<IntentHandle> {
        let req = self
            .request(Method::POST, "/api/payments/intents")
            .await?
            .json(&CreateIntentRequest { registration_id });
        self.send(req).await
    }

    /// Confirms a payment. A timed-out attempt is never blindly resent: the
    /// registration is re-read first and only an unpaid one is retried.
    pub async fn confirm_payment(&self, handle: &IntentHandle, payment_method: &str) -> Result<PaymentReceipt> {
        let body = ConfirmIntentRequest {
            payment_method: payment_method.to_string(),
        };
        let path = format!("/api/payments/intents/{}/confirm", handle.intent_id);
        let mut attempt = 0;

        loop {
            let req = self.request(Method::POST, &path).await?.json(&body);
            let err = match self.send::<PaymentReceipt>(req).await {
                Ok(receipt) => return Ok(receipt),
                Err(e) if !e.is_retryable() => return Err(e),
                Err(e) => e,
            };

            tracing::warn!("Confirming intent {} failed: {}; re-checking registration", handle.intent_id, err);

            let registration = self.get_registration(handle.registration_id).await?;
            if registration.is_paid() {
                return self.receipt_for(handle.registration_id).await;
            }

            if attempt >= self.confirm_retries {
                return Err(err);
            }
            attempt += 1;
        }
    }

    pub async fn payment_history(&self) -> Result<Vec<PaymentReceipt>> {
        let req = self.request(Method::GET, "/api/payments/mine").await?;
        self.send(req).await
    }

    pub async fn delete_registration(&self, registration_id: Uuid) -> Result<()> {
        let req = self
            .request(Method::DELETE, &format!("/api/registrations/{}", registration_id))
            .await?;
        self.send::<serde_json::Value>(req).await.map(|_| ())
    }

    pub async fn view_camp_stats(&self, camp_id: Uuid) -> Result<CampStats> {
        let req = self
            .request(Method::GET, &format!("/api/stats/camps/{}", camp_id))
            .await?;
        self.send(req).await
    }

    async fn receipt_for(&self, registration_id: Uuid) -> Result<PaymentReceipt> {
        self.payment_history()
            .await?
            .into_iter()
            .find(|r| r.registration_id == registration_id)
            .ok_or_else(|| AppError::NotFound("Payment receipt not found".to_string()))
    }

    async fn request(&self, method: Method, path: &str) -> Result<RequestBuilder> {
        let token = self.tokens.token().await?;
        Ok(self
            .http
            .request(method, format!("{}{}", self.base_url, path))
            .bearer_auth(token))
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        let response = request.send().await.map_err(transport_error)?;
        let status = response.status();

        if status.is_success() {
            return response.json::<T>().await.map_err(transport_error);
        }

        let body = response.json::<ErrorBody>().await.ok();
        Err(error_from_response(status, body))
    }
}

fn transport_error(err: reqwest::Error) -> AppError {
    if err.is_timeout() || err.is_connect() {
        AppError::Gateway(format!("Request failed: {}", err))
    } else {
        AppError::Internal(format!("Request failed: {}", err))
    }
}

fn error_from_response(status: StatusCode, body: Option<ErrorBody>) -> AppError {
    let Some(ErrorBody { error, kind }) = body else {
        return match status {
            StatusCode::UNAUTHORIZED => AppError::Unauthorized,
            StatusCode::NOT_FOUND => AppError::NotFound(status.to_string()),
            s if s.is_server_error() => AppError::Gateway(s.to_string()),
            s => AppError::Internal(s.to_string()),
        };
    };

    match kind.as_str() {
        "not_found" => AppError::NotFound(error),
        "unauthorized" => AppError::Unauthorized,
        "forbidden" => AppError::Forbidden(error),
        "validation" => AppError::Validation(error),
        "conflict" => AppError::Conflict(error),
        "expired_camp" => AppError::ExpiredCamp(error),
        "capacity_exceeded" => AppError::CapacityExceeded(error),
        "invalid_transition" => AppError::InvalidTransition(error),
        "gateway" => AppError::Gateway(error),
        "declined" => AppError::Declined(error),
        // The server body carries only the rendered message.
        "amount_mismatch" => AppError::Internal(error),
        "database" => AppError::Database(error),
        _ => AppError::Internal(error),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_kinds_round_trip() {
        let body = |kind: &str| {
            Some(ErrorBody {
                error: "x".to_string(),
                kind: kind.to_string(),
            })
        };

        assert!(matches!(
            error_from_response(StatusCode::CONFLICT, body("expired_camp")),
            AppError::ExpiredCamp(_)
        ));
        assert!(matches!(
            error_from_response(StatusCode::PAYMENT_REQUIRED, body("declined")),
            AppError::Declined(_)
        ));
        assert!(error_from_response(StatusCode::BAD_GATEWAY, body("gateway")).is_retryable());
    }

    #[test]
    fn bodiless_errors_fall_back_to_status() {
        assert!(matches!(
            error_from_response(StatusCode::UNAUTHORIZED, None),
            AppError::Unauthorized
        ));
        assert!(error_from_response(StatusCode::SERVICE_UNAVAILABLE, None).is_retryable());
    }
}
