use axum::{
    extract::{Extension, Path, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    api::{handlers::MessageResponse, middleware::auth::CurrentUser, state::AppState},
    domain::{ConfirmIntentRequest, CreateIntentRequest, IntentHandle, Payment, PaymentReceipt},
    error::{AppError, Result},
    repository::PaymentRepository,
};

#[derive(Debug, Serialize, Deserialize)]
pub struct ReceiptDto {
    pub registration_id: Uuid,
    pub transaction_id: String,
    /// Major units.
    pub amount: f64,
    pub amount_cents: i64,
    pub currency: String,
    pub payment_method: String,
}

impl From<PaymentReceipt> for ReceiptDto {
    fn from(receipt: PaymentReceipt) -> Self {
        Self {
            amount: receipt.amount(),
            registration_id: receipt.registration_id,
            transaction_id: receipt.transaction_id,
            amount_cents: receipt.amount_cents,
            currency: receipt.currency,
            payment_method: receipt.payment_method,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PaymentDto {
    id: Uuid,
    registration_id: Uuid,
    camp_id: Uuid,
    amount: f64,
    amount_cents: i64,
    currency: String,
    payment_method: String,
    transaction_id: String,
    created_at: DateTime<Utc>,
}

impl From<Payment> for PaymentDto {
    fn from(payment: Payment) -> Self {
        Self {
            amount: payment.amount(),
            id: payment.id,
            registration_id: payment.registration_id,
            camp_id: payment.camp_id,
            amount_cents: payment.amount_cents,
            currency: payment.currency,
            payment_method: payment.payment_method,
            transaction_id: payment.transaction_id,
            created_at: payment.created_at,
        }
    }
}

pub async fn create_intent(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Json(request): Json<CreateIntentRequest>,
) -> Result<(StatusCode, Json<IntentHandle>)> {
    let handle = state.service_context.broker
        .create_intent(request.registration_id, &current.user)
        .await?;

    Ok((StatusCode::CREATED, Json(handle)))
}

pub async fn confirm_intent(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
    Json(request): Json<ConfirmIntentRequest>,
) -> Result<Json<ReceiptDto>> {
    let receipt = state.service_context.broker
        .confirm_intent(id, &request.payment_method, &current.user)
        .await?;

    Ok(Json(receipt.into()))
}

pub async fn mine(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
) -> Result<Json<Vec<PaymentDto>>> {
    let payments = state.service_context.payment_repo
        .list_by_payer(&current.user.email)
        .await?;

    Ok(Json(payments.into_iter().map(Into::into).collect()))
}

pub async fn webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: String,
) -> Result<Json<MessageResponse>> {
    let signature = headers
        .get("stripe-signature")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::Validation("Missing Stripe-Signature header".to_string()))?;

    let message = match state.service_context.broker.handle_webhook(&body, signature).await? {
        Some(receipt) => format!("Registration {} settled", receipt.registration_id),
        None => "Event ignored".to_string(),
    };

    Ok(Json(MessageResponse::new(message)))
}
