use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::camp::from_minor_units;

/// Immutable receipt of a confirmed charge.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Payment {
    pub id: Uuid,
    pub registration_id: Uuid,
    pub camp_id: Uuid,
    pub payer_email: String,
    pub amount_cents: i64,
    pub currency: String,
    pub payment_method: String,
    pub transaction_id: String,
    pub created_at: DateTime<Utc>,
}

impl Payment {
    pub fn amount(&self) -> f64 {
        from_minor_units(self.amount_cents)
    }
}

/// What the gateway hands back after a successful confirmation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PaymentReceipt {
    pub registration_id: Uuid,
    pub transaction_id: String,
    pub amount_cents: i64,
    pub currency: String,
    pub payment_method: String,
}

impl PaymentReceipt {
    pub fn amount(&self) -> f64 {
        from_minor_units(self.amount_cents)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum IntentStatus {
    Created,
    Succeeded,
    Canceled,
}

impl IntentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            IntentStatus::Created => "created",
            IntentStatus::Succeeded => "succeeded",
            IntentStatus::Canceled => "canceled",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "created" => Some(IntentStatus::Created),
            "succeeded" => Some(IntentStatus::Succeeded),
            "canceled" => Some(IntentStatus::Canceled),
            _ => None,
        }
    }
}

/// Locally persisted view of a gateway-side staged charge.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PaymentIntentRecord {
    pub id: Uuid,
    pub registration_id: Uuid,
    pub gateway_intent_id: String,
    pub client_secret: String,
    pub amount_cents: i64,
    pub currency: String,
    pub status: IntentStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Returned to the participant so the charge can be completed client-side.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IntentHandle {
    pub intent_id: Uuid,
    pub registration_id: Uuid,
    pub client_secret: String,
    pub amount_cents: i64,
    pub currency: String,
}

impl From<&PaymentIntentRecord> for IntentHandle {
    fn from(record: &PaymentIntentRecord) -> Self {
        Self {
            intent_id: record.id,
            registration_id: record.registration_id,
            client_secret: record.client_secret.clone(),
            amount_cents: record.amount_cents,
            currency: record.currency.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateIntentRequest {
    pub registration_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfirmIntentRequest {
    /// Gateway payment-method token; forwarded, never stored.
    pub payment_method: String,
}
