use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Unpaid,
    Paid,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Unpaid => "unpaid",
            PaymentStatus::Paid => "paid",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "unpaid" => Some(PaymentStatus::Unpaid),
            "paid" => Some(PaymentStatus::Paid),
            _ => None,
        }
    }

    /// `paid` is terminal; self-transitions are no-ops.
    pub fn can_transition_to(&self, next: PaymentStatus) -> bool {
        matches!(
            (self, next),
            (PaymentStatus::Unpaid, _) | (PaymentStatus::Paid, PaymentStatus::Paid)
        )
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Gender {
    Male,
    Female,
    Other,
}

impl Gender {
    pub fn as_str(&self) -> &'static str {
        match self {
            Gender::Male => "Male",
            Gender::Female => "Female",
            Gender::Other => "Other",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "Male" => Some(Gender::Male),
            "Female" => Some(Gender::Female),
            "Other" => Some(Gender::Other),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Registration {
    pub id: Uuid,
    pub camp_id: Uuid,
    pub participant_name: String,
    pub participant_email: String,
    pub age: i32,
    pub phone: String,
    pub gender: Gender,
    pub emergency_contact: String,
    pub payment_status: PaymentStatus,
    pub payment_transaction_id: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Registration {
    pub fn is_paid(&self) -> bool {
        self.payment_status == PaymentStatus::Paid
    }
}

/// Who is registering. Comes from the authenticated session, never the form.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct Participant {
    #[validate(length(min = 1, message = "is required"))]
    pub name: String,
    #[validate(email(message = "must be a valid email address"))]
    pub email: String,
}

/// Participant-supplied part of the registration form.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct RegistrationDetails {
    #[validate(range(min = 1, max = 150, message = "must be between 1 and 150"))]
    pub age: i32,
    #[validate(length(min = 1, max = 40, message = "is required"))]
    pub phone: String,
    pub gender: Gender,
    #[validate(length(min = 1, max = 200, message = "is required"))]
    pub emergency_contact: String,
}

impl RegistrationDetails {
    /// Trims free-text fields so whitespace-only input fails validation.
    pub fn normalized(self) -> Self {
        Self {
            phone: self.phone.trim().to_string(),
            emergency_contact: self.emergency_contact.trim().to_string(),
            ..self
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateRegistrationRequest {
    pub camp_id: Uuid,
    #[serde(flatten)]
    pub details: RegistrationDetails,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateRegistrationStatusRequest {
    pub payment_status: PaymentStatus,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paid_is_terminal() {
        assert!(PaymentStatus::Unpaid.can_transition_to(PaymentStatus::Paid));
        assert!(PaymentStatus::Unpaid.can_transition_to(PaymentStatus::Unpaid));
        assert!(PaymentStatus::Paid.can_transition_to(PaymentStatus::Paid));
        assert!(!PaymentStatus::Paid.can_transition_to(PaymentStatus::Unpaid));
    }

    #[test]
    fn details_validation() {
        let ok = RegistrationDetails {
            age: 30,
            phone: "+8801700000000".to_string(),
            gender: Gender::Female,
            emergency_contact: "Rahim, +8801800000000".to_string(),
        };
        assert!(ok.validate().is_ok());

        let bad = RegistrationDetails {
            age: 0,
            phone: "   ".to_string(),
            ..ok
        }
        .normalized();
        let errors = bad.validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("age"));
        assert!(fields.contains_key("phone"));
    }

    #[test]
    fn participant_email_must_be_valid() {
        let p = Participant {
            name: "Nadia".to_string(),
            email: "not-an-email".to_string(),
        };
        assert!(p.validate().is_err());
    }

    #[test]
    fn status_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&PaymentStatus::Unpaid).unwrap(), "\"unpaid\"");
        assert_eq!(PaymentStatus::from_str("paid"), Some(PaymentStatus::Paid));
        assert_eq!(PaymentStatus::from_str("refunded"), None);
    }
}
