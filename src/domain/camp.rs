use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, Result};

/// Minor units per major currency unit (paisa per taka, cents per dollar).
pub const MINOR_UNITS_PER_MAJOR: i64 = 100;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Camp {
    pub id: Uuid,
    pub name: String,
    pub fee_cents: i64,
    /// `None` means unlimited seats.
    pub capacity: Option<i64>,
    pub participant_count: i64,
    pub scheduled_at: DateTime<Utc>,
    pub location: String,
    pub healthcare_professional: String,
    pub description: String,
    pub image_url: Option<String>,
    /// Email of the organizer who created the camp.
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Camp {
    /// A camp accepts registrations only while its start time is in the future.
    pub fn is_open_at(&self, now: DateTime<Utc>) -> bool {
        self.scheduled_at > now
    }

    pub fn is_full(&self) -> bool {
        self.capacity
            .map(|cap| self.participant_count >= cap)
            .unwrap_or(false)
    }

    pub fn seats_remaining(&self) -> Option<i64> {
        self.capacity.map(|cap| (cap - self.participant_count).max(0))
    }

    pub fn fee(&self) -> f64 {
        from_minor_units(self.fee_cents)
    }
}

/// Converts a major-unit decimal amount into integer minor units.
///
/// Rejects negative, non-finite and sub-minor-unit amounts rather than
/// rounding them silently.
pub fn to_minor_units(amount: f64) -> Result<i64> {
    if !amount.is_finite() || amount < 0.0 {
        return Err(AppError::Validation(
            "fee must be a non-negative amount".to_string(),
        ));
    }

    let scaled = amount * MINOR_UNITS_PER_MAJOR as f64;
    let rounded = scaled.round();
    if (scaled - rounded).abs() > 1e-6 {
        return Err(AppError::Validation(
            "fee cannot have more than two decimal places".to_string(),
        ));
    }
    if rounded > i64::MAX as f64 {
        return Err(AppError::Validation("fee is too large".to_string()));
    }

    Ok(rounded as i64)
}

pub fn from_minor_units(cents: i64) -> f64 {
    cents as f64 / MINOR_UNITS_PER_MAJOR as f64
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateCampRequest {
    #[validate(length(min = 1, max = 200, message = "is required"))]
    pub name: String,
    /// Major units, e.g. `1000` taka.
    pub fee: f64,
    #[validate(range(min = 1, message = "must be at least 1"))]
    pub capacity: Option<i64>,
    pub scheduled_at: DateTime<Utc>,
    #[validate(length(min = 1, message = "is required"))]
    pub location: String,
    #[validate(length(min = 1, message = "is required"))]
    pub healthcare_professional: String,
    #[validate(length(min = 1, max = 5000, message = "is required"))]
    pub description: String,
    #[validate(url(message = "must be a valid URL"))]
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, Validate)]
pub struct UpdateCampRequest {
    #[validate(length(min = 1, max = 200, message = "cannot be empty"))]
    pub name: Option<String>,
    pub fee: Option<f64>,
    /// Absent leaves the capacity alone; `null` makes seats unlimited.
    #[serde(
        default,
        deserialize_with = "present_or_null",
        skip_serializing_if = "Option::is_none"
    )]
    pub capacity: Option<Option<i64>>,
    pub scheduled_at: Option<DateTime<Utc>>,
    #[validate(length(min = 1, message = "cannot be empty"))]
    pub location: Option<String>,
    #[validate(length(min = 1, message = "cannot be empty"))]
    pub healthcare_professional: Option<String>,
    #[validate(length(min = 1, max = 5000, message = "cannot be empty"))]
    pub description: Option<String>,
    #[validate(url(message = "must be a valid URL"))]
    pub image_url: Option<String>,
}

impl UpdateCampRequest {
    pub fn check(&self) -> Result<()> {
        self.validate()?;
        if let Some(Some(capacity)) = self.capacity {
            if capacity < 1 {
                return Err(AppError::Validation("capacity: must be at least 1".to_string()));
            }
        }
        Ok(())
    }
}

/// Distinguishes an explicit `null` from a missing field.
fn present_or_null<'de, D, T>(deserializer: D) -> std::result::Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn camp(capacity: Option<i64>, count: i64) -> Camp {
        let now = Utc::now();
        Camp {
            id: Uuid::new_v4(),
            name: "Cardiology Basics".to_string(),
            fee_cents: 100_000,
            capacity,
            participant_count: count,
            scheduled_at: now + Duration::days(3),
            location: "Dhaka".to_string(),
            healthcare_professional: "Dr. Khan".to_string(),
            description: "Intro".to_string(),
            image_url: None,
            created_by: "org@camp.org".to_string(),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn minor_unit_conversion() {
        assert_eq!(to_minor_units(1000.0).unwrap(), 100_000);
        assert_eq!(to_minor_units(12.34).unwrap(), 1234);
        assert_eq!(to_minor_units(0.0).unwrap(), 0);
        assert_eq!(from_minor_units(100_000), 1000.0);
    }

    #[test]
    fn minor_unit_conversion_rejects_bad_amounts() {
        assert!(matches!(to_minor_units(-1.0), Err(AppError::Validation(_))));
        assert!(matches!(to_minor_units(f64::NAN), Err(AppError::Validation(_))));
        assert!(matches!(to_minor_units(1.005), Err(AppError::Validation(_))));
    }

    #[test]
    fn capacity_accounting() {
        assert!(!camp(None, 10_000).is_full());
        assert!(camp(Some(2), 2).is_full());
        assert_eq!(camp(Some(5), 3).seats_remaining(), Some(2));
        assert_eq!(camp(None, 3).seats_remaining(), None);
    }

    #[test]
    fn open_only_before_start() {
        let c = camp(None, 0);
        assert!(c.is_open_at(Utc::now()));
        assert!(!c.is_open_at(c.scheduled_at));
    }

    #[test]
    fn update_distinguishes_null_capacity_from_missing() {
        let cleared: UpdateCampRequest = serde_json::from_str(r#"{"capacity": null}"#).unwrap();
        assert_eq!(cleared.capacity, Some(None));

        let untouched: UpdateCampRequest = serde_json::from_str(r#"{"name": "Renamed"}"#).unwrap();
        assert_eq!(untouched.capacity, None);

        let set: UpdateCampRequest = serde_json::from_str(r#"{"capacity": 40}"#).unwrap();
        assert_eq!(set.capacity, Some(Some(40)));

        let zero: UpdateCampRequest = serde_json::from_str(r#"{"capacity": 0}"#).unwrap();
        assert!(matches!(zero.check(), Err(AppError::Validation(_))));
    }
}
