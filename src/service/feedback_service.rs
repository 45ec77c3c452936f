use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;
use validator::Validate;

use crate::{
    domain::*,
    error::{AppError, Result},
    repository::{FeedbackRepository, RegistrationRepository},
};

pub struct FeedbackService {
    repo: Arc<dyn FeedbackRepository>,
    registration_repo: Arc<dyn RegistrationRepository>,
}

impl FeedbackService {
    pub fn new(
        repo: Arc<dyn FeedbackRepository>,
        registration_repo: Arc<dyn RegistrationRepository>,
    ) -> Self {
        Self { repo, registration_repo }
    }

    /// Only participants registered for the camp may leave feedback on it.
    pub async fn submit(&self, author: &User, request: CreateFeedbackRequest) -> Result<Feedback> {
        request.validate()?;

        let registered = self
            .registration_repo
            .list_by_participant(&author.email)
            .await?
            .iter()
            .any(|r| r.camp_id == request.camp_id);
        if !registered {
            return Err(AppError::Forbidden(
                "Feedback is limited to registered participants".to_string(),
            ));
        }

        let comment = request
            .comment
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty());

        let feedback = self
            .repo
            .create(Feedback {
                id: Uuid::new_v4(),
                camp_id: request.camp_id,
                participant_name: author.display_name.clone(),
                participant_email: author.email.clone(),
                rating: request.rating,
                comment,
                created_at: Utc::now(),
            })
            .await?;

        tracing::info!("Feedback {} recorded for camp {}", feedback.id, feedback.camp_id);
        Ok(feedback)
    }

    pub async fn list_recent(&self, limit: i64) -> Result<Vec<Feedback>> {
        self.repo.list_recent(limit.clamp(1, 100)).await
    }

    pub async fn list_for_camp(&self, camp_id: Uuid) -> Result<Vec<Feedback>> {
        self.repo.list_by_camp(camp_id).await
    }
}
