pub mod auth;
pub mod camps;
pub mod feedback;
pub mod payments;
pub mod registrations;
pub mod root;
pub mod stats;

use serde::{Deserialize, Serialize};

/// Acknowledgment body for operations with nothing else to return.
#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }
}
