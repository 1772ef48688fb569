use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use crate::models::submission::SubmissionStatus;
use crate::utils::validation::validate_no_blank_entries;

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateSubmissionPayload {
    pub job_id: Uuid,
    #[validate(length(min = 20, max = 10000))]
    pub description: String,
    #[serde(default)]
    #[validate(custom(function = "validate_no_blank_entries"))]
    pub attachments: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct UpdateSubmissionStatusPayload {
    pub status: SubmissionStatus,
    #[validate(length(max = 2000))]
    pub client_feedback: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct RateSubmissionPayload {
    #[validate(range(min = 1, max = 5))]
    pub rating: i16,
    #[validate(length(max = 2000))]
    pub review: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MySubmissionsQuery {
    pub status: Option<SubmissionStatus>,
}
