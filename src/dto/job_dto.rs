use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use crate::models::job::{Currency, Job, JobChanges, JobStatus};
use crate::utils::validation::validate_no_blank_entries;

fn validate_budget(budget: &Decimal) -> Result<(), ValidationError> {
    if *budget < Decimal::TEN {
        let mut err = ValidationError::new("budget_too_low");
        err.message = Some("Budget must be at least 10".into());
        return Err(err);
    }
    Ok(())
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateJobPayload {
    #[validate(length(min = 5, max = 500))]
    pub title: String,
    #[validate(length(min = 20))]
    pub description: String,
    #[validate(length(min = 1, max = 100))]
    pub category: String,
    #[validate(custom(function = "validate_budget"))]
    pub budget: Decimal,
    pub currency: Option<Currency>,
    pub deadline: Option<DateTime<Utc>>,
    #[serde(default)]
    #[validate(custom(function = "validate_no_blank_entries"))]
    pub required_skills: Vec<String>,
    pub location: Option<String>,
    #[serde(default)]
    pub location_required: bool,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateJobPayload {
    #[validate(length(min = 5, max = 500))]
    pub title: Option<String>,
    #[validate(length(min = 20))]
    pub description: Option<String>,
    #[validate(length(min = 1, max = 100))]
    pub category: Option<String>,
    #[validate(custom(function = "validate_budget"))]
    pub budget: Option<Decimal>,
    pub deadline: Option<DateTime<Utc>>,
    pub required_skills: Option<Vec<String>>,
    pub location: Option<String>,
    pub location_required: Option<bool>,
}

impl From<UpdateJobPayload> for JobChanges {
    fn from(payload: UpdateJobPayload) -> Self {
        Self {
            title: payload.title,
            description: payload.description,
            category: payload.category,
            budget: payload.budget,
            deadline: payload.deadline,
            required_skills: payload.required_skills,
            location: payload.location,
            location_required: payload.location_required,
            status: None,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct JobListQuery {
    pub status: Option<JobStatus>,
    pub category: Option<String>,
    pub min_budget: Option<Decimal>,
    pub max_budget: Option<Decimal>,
    pub search: Option<String>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Pagination {
    pub page: i64,
    pub limit: i64,
    pub total: i64,
    pub pages: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct JobListResponse {
    pub jobs: Vec<Job>,
    pub pagination: Pagination,
}

#[derive(Debug, Clone, Serialize)]
pub struct JobDetailResponse {
    #[serde(flatten)]
    pub job: Job,
    pub submission_count: i64,
}
