// src/models/survey.rs

use serde::{Deserialize, Serialize};
use validator::Validate;

/// A candidate's self-assessment: difficulty level plus the topics they picked.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Survey {
    pub id: i64,
    pub user_id: i64,
    pub level: i64,
    pub topic_ids: Vec<i64>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// DTO for submitting a survey.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateSurveyRequest {
    #[validate(range(min = 1, max = 6))]
    pub level: i64,
    #[validate(length(min = 1, max = 50))]
    pub topic_ids: Vec<i64>,
}
