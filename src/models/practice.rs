// src/models/practice.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    error::AppError,
    models::question::{Question, QuestionType},
};

/// Status of the AI feedback attached to a practice answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FeedbackStatus {
    /// Stored but not yet sent to the AI server.
    Pending,
    /// Request in flight.
    Processing,
    Completed,
    Failed,
}

impl FeedbackStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            FeedbackStatus::Pending => "PENDING",
            FeedbackStatus::Processing => "PROCESSING",
            FeedbackStatus::Completed => "COMPLETED",
            FeedbackStatus::Failed => "FAILED",
        }
    }

    pub fn parse(raw: &str) -> Result<Self, AppError> {
        match raw {
            "PENDING" => Ok(FeedbackStatus::Pending),
            "PROCESSING" => Ok(FeedbackStatus::Processing),
            "COMPLETED" => Ok(FeedbackStatus::Completed),
            "FAILED" => Ok(FeedbackStatus::Failed),
            other => Err(AppError::InternalServerError(format!(
                "Unknown feedback status '{}'",
                other
            ))),
        }
    }
}

/// A single-set practice session.
#[derive(Debug, Clone, Serialize)]
pub struct Practice {
    pub id: i64,
    pub user_id: i64,
    pub topic_id: i64,
    pub set_id: i64,
    pub question_type: QuestionType,
    pub started_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PracticeSentenceFeedback {
    pub target_sentence: Option<String>,
    pub target_segment: Option<String>,
    pub improved_segment: Option<String>,
    pub comment: Option<String>,
    pub sentence_order: Option<i64>,
    pub sentence_score: Option<i64>,
}

/// AI feedback for one practice answer. Applying it replaces the previous one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PracticeFeedback {
    pub improved_answer: Option<String>,
    pub relevance_feedback: Option<String>,
    pub logic_feedback: Option<String>,
    pub fluency_feedback: Option<String>,
    pub sentences: Vec<PracticeSentenceFeedback>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PracticeAnswer {
    pub id: i64,
    pub practice_id: i64,
    pub question_id: i64,
    pub korean_script: Option<String>,
    pub english_script: Option<String>,
    pub audio_url: Option<String>,
    pub improved_answer: Option<String>,
    pub relevance_feedback: Option<String>,
    pub logic_feedback: Option<String>,
    pub fluency_feedback: Option<String>,
    pub feedback_status: FeedbackStatus,
    pub feedbacks: Vec<PracticeSentenceFeedback>,
    pub created_at: DateTime<Utc>,
}

/// DTO for starting a practice session.
#[derive(Debug, Deserialize)]
pub struct CreatePracticeRequest {
    pub survey_id: i64,
    pub topic_id: i64,
    pub question_type: QuestionType,
}

/// A started practice with the questions of its set.
#[derive(Debug, Serialize)]
pub struct PracticeView {
    #[serde(flatten)]
    pub practice: Practice,
    pub questions: Vec<Question>,
}

/// Returned when a practice answer is accepted for grading.
#[derive(Debug, Serialize)]
pub struct PracticeSubmission {
    pub answer_id: i64,
    pub feedback_status: FeedbackStatus,
}

/// Feedback view: full content only once the analysis completed.
#[derive(Debug, Serialize)]
pub struct PracticeFeedbackResult {
    pub feedback_status: FeedbackStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feedback: Option<PracticeFeedback>,
}

impl From<PracticeAnswer> for PracticeFeedbackResult {
    fn from(answer: PracticeAnswer) -> Self {
        let feedback = (answer.feedback_status == FeedbackStatus::Completed).then(|| {
            PracticeFeedback {
                improved_answer: answer.improved_answer,
                relevance_feedback: answer.relevance_feedback,
                logic_feedback: answer.logic_feedback,
                fluency_feedback: answer.fluency_feedback,
                sentences: answer.feedbacks,
            }
        });
        Self {
            feedback_status: answer.feedback_status,
            feedback,
        }
    }
}
