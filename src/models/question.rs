// src/models/question.rs

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::error::AppError;

/// Question-set layout categories.
///
/// Persisted as a stable integer tag (`type_id` column). Rows carrying a tag
/// outside this table are rejected when loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QuestionType {
    Intro,
    Combo2,
    Combo3,
    Roleplay1,
    Roleplay2,
    Roleplay3,
    Advanced2,
}

impl QuestionType {
    pub const ALL: [QuestionType; 7] = [
        QuestionType::Intro,
        QuestionType::Combo2,
        QuestionType::Combo3,
        QuestionType::Roleplay1,
        QuestionType::Roleplay2,
        QuestionType::Roleplay3,
        QuestionType::Advanced2,
    ];

    pub fn id(self) -> i64 {
        match self {
            QuestionType::Intro => 1,
            QuestionType::Combo2 => 2,
            QuestionType::Combo3 => 3,
            QuestionType::Roleplay1 => 4,
            QuestionType::Roleplay2 => 5,
            QuestionType::Roleplay3 => 6,
            QuestionType::Advanced2 => 7,
        }
    }

    pub fn from_id(id: i64) -> Result<Self, AppError> {
        Self::ALL
            .into_iter()
            .find(|t| t.id() == id)
            .ok_or(AppError::UnknownQuestionType(id))
    }

    /// Number of questions a set of this type is expected to hold.
    pub fn expected_count(self) -> usize {
        match self {
            QuestionType::Intro | QuestionType::Roleplay1 => 1,
            QuestionType::Combo2 | QuestionType::Roleplay2 | QuestionType::Advanced2 => 2,
            QuestionType::Combo3 | QuestionType::Roleplay3 => 3,
        }
    }

    /// Short code sent to the AI grading server.
    pub fn code(self) -> &'static str {
        match self {
            QuestionType::Intro => "Intro",
            QuestionType::Combo2 => "Combo2",
            QuestionType::Combo3 => "Combo3",
            QuestionType::Roleplay1 => "RP1",
            QuestionType::Roleplay2 => "RP2",
            QuestionType::Roleplay3 => "RP3",
            QuestionType::Advanced2 => "Ad2",
        }
    }
}

/// Represents the 'topics' table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Topic {
    pub id: i64,
    pub name: String,
    pub category: Option<String>,
}

/// A single prompt inside a question set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub id: i64,
    pub question_text: String,
    pub audio_url: String,
    /// 1-based position inside its set.
    pub order: i64,
}

/// A drafted content unit. Shared across candidates, never copied into an exam.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionSet {
    pub id: i64,
    pub level: i64,
    /// `None` only for the introduction set.
    pub topic_id: Option<i64>,
    pub question_type: QuestionType,
    pub questions: Vec<Question>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// DTO for creating a topic.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateTopicRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    #[validate(length(max = 100))]
    pub category: Option<String>,
}

/// DTO for one question inside `CreateQuestionSetRequest`.
#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct CreateQuestionRequest {
    #[validate(length(min = 1, max = 2000))]
    pub question_text: String,
    #[validate(length(min = 1, max = 500))]
    pub audio_url: String,
}

/// DTO for creating a question set together with its questions.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateQuestionSetRequest {
    #[validate(range(min = 1, max = 6))]
    pub level: i64,
    pub topic_id: Option<i64>,
    /// Integer tag of the question type.
    pub type_id: i64,
    #[validate(length(min = 1), nested)]
    pub questions: Vec<CreateQuestionRequest>,
}
