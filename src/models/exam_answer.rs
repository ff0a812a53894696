// src/models/exam_answer.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Lifecycle of one submitted exam answer.
///
/// `READY -> UPLOADED -> STT_ONGOING -> ANALYZING -> COMPLETED`, with the two
/// failure states reachable from anywhere. Transitions overwrite the status
/// without checking the previous one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AnswerStatus {
    Ready,
    Uploaded,
    SttOngoing,
    Analyzing,
    Completed,
    AnalyzingFailed,
    Failed,
}

impl AnswerStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            AnswerStatus::Ready => "READY",
            AnswerStatus::Uploaded => "UPLOADED",
            AnswerStatus::SttOngoing => "STT_ONGOING",
            AnswerStatus::Analyzing => "ANALYZING",
            AnswerStatus::Completed => "COMPLETED",
            AnswerStatus::AnalyzingFailed => "ANALYZING_FAILED",
            AnswerStatus::Failed => "FAILED",
        }
    }

    pub fn parse(raw: &str) -> Result<Self, AppError> {
        match raw {
            "READY" => Ok(AnswerStatus::Ready),
            "UPLOADED" => Ok(AnswerStatus::Uploaded),
            "STT_ONGOING" => Ok(AnswerStatus::SttOngoing),
            "ANALYZING" => Ok(AnswerStatus::Analyzing),
            "COMPLETED" => Ok(AnswerStatus::Completed),
            "ANALYZING_FAILED" => Ok(AnswerStatus::AnalyzingFailed),
            "FAILED" => Ok(AnswerStatus::Failed),
            other => Err(AppError::InternalServerError(format!(
                "Unknown answer status '{}'",
                other
            ))),
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            AnswerStatus::Completed | AnswerStatus::AnalyzingFailed | AnswerStatus::Failed
        )
    }
}

/// Per-category scores, 0..=100.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerScores {
    pub grammar: i64,
    pub vocab: i64,
    pub logic: i64,
    pub fluency: i64,
    pub relevance: i64,
}

/// Per-category feedback text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryFeedback {
    pub logic: Option<String>,
    pub fluency: Option<String>,
    pub relevance: Option<String>,
}

/// Sentence-level correction attached to an answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SentenceFeedback {
    pub target_sentence: Option<String>,
    pub target_segment: Option<String>,
    pub corrected_segment: Option<String>,
    pub comment: Option<String>,
    pub sentence_order: Option<i64>,
}

/// Result of grading one exam answer, applied wholesale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerAnalysis {
    pub scores: AnswerScores,
    pub improved_answer: Option<String>,
    pub feedback: CategoryFeedback,
    pub sentences: Vec<SentenceFeedback>,
}

/// One answer of an exam, keyed by `(exam_id, question_order)`.
#[derive(Debug, Clone, Serialize)]
pub struct ExamAnswer {
    pub exam_id: i64,
    pub question_order: i64,
    pub audio_url: Option<String>,
    pub stt_script: Option<String>,
    pub improved_answer: Option<String>,
    pub scores: Option<AnswerScores>,
    pub feedback: CategoryFeedback,
    pub sentence_feedbacks: Vec<SentenceFeedback>,
    pub status: AnswerStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ExamAnswer {
    pub fn new(exam_id: i64, question_order: i64) -> Self {
        let now = Utc::now();
        Self {
            exam_id,
            question_order,
            audio_url: None,
            stt_script: None,
            improved_answer: None,
            scores: None,
            feedback: CategoryFeedback::default(),
            sentence_feedbacks: Vec::new(),
            status: AnswerStatus::Ready,
            created_at: now,
            updated_at: now,
        }
    }

    fn set_status(&mut self, status: AnswerStatus) {
        self.status = status;
        self.updated_at = Utc::now();
    }

    /// READY -> UPLOADED
    pub fn upload_voice(&mut self, audio_url: String) {
        self.audio_url = Some(audio_url);
        self.set_status(AnswerStatus::Uploaded);
    }

    /// UPLOADED -> STT_ONGOING
    pub fn start_transcription(&mut self) {
        self.set_status(AnswerStatus::SttOngoing);
    }

    /// STT_ONGOING -> ANALYZING
    pub fn complete_transcription(&mut self, stt_script: String) {
        self.stt_script = Some(stt_script);
        self.set_status(AnswerStatus::Analyzing);
    }

    /// Re-enters ANALYZING for an operator-driven re-analysis.
    pub fn begin_reanalysis(&mut self) {
        self.set_status(AnswerStatus::Analyzing);
    }

    /// ANALYZING -> COMPLETED, replacing every AI-derived field.
    pub fn finalize_analysis(&mut self, analysis: AnswerAnalysis) {
        self.scores = Some(analysis.scores);
        self.improved_answer = analysis.improved_answer;
        self.feedback = analysis.feedback;
        self.sentence_feedbacks = analysis.sentences;
        self.set_status(AnswerStatus::Completed);
    }

    /// Live-path failure.
    pub fn mark_failed(&mut self) {
        self.set_status(AnswerStatus::Failed);
    }

    /// Admin-path failure.
    pub fn mark_analyzing_failed(&mut self) {
        self.set_status(AnswerStatus::AnalyzingFailed);
    }
}
