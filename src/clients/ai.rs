// src/clients/ai.rs

//! Client for the AI grading server.
//!
//! Three endpoints: practice feedback, per-question exam analysis and the
//! exam-total analysis. Calls log endpoint, status and latency, never the
//! candidate's scripts.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use tracing::{info, instrument, warn};

use crate::models::{
    exam_answer::{AnswerAnalysis, AnswerScores, CategoryFeedback, SentenceFeedback},
    practice::{PracticeFeedback, PracticeSentenceFeedback},
};

#[derive(Debug, thiserror::Error)]
pub enum AiError {
    #[error("AI transport error: {0}")]
    Transport(String),
    #[error("AI server returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("failed to decode AI response: {0}")]
    Decode(String),
}

impl AiError {
    /// 5xx, 408, 429 and transport failures are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            AiError::Transport(_) => true,
            AiError::Status { status, .. } => *status >= 500 || *status == 408 || *status == 429,
            AiError::Decode(_) => false,
        }
    }
}

/// Practice-mode request.
#[derive(Debug, Clone, Serialize)]
pub struct FeedbackRequest {
    pub question_text: String,
    pub user_answer: String,
    pub user_korean_script: String,
}

/// Per-question exam analysis request.
#[derive(Debug, Clone, Serialize)]
pub struct QuestionAnalysisRequest {
    pub user_answer: String,
    pub original_question: String,
    pub audio_url: Option<String>,
    pub question_type: String,
    pub difficulty: i64,
    pub question_order: i64,
}

/// One answer as summarized for the exam-total analysis.
#[derive(Debug, Clone, Serialize)]
pub struct AnswerSummary {
    pub question_order: i64,
    pub stt_script: Option<String>,
    pub improved_answer: Option<String>,
    pub grammar_score: Option<i64>,
    pub vocab_score: Option<i64>,
    pub logic_score: Option<i64>,
    pub fluency_score: Option<i64>,
    pub relevance_score: Option<i64>,
    pub logic_feedback: Option<String>,
}

/// Exam-total analysis result.
///
/// Only the prose and the level prediction are decoded; scores in the
/// response are ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExamTotalAnalysis {
    pub predicted_level: String,
    #[serde(default)]
    pub overall_evaluation: Option<String>,
    #[serde(default)]
    pub strengths: Vec<String>,
    #[serde(default)]
    pub improvements: Vec<String>,
}

/// The external grading collaborator.
#[async_trait]
pub trait AiClient: Send + Sync {
    async fn request_feedback(&self, request: &FeedbackRequest) -> Result<PracticeFeedback, AiError>;

    async fn analyze_question(
        &self,
        request: &QuestionAnalysisRequest,
    ) -> Result<AnswerAnalysis, AiError>;

    async fn analyze_exam(&self, answers: &[AnswerSummary]) -> Result<ExamTotalAnalysis, AiError>;
}

#[derive(Debug, Deserialize)]
struct WireSentence {
    target_sentence: Option<String>,
    target_text: Option<String>,
    improved_text: Option<String>,
    feedback: Option<String>,
    sentence_order: Option<i64>,
    #[serde(default)]
    sentence_score: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct WireFeedbackResponse {
    improved_answer: Option<String>,
    relevance_feedback: Option<String>,
    logic_feedback: Option<String>,
    fluency_feedback: Option<String>,
    #[serde(default)]
    sentence_details: Option<Vec<WireSentence>>,
}

impl From<WireFeedbackResponse> for PracticeFeedback {
    fn from(wire: WireFeedbackResponse) -> Self {
        PracticeFeedback {
            improved_answer: wire.improved_answer,
            relevance_feedback: wire.relevance_feedback,
            logic_feedback: wire.logic_feedback,
            fluency_feedback: wire.fluency_feedback,
            sentences: wire
                .sentence_details
                .unwrap_or_default()
                .into_iter()
                .map(|s| PracticeSentenceFeedback {
                    target_sentence: s.target_sentence,
                    target_segment: s.target_text,
                    improved_segment: s.improved_text,
                    comment: s.feedback,
                    sentence_order: s.sentence_order,
                    sentence_score: s.sentence_score,
                })
                .collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireQuestionAnalysis {
    grammar_score: Option<i64>,
    vocab_score: Option<i64>,
    logic_score: Option<i64>,
    fluency_score: Option<i64>,
    relevance_score: Option<i64>,
    improved_answer: Option<String>,
    logic_feedback: Option<String>,
    fluency_feedback: Option<String>,
    relevance_feedback: Option<String>,
    #[serde(default)]
    sentence_feedbacks: Option<Vec<WireSentence>>,
}

impl From<WireQuestionAnalysis> for AnswerAnalysis {
    fn from(wire: WireQuestionAnalysis) -> Self {
        AnswerAnalysis {
            scores: AnswerScores {
                grammar: wire.grammar_score.unwrap_or(0),
                vocab: wire.vocab_score.unwrap_or(0),
                logic: wire.logic_score.unwrap_or(0),
                fluency: wire.fluency_score.unwrap_or(0),
                relevance: wire.relevance_score.unwrap_or(0),
            },
            improved_answer: wire.improved_answer,
            feedback: CategoryFeedback {
                logic: wire.logic_feedback,
                fluency: wire.fluency_feedback,
                relevance: wire.relevance_feedback,
            },
            sentences: wire
                .sentence_feedbacks
                .unwrap_or_default()
                .into_iter()
                .map(|s| SentenceFeedback {
                    target_sentence: s.target_sentence,
                    target_segment: s.target_text,
                    corrected_segment: s.improved_text,
                    comment: s.feedback,
                    sentence_order: s.sentence_order,
                })
                .collect(),
        }
    }
}

/// reqwest-backed client. The timeout bounds every call.
#[derive(Clone)]
pub struct HttpAiClient {
    client: reqwest::Client,
    base_url: String,
}

impl HttpAiClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, AiError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AiError::Transport(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    #[instrument(level = "info", skip(self, body))]
    async fn post<B: Serialize + Sync + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, AiError> {
        let url = format!("{}{}", self.base_url, path);
        let started = Instant::now();

        let res = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| AiError::Transport(e.to_string()))?;

        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            let elapsed_ms = started.elapsed().as_millis() as u64;
            warn!(status = status.as_u16(), elapsed_ms, "AI call failed");
            return Err(AiError::Status {
                status: status.as_u16(),
                body: body.chars().take(300).collect(),
            });
        }

        let parsed = res
            .json::<T>()
            .await
            .map_err(|e| AiError::Decode(e.to_string()))?;
        let elapsed_ms = started.elapsed().as_millis() as u64;
        info!(status = status.as_u16(), elapsed_ms, "AI call succeeded");
        Ok(parsed)
    }
}

#[async_trait]
impl AiClient for HttpAiClient {
    async fn request_feedback(&self, request: &FeedbackRequest) -> Result<PracticeFeedback, AiError> {
        let wire: WireFeedbackResponse = self.post("/v1/analyze", request).await?;
        Ok(wire.into())
    }

    async fn analyze_question(
        &self,
        request: &QuestionAnalysisRequest,
    ) -> Result<AnswerAnalysis, AiError> {
        let wire: WireQuestionAnalysis = self.post("/v1/analyze/exam", request).await?;
        Ok(wire.into())
    }

    async fn analyze_exam(&self, answers: &[AnswerSummary]) -> Result<ExamTotalAnalysis, AiError> {
        self.post("/v1/analyze/exam-feedback", answers).await
    }
}

/// Deterministic stand-in used when no AI server is configured.
#[derive(Debug, Clone, Default)]
pub struct FakeAiClient;

#[async_trait]
impl AiClient for FakeAiClient {
    async fn request_feedback(&self, _request: &FeedbackRequest) -> Result<PracticeFeedback, AiError> {
        Ok(PracticeFeedback {
            improved_answer: Some("This is a mock improved answer.".to_string()),
            relevance_feedback: Some("Your answer was relevant.".to_string()),
            logic_feedback: Some("The logic of your answer is sound.".to_string()),
            fluency_feedback: Some("You speak fluently.".to_string()),
            sentences: vec![PracticeSentenceFeedback {
                target_sentence: Some("This was the original sentence.".to_string()),
                target_segment: Some("original".to_string()),
                improved_segment: Some("improved".to_string()),
                comment: Some("Mock feedback on a sentence.".to_string()),
                sentence_order: Some(1),
                sentence_score: None,
            }],
        })
    }

    async fn analyze_question(
        &self,
        request: &QuestionAnalysisRequest,
    ) -> Result<AnswerAnalysis, AiError> {
        tracing::debug!(question_order = request.question_order, "Returning fake question analysis");
        Ok(AnswerAnalysis {
            scores: AnswerScores {
                grammar: 80,
                vocab: 80,
                logic: 80,
                fluency: 80,
                relevance: 80,
            },
            improved_answer: Some("This is a mock improved answer.".to_string()),
            feedback: CategoryFeedback {
                logic: Some("The logic of your answer is sound.".to_string()),
                fluency: Some("You speak fluently.".to_string()),
                relevance: Some("Your answer was relevant.".to_string()),
            },
            sentences: vec![SentenceFeedback {
                target_sentence: Some("This was the original sentence.".to_string()),
                target_segment: Some("original".to_string()),
                corrected_segment: Some("improved".to_string()),
                comment: Some("Mock feedback on a sentence.".to_string()),
                sentence_order: Some(1),
            }],
        })
    }

    async fn analyze_exam(&self, _answers: &[AnswerSummary]) -> Result<ExamTotalAnalysis, AiError> {
        Ok(ExamTotalAnalysis {
            predicted_level: "IH".to_string(),
            overall_evaluation: Some(
                "Natural expressions and a clear line of reasoning overall.".to_string(),
            ),
            strengths: vec!["Describing people and places".to_string()],
            improvements: vec!["Role-play alternatives".to_string()],
        })
    }
}
