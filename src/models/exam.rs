// src/models/exam.rs

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

use crate::{
    config::{MAX_DIFFICULTY, MIN_DIFFICULTY},
    error::AppError,
    models::{
        exam_answer::{AnswerStatus, ExamAnswer},
        question::{Question, QuestionSet, QuestionType},
    },
};

/// Exam-level analysis status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExamStatus {
    InProgress,
    Analyzing,
    Completed,
    AnalyzingFailed,
}

impl ExamStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ExamStatus::InProgress => "IN_PROGRESS",
            ExamStatus::Analyzing => "ANALYZING",
            ExamStatus::Completed => "COMPLETED",
            ExamStatus::AnalyzingFailed => "ANALYZING_FAILED",
        }
    }

    pub fn parse(raw: &str) -> Result<Self, AppError> {
        match raw {
            "IN_PROGRESS" => Ok(ExamStatus::InProgress),
            "ANALYZING" => Ok(ExamStatus::Analyzing),
            "COMPLETED" => Ok(ExamStatus::Completed),
            "ANALYZING_FAILED" => Ok(ExamStatus::AnalyzingFailed),
            other => Err(AppError::InternalServerError(format!(
                "Unknown exam status '{}'",
                other
            ))),
        }
    }
}

/// FIRST covers questions 1..=7, REMAINING covers 8..=N.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Phase {
    First,
    Remaining,
}

/// Per-exam cyclic topic order, fixed at creation.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TopicRotation {
    order: Vec<i64>,
    cursor: i64,
}

impl TopicRotation {
    pub fn new(order: Vec<i64>, cursor: i64) -> Self {
        Self {
            order,
            cursor: cursor.max(0),
        }
    }

    /// Deduplicates `topics` (keeping first occurrence) and shuffles them once.
    pub fn shuffled(topics: &[i64]) -> Self {
        let mut seen = HashSet::new();
        let mut order: Vec<i64> = topics.iter().copied().filter(|t| seen.insert(*t)).collect();
        order.shuffle(&mut rand::thread_rng());
        Self::new(order, 0)
    }

    pub fn order(&self) -> &[i64] {
        &self.order
    }

    pub fn cursor(&self) -> i64 {
        self.cursor
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Topic under the cursor; the cursor wraps modulo the order length.
    pub fn current(&self) -> Option<i64> {
        if self.order.is_empty() {
            return None;
        }
        let idx = (self.cursor as usize) % self.order.len();
        Some(self.order[idx])
    }

    pub fn advance(&mut self) {
        self.cursor += 1;
    }

    /// Every topic exactly once, starting at the cursor and wrapping around.
    pub fn cycle(&self) -> impl Iterator<Item = i64> + '_ {
        let len = self.order.len();
        let start = if len == 0 { 0 } else { (self.cursor as usize) % len };
        (0..len).map(move |i| self.order[(start + i) % len])
    }
}

/// Aggregate root of one test attempt.
#[derive(Debug, Clone)]
pub struct Exam {
    pub id: i64,
    pub user_id: i64,
    pub survey_id: i64,
    pub initial_difficulty: i64,
    adjusted_difficulty: Option<i64>,
    pub rotation: TopicRotation,
    /// Drafted sets in exam order.
    pub question_sets: Vec<QuestionSet>,
    pub status: ExamStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    end_at: Option<DateTime<Utc>>,
}

impl Exam {
    /// Fresh, unpersisted exam (`id == 0`) with a once-shuffled topic order.
    pub fn new(user_id: i64, survey_id: i64, initial_difficulty: i64, topics: &[i64]) -> Self {
        let now = Utc::now();
        Self {
            id: 0,
            user_id,
            survey_id,
            initial_difficulty,
            adjusted_difficulty: None,
            rotation: TopicRotation::shuffled(topics),
            question_sets: Vec::new(),
            status: ExamStatus::InProgress,
            created_at: now,
            updated_at: now,
            end_at: None,
        }
    }

    /// Rebuilds an exam from stored state.
    #[allow(clippy::too_many_arguments)]
    pub fn restore(
        id: i64,
        user_id: i64,
        survey_id: i64,
        initial_difficulty: i64,
        adjusted_difficulty: Option<i64>,
        rotation: TopicRotation,
        question_sets: Vec<QuestionSet>,
        status: ExamStatus,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
        end_at: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            id,
            user_id,
            survey_id,
            initial_difficulty,
            adjusted_difficulty,
            rotation,
            question_sets,
            status,
            created_at,
            updated_at,
            end_at,
        }
    }

    pub fn adjusted_difficulty(&self) -> Option<i64> {
        self.adjusted_difficulty
    }

    /// Records the mid-exam difficulty. Values outside 1..=6 are ignored and
    /// the previous value is kept. Returns whether the value was applied.
    pub fn update_adjusted_difficulty(&mut self, level: i64) -> bool {
        if !(MIN_DIFFICULTY..=MAX_DIFFICULTY).contains(&level) {
            return false;
        }
        self.adjusted_difficulty = Some(level);
        self.updated_at = Utc::now();
        true
    }

    pub fn end_at(&self) -> Option<DateTime<Utc>> {
        self.end_at
    }

    pub fn is_completed(&self) -> bool {
        self.end_at.is_some()
    }

    /// Marks the exam finished. A second call is a business error.
    pub fn complete(&mut self) -> Result<(), AppError> {
        if self.is_completed() {
            return Err(AppError::Conflict(format!(
                "Exam {} is already completed",
                self.id
            )));
        }
        let now = Utc::now();
        self.end_at = Some(now);
        self.updated_at = now;
        Ok(())
    }

    pub fn phase(&self) -> Phase {
        if self.question_sets.is_empty() {
            Phase::First
        } else {
            Phase::Remaining
        }
    }

    /// FIRST uses the initial level; REMAINING uses the adjusted level and
    /// falls back to the initial one when no adjustment was recorded.
    pub fn difficulty_for(&self, phase: Phase) -> i64 {
        match phase {
            Phase::First => self.initial_difficulty,
            Phase::Remaining => self.adjusted_difficulty.unwrap_or(self.initial_difficulty),
        }
    }

    /// Topics already bound to drafted sets, recomputed from the history.
    pub fn used_topics(&self) -> HashSet<i64> {
        self.question_sets.iter().filter_map(|qs| qs.topic_id).collect()
    }

    /// All questions in exam order, paired with their set.
    pub fn questions(&self) -> impl Iterator<Item = (&QuestionSet, &Question)> {
        self.question_sets
            .iter()
            .flat_map(|qs| qs.questions.iter().map(move |q| (qs, q)))
    }

    pub fn question_count(&self) -> usize {
        self.questions().count()
    }

    /// Question at 1-based exam position `order`.
    pub fn question_at(&self, order: i64) -> Option<(&QuestionSet, &Question)> {
        if order < 1 {
            return None;
        }
        self.questions().nth((order - 1) as usize)
    }

    /// Drafted positions that have no stored answer yet.
    pub fn unanswered_orders(&self, answers: &[ExamAnswer]) -> Vec<i64> {
        let answered: HashSet<i64> = answers.iter().map(|a| a.question_order).collect();
        (1..=self.question_count() as i64)
            .filter(|order| !answered.contains(order))
            .collect()
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// DTO for starting an exam.
#[derive(Debug, Deserialize)]
pub struct StartExamRequest {
    pub survey_id: i64,
}

/// DTO for the mid-exam difficulty checkpoint. Out-of-range levels are ignored.
#[derive(Debug, Deserialize)]
pub struct AdjustDifficultyRequest {
    pub level: i64,
}

/// One question as presented to the candidate, with its exam-wide position.
#[derive(Debug, Clone, Serialize)]
pub struct ExamQuestionView {
    pub order: i64,
    pub set_id: i64,
    pub question_id: i64,
    pub question_type: QuestionType,
    pub level: i64,
    pub question_text: String,
    pub audio_url: String,
}

/// Flattens `sets` into questions numbered from `first_order`.
pub fn question_views(sets: &[QuestionSet], first_order: i64) -> Vec<ExamQuestionView> {
    sets.iter()
        .flat_map(|qs| qs.questions.iter().map(move |q| (qs, q)))
        .zip(first_order..)
        .map(|((qs, q), order)| ExamQuestionView {
            order,
            set_id: qs.id,
            question_id: q.id,
            question_type: qs.question_type,
            level: qs.level,
            question_text: q.question_text.clone(),
            audio_url: q.audio_url.clone(),
        })
        .collect()
}

#[derive(Debug, Serialize)]
pub struct AnswerStatusView {
    pub question_order: i64,
    pub status: AnswerStatus,
}

#[derive(Debug, Serialize)]
pub struct ExamView {
    pub id: i64,
    pub status: ExamStatus,
    pub initial_difficulty: i64,
    pub adjusted_difficulty: Option<i64>,
    pub completed: bool,
    pub end_at: Option<DateTime<Utc>>,
    pub questions: Vec<ExamQuestionView>,
    pub answers: Vec<AnswerStatusView>,
}

impl ExamView {
    pub fn new(exam: &Exam, answers: &[ExamAnswer]) -> Self {
        Self {
            id: exam.id,
            status: exam.status,
            initial_difficulty: exam.initial_difficulty,
            adjusted_difficulty: exam.adjusted_difficulty(),
            completed: exam.is_completed(),
            end_at: exam.end_at(),
            questions: question_views(&exam.question_sets, 1),
            answers: answers
                .iter()
                .map(|a| AnswerStatusView {
                    question_order: a.question_order,
                    status: a.status,
                })
                .collect(),
        }
    }
}

/// Sets drafted by a difficulty adjustment.
#[derive(Debug, Serialize)]
pub struct DraftedBatch {
    pub adjusted_difficulty: Option<i64>,
    pub questions: Vec<ExamQuestionView>,
}
