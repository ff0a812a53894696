// src/models/history.rs

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::{
    exam::{ExamStatus, ExamView},
    practice::{Practice, PracticeAnswer},
    question::Topic,
    report::ExamReport,
    survey::Survey,
};

/// One row of a candidate's exam history.
#[derive(Debug, Clone, Serialize)]
pub struct ExamSummary {
    pub id: i64,
    pub status: ExamStatus,
    pub initial_difficulty: i64,
    pub adjusted_difficulty: Option<i64>,
    pub completed: bool,
    pub created_at: DateTime<Utc>,
    pub end_at: Option<DateTime<Utc>>,
}

/// A past exam with its report, once generated.
#[derive(Debug, Serialize)]
pub struct ExamHistoryDetail {
    #[serde(flatten)]
    pub exam: ExamView,
    pub report: Option<ExamReport>,
}

/// A past practice with every answer submitted to it.
#[derive(Debug, Serialize)]
pub struct PracticeHistoryDetail {
    #[serde(flatten)]
    pub practice: Practice,
    pub answers: Vec<PracticeAnswer>,
}

#[derive(Debug, Serialize)]
pub struct SurveyView {
    #[serde(flatten)]
    pub survey: Survey,
    pub topics: Vec<Topic>,
}
