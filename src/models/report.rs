// src/models/report.rs

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Scoring categories, in tie-break order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Category {
    Grammar,
    Vocabulary,
    Logic,
    Fluency,
    Relevance,
}

impl Category {
    pub const ALL: [Category; 5] = [
        Category::Grammar,
        Category::Vocabulary,
        Category::Logic,
        Category::Fluency,
        Category::Relevance,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Category::Grammar => "Grammar",
            Category::Vocabulary => "Vocabulary",
            Category::Logic => "Logic",
            Category::Fluency => "Fluency",
            Category::Relevance => "Relevance",
        }
    }
}

/// Letter grade derived from the total score.
pub fn grade_for(total_score: f64) -> &'static str {
    if total_score >= 90.0 {
        "AL"
    } else if total_score >= 80.0 {
        "IH"
    } else if total_score >= 70.0 {
        "IM3"
    } else if total_score >= 60.0 {
        "IM2"
    } else if total_score >= 50.0 {
        "IM1"
    } else {
        "IL"
    }
}

/// Summary of a finished exam. Shares the exam's id; at most one per exam.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExamReport {
    pub exam_id: i64,
    pub avg_grammar: f64,
    pub avg_vocab: f64,
    pub avg_logic: f64,
    pub avg_fluency: f64,
    pub avg_relevance: f64,
    pub total_score: f64,
    pub grade: String,
    /// Level predicted by the AI server, when it supplied one.
    pub predicted_level: Option<String>,
    pub comment: String,
    pub strength_type: String,
    pub weakness_type: String,
    pub strengths: Vec<String>,
    pub improvements: Vec<String>,
    pub created_at: DateTime<Utc>,
}
