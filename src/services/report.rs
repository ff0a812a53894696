// src/services/report.rs

use chrono::Utc;

use crate::{
    clients::ai::ExamTotalAnalysis,
    models::{
        exam_answer::{AnswerScores, ExamAnswer},
        report::{Category, ExamReport, grade_for},
    },
};

fn score_of(scores: &AnswerScores, category: Category) -> i64 {
    match category {
        Category::Grammar => scores.grammar,
        Category::Vocabulary => scores.vocab,
        Category::Logic => scores.logic,
        Category::Fluency => scores.fluency,
        Category::Relevance => scores.relevance,
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Builds the report of `exam_id` from its graded answers.
///
/// Averages, total, grade, strength and weakness come from the answers; the
/// AI result only contributes the prose and the level prediction. Ties for
/// strength or weakness go to the earlier category in `Category::ALL`.
pub fn aggregate(exam_id: i64, answers: &[ExamAnswer], total: &ExamTotalAnalysis) -> ExamReport {
    let scored: Vec<&AnswerScores> = answers.iter().filter_map(|a| a.scores.as_ref()).collect();

    let averages: Vec<(Category, f64)> = Category::ALL
        .iter()
        .map(|&c| {
            let avg = if scored.is_empty() {
                0.0
            } else {
                scored.iter().map(|s| score_of(s, c) as f64).sum::<f64>() / scored.len() as f64
            };
            (c, round2(avg))
        })
        .collect();

    let mut strength = averages[0];
    let mut weakness = averages[0];
    for &entry in &averages[1..] {
        if entry.1 > strength.1 {
            strength = entry;
        }
        if entry.1 < weakness.1 {
            weakness = entry;
        }
    }

    let total_score = round2(averages.iter().map(|(_, v)| v).sum::<f64>() / averages.len() as f64);

    ExamReport {
        exam_id,
        avg_grammar: averages[0].1,
        avg_vocab: averages[1].1,
        avg_logic: averages[2].1,
        avg_fluency: averages[3].1,
        avg_relevance: averages[4].1,
        total_score,
        grade: grade_for(total_score).to_string(),
        predicted_level: Some(total.predicted_level.clone()).filter(|l| !l.trim().is_empty()),
        comment: total.overall_evaluation.clone().unwrap_or_default(),
        strength_type: strength.0.label().to_string(),
        weakness_type: weakness.0.label().to_string(),
        strengths: total.strengths.clone(),
        improvements: total.improvements.clone(),
        created_at: Utc::now(),
    }
}
