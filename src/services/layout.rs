// src/services/layout.rs

use crate::models::{exam::Phase, question::QuestionType};

/// A question type together with the number of items a set of it holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypeSpec {
    pub question_type: QuestionType,
    pub expected_count: usize,
}

impl From<QuestionType> for TypeSpec {
    fn from(question_type: QuestionType) -> Self {
        Self {
            question_type,
            expected_count: question_type.expected_count(),
        }
    }
}

/// The ordered sets that must be drafted for `phase` at `level`.
pub fn layout(level: i64, phase: Phase) -> Vec<TypeSpec> {
    use QuestionType::*;

    let types: &[QuestionType] = match phase {
        Phase::First if level >= 3 => &[Intro, Combo3, Combo3],
        Phase::First => &[Intro, Combo2, Combo2, Combo2],
        Phase::Remaining if level >= 5 => &[Combo3, Roleplay3, Advanced2],
        Phase::Remaining if level >= 3 => &[Combo2, Roleplay3, Advanced2],
        Phase::Remaining => &[Combo2, Roleplay1, Advanced2],
    };

    types.iter().copied().map(TypeSpec::from).collect()
}

/// Total number of questions produced by `layout(level, phase)`.
pub fn question_count(level: i64, phase: Phase) -> usize {
    layout(level, phase).iter().map(|s| s.expected_count).sum()
}
