// src/services/assembler.rs

//! Drafts the next batch of question sets for an exam.
//!
//! Non-intro sets prefer topics the exam has not used yet, in a fresh random
//! order per call. When none of those has content for the required
//! `(level, type)`, the exam's topic rotation is walked from its cursor so a
//! topic may repeat. The exam is only mutated once the whole batch resolved.

use std::collections::HashSet;

use rand::seq::SliceRandom;

use crate::{
    error::AppError,
    models::{
        exam::Exam,
        question::{QuestionSet, QuestionType},
    },
    repository::content::ContentPool,
    services::layout::layout,
};

/// Appends the next batch to `exam` and returns only the newly drafted sets.
pub async fn assemble(
    pool: &dyn ContentPool,
    exam: &mut Exam,
) -> Result<Vec<QuestionSet>, AppError> {
    let phase = exam.phase();
    let level = exam.difficulty_for(phase);
    let slots = layout(level, phase);

    let mut used = exam.used_topics();
    let mut unused: Vec<i64> = exam
        .rotation
        .order()
        .iter()
        .copied()
        .filter(|t| !used.contains(t))
        .collect();
    unused.shuffle(&mut rand::thread_rng());

    let mut rotation = exam.rotation.clone();
    let mut drafted = Vec::with_capacity(slots.len());

    for slot in slots {
        let set = if slot.question_type == QuestionType::Intro {
            pool.find_intro_set()
                .await?
                .ok_or_else(|| AppError::AllocationFailed("no introduction set available".to_string()))?
        } else {
            let cycle: Vec<i64> = rotation.cycle().collect();
            draft_topical(pool, level, slot.question_type, &unused, &used, &cycle).await?
        };

        if set.questions.len() != slot.expected_count {
            tracing::warn!(
                set_id = set.id,
                expected = slot.expected_count,
                actual = set.questions.len(),
                "Question set size differs from its type"
            );
        }

        if let Some(topic) = set.topic_id {
            used.insert(topic);
        }
        rotation.advance();
        drafted.push(set);
    }

    exam.rotation = rotation;
    exam.question_sets.extend(drafted.iter().cloned());
    exam.touch();

    tracing::info!(
        exam_id = exam.id,
        ?phase,
        level,
        sets = drafted.len(),
        "Drafted question batch"
    );
    Ok(drafted)
}

async fn draft_topical(
    pool: &dyn ContentPool,
    level: i64,
    question_type: QuestionType,
    unused: &[i64],
    used: &HashSet<i64>,
    cycle: &[i64],
) -> Result<QuestionSet, AppError> {
    for &topic in unused.iter().filter(|t| !used.contains(t)) {
        if let Some(set) = pool.find_by_level_topic_type(level, topic, question_type).await? {
            return Ok(set);
        }
    }

    for &topic in cycle {
        if let Some(set) = pool.find_by_level_topic_type(level, topic, question_type).await? {
            tracing::debug!(topic, ?question_type, "Reusing topic from rotation");
            return Ok(set);
        }
    }

    Err(AppError::AllocationFailed(format!(
        "no {:?} set at level {} for any selected topic",
        question_type, level
    )))
}
