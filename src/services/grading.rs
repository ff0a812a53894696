// src/services/grading.rs

//! Live grading: one AI attempt per submission, run in the background.
//!
//! Each step below is its own committed transaction and takes only ids, so a
//! later failure never rolls back an earlier status write.

use crate::{
    clients::ai::{FeedbackRequest, QuestionAnalysisRequest},
    error::AppError,
    models::{
        exam::Exam,
        exam_answer::ExamAnswer,
        practice::FeedbackStatus,
    },
    repository::{answer as answer_repo, content, exam as exam_repo, practice as practice_repo},
    services::admin,
    state::AppState,
};

/// Builds the per-question AI request for `answer`.
pub fn question_request(exam: &Exam, answer: &ExamAnswer) -> Result<QuestionAnalysisRequest, AppError> {
    let (set, question) = exam.question_at(answer.question_order).ok_or_else(|| {
        AppError::NotFound(format!(
            "Exam {} has no question {}",
            exam.id, answer.question_order
        ))
    })?;

    Ok(QuestionAnalysisRequest {
        user_answer: answer.stt_script.clone().unwrap_or_default(),
        original_question: question.question_text.clone(),
        audio_url: answer.audio_url.clone(),
        question_type: set.question_type.code().to_string(),
        difficulty: set.level,
        question_order: answer.question_order,
    })
}

/// Grades one practice answer. Failures end in `FAILED`.
pub async fn grade_practice_answer(state: &AppState, answer_id: i64) {
    if let Err(e) = run_practice_grading(state, answer_id).await {
        tracing::error!(answer_id, "Practice feedback failed: {}", e);

        if let Err(e) = mark_practice_failed(state, answer_id).await {
            tracing::error!(answer_id, "Could not record practice feedback failure: {}", e);
        }
    }
}

async fn run_practice_grading(state: &AppState, answer_id: i64) -> Result<(), AppError> {
    // Visible as PROCESSING before the AI server is contacted.
    let mut tx = state.pool.begin().await?;
    practice_repo::update_feedback_status(&mut tx, answer_id, FeedbackStatus::Processing).await?;
    tx.commit().await?;

    let request = {
        let mut conn = state.pool.acquire().await?;
        let answer = practice_repo::find_answer(&mut conn, answer_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Practice answer {} not found", answer_id)))?;
        let (question, _) = content::find_question(&mut conn, answer.question_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Question {} not found", answer.question_id)))?;

        FeedbackRequest {
            question_text: question.question_text,
            user_answer: answer.english_script.unwrap_or_default(),
            user_korean_script: answer.korean_script.unwrap_or_default(),
        }
    };

    let feedback = state
        .ai
        .request_feedback(&request)
        .await
        .map_err(|e| AppError::External(e.to_string()))?;

    let mut tx = state.pool.begin().await?;
    practice_repo::apply_feedback(&mut tx, answer_id, &feedback).await?;
    tx.commit().await?;

    tracing::info!(answer_id, sentences = feedback.sentences.len(), "Practice feedback completed");
    Ok(())
}

async fn mark_practice_failed(state: &AppState, answer_id: i64) -> Result<(), AppError> {
    let mut tx = state.pool.begin().await?;
    practice_repo::update_feedback_status(&mut tx, answer_id, FeedbackStatus::Failed).await?;
    tx.commit().await?;
    Ok(())
}

/// Grades one exam answer, then queues the report if the exam is ready.
///
/// The answer is already `ANALYZING` when this runs; submission committed it.
pub async fn grade_exam_answer(state: &AppState, exam_id: i64, question_order: i64) {
    if let Err(e) = run_exam_answer_grading(state, exam_id, question_order).await {
        tracing::error!(exam_id, question_order, "Exam answer analysis failed: {}", e);

        if let Err(e) = mark_exam_answer_failed(state, exam_id, question_order).await {
            tracing::error!(exam_id, question_order, "Could not record analysis failure: {}", e);
        }
    }

    admin::schedule_report_if_ready(state, exam_id).await;
}

async fn run_exam_answer_grading(
    state: &AppState,
    exam_id: i64,
    question_order: i64,
) -> Result<(), AppError> {
    let request = {
        let mut conn = state.pool.acquire().await?;
        let exam = exam_repo::find(&mut conn, exam_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Exam {} not found", exam_id)))?;
        let answer = answer_repo::find(&mut conn, exam_id, question_order)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!("Answer {} of exam {} not found", question_order, exam_id))
            })?;
        question_request(&exam, &answer)?
    };

    let analysis = state
        .ai
        .analyze_question(&request)
        .await
        .map_err(|e| AppError::External(e.to_string()))?;

    let mut tx = state.pool.begin().await?;
    let mut answer = answer_repo::find(&mut tx, exam_id, question_order)
        .await?
        .ok_or_else(|| {
            AppError::NotFound(format!("Answer {} of exam {} not found", question_order, exam_id))
        })?;
    answer.finalize_analysis(analysis);
    answer_repo::save(&mut tx, &answer).await?;
    tx.commit().await?;

    tracing::info!(exam_id, question_order, "Exam answer analysis completed");
    Ok(())
}

async fn mark_exam_answer_failed(
    state: &AppState,
    exam_id: i64,
    question_order: i64,
) -> Result<(), AppError> {
    let mut tx = state.pool.begin().await?;
    let mut answer = answer_repo::find(&mut tx, exam_id, question_order)
        .await?
        .ok_or_else(|| {
            AppError::NotFound(format!("Answer {} of exam {} not found", question_order, exam_id))
        })?;
    answer.mark_failed();
    answer_repo::update_status(&mut tx, exam_id, question_order, answer.status).await?;
    tx.commit().await?;
    Ok(())
}
