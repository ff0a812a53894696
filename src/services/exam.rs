// src/services/exam.rs

//! Candidate-facing exam lifecycle. Every mutation of one exam runs under its
//! per-exam lock; no connection is held while the content pool, storage or
//! AI server is called.

use sqlx::SqliteConnection;

use crate::{
    clients::storage::UploadFile,
    error::AppError,
    models::{
        exam::{DraftedBatch, Exam, ExamView, Phase, question_views},
        exam_answer::ExamAnswer,
        report::ExamReport,
    },
    repository::{answer as answer_repo, content, exam as exam_repo, report as report_repo, survey as survey_repo},
    services::{admin, assembler, grading, layout::layout},
    state::AppState,
};

const AUDIO_DOMAIN: &str = "exam";

/// Loads `exam_id` for `user_id`. Exams of other candidates look absent.
pub(crate) async fn load_owned_exam(
    conn: &mut SqliteConnection,
    exam_id: i64,
    user_id: i64,
) -> Result<Exam, AppError> {
    exam_repo::find(conn, exam_id)
        .await?
        .filter(|exam| exam.user_id == user_id)
        .ok_or_else(|| AppError::NotFound(format!("Exam {} not found", exam_id)))
}

fn remaining_batch_drafted(exam: &Exam) -> bool {
    exam.question_sets.len() > layout(exam.initial_difficulty, Phase::First).len()
}

/// Creates an exam from the candidate's survey and drafts questions 1..=7.
pub async fn start_exam(state: &AppState, user_id: i64, survey_id: i64) -> Result<ExamView, AppError> {
    let (survey, topics) = {
        let mut conn = state.pool.acquire().await?;
        let survey = survey_repo::find(&mut conn, survey_id)
            .await?
            .filter(|s| s.user_id == user_id)
            .ok_or_else(|| AppError::NotFound(format!("Survey {} not found", survey_id)))?;
        let topics = content::existing_topic_ids(&mut conn, &survey.topic_ids).await?;
        (survey, topics)
    };

    if topics.is_empty() {
        return Err(AppError::BadRequest(
            "The survey does not reference any existing topic".to_string(),
        ));
    }

    let mut exam = Exam::new(user_id, survey.id, survey.level, &topics);
    assembler::assemble(state.content.as_ref(), &mut exam).await?;

    let mut tx = state.pool.begin().await?;
    exam.id = exam_repo::insert(&mut tx, &exam).await?;
    tx.commit().await?;

    tracing::info!(
        exam_id = exam.id,
        user_id,
        level = survey.level,
        questions = exam.question_count(),
        "Exam started"
    );
    Ok(ExamView::new(&exam, &[]))
}

pub async fn get_exam(state: &AppState, user_id: i64, exam_id: i64) -> Result<ExamView, AppError> {
    let mut conn = state.pool.acquire().await?;
    let exam = load_owned_exam(&mut conn, exam_id, user_id).await?;
    let answers = answer_repo::list_for_exam(&mut conn, exam_id).await?;
    Ok(ExamView::new(&exam, &answers))
}

/// Records the checkpoint difficulty and drafts the remaining questions.
///
/// An out-of-range level keeps the previous value, so the batch falls back to
/// the initial difficulty. Drafting happens once per exam.
pub async fn adjust_difficulty(
    state: &AppState,
    user_id: i64,
    exam_id: i64,
    level: i64,
) -> Result<DraftedBatch, AppError> {
    let _guard = state.exam_locks.acquire(exam_id).await;

    let mut exam = {
        let mut conn = state.pool.acquire().await?;
        load_owned_exam(&mut conn, exam_id, user_id).await?
    };

    if exam.is_completed() {
        return Err(AppError::Conflict(format!("Exam {} is already completed", exam_id)));
    }
    if remaining_batch_drafted(&exam) {
        return Err(AppError::Conflict(format!(
            "Remaining questions of exam {} were already drafted",
            exam_id
        )));
    }

    if !exam.update_adjusted_difficulty(level) {
        tracing::warn!(exam_id, level, "Ignoring out-of-range difficulty adjustment");
    }

    let first_order = exam.question_count() as i64 + 1;
    let drafted = assembler::assemble(state.content.as_ref(), &mut exam).await?;

    let mut tx = state.pool.begin().await?;
    exam_repo::save(&mut tx, &exam).await?;
    tx.commit().await?;

    Ok(DraftedBatch {
        adjusted_difficulty: exam.adjusted_difficulty(),
        questions: question_views(&drafted, first_order),
    })
}

/// Stores the candidate's answer for question `order` and queues its grading.
///
/// A resubmission replaces the previous answer; its old audio is deleted on a
/// best-effort basis.
pub async fn submit_answer(
    state: &AppState,
    user_id: i64,
    exam_id: i64,
    order: i64,
    file: UploadFile,
    stt_text: String,
) -> Result<ExamAnswer, AppError> {
    if stt_text.trim().is_empty() {
        return Err(AppError::BadRequest("stt_text must not be empty".to_string()));
    }

    let _guard = state.exam_locks.acquire(exam_id).await;

    let (exam, previous) = {
        let mut conn = state.pool.acquire().await?;
        let exam = load_owned_exam(&mut conn, exam_id, user_id).await?;
        let previous = answer_repo::find(&mut conn, exam_id, order).await?;
        (exam, previous)
    };

    if exam.is_completed() {
        return Err(AppError::Conflict(format!("Exam {} is already completed", exam_id)));
    }
    if exam.question_at(order).is_none() {
        return Err(AppError::NotFound(format!(
            "Exam {} has no question {}",
            exam_id, order
        )));
    }

    let audio_url = state.storage.upload(&file, AUDIO_DOMAIN).await?;

    let mut answer = ExamAnswer::new(exam_id, order);
    answer.upload_voice(audio_url);
    let mut tx = state.pool.begin().await?;
    answer_repo::save(&mut tx, &answer).await?;
    tx.commit().await?;

    answer.start_transcription();
    answer.complete_transcription(stt_text);
    let mut tx = state.pool.begin().await?;
    answer_repo::save(&mut tx, &answer).await?;
    tx.commit().await?;

    if let Some(old_url) = previous.and_then(|p| p.audio_url) {
        if let Err(e) = state.storage.delete(&old_url).await {
            tracing::warn!(exam_id, order, "Failed to delete replaced audio: {}", e);
        }
    }

    let task_state = state.clone();
    state.runner.spawn("exam_answer", async move {
        grading::grade_exam_answer(&task_state, exam_id, order).await;
    });

    tracing::info!(exam_id, order, "Exam answer submitted");
    Ok(answer)
}

/// Ends the exam. Report generation is queued once every answer is terminal.
pub async fn complete_exam(state: &AppState, user_id: i64, exam_id: i64) -> Result<ExamView, AppError> {
    let view = {
        let _guard = state.exam_locks.acquire(exam_id).await;

        let (mut exam, answers) = {
            let mut conn = state.pool.acquire().await?;
            let exam = load_owned_exam(&mut conn, exam_id, user_id).await?;
            let answers = answer_repo::list_for_exam(&mut conn, exam_id).await?;
            (exam, answers)
        };

        exam.complete()?;

        let mut tx = state.pool.begin().await?;
        exam_repo::save(&mut tx, &exam).await?;
        tx.commit().await?;

        tracing::info!(exam_id, answers = answers.len(), "Exam completed");
        ExamView::new(&exam, &answers)
    };

    admin::schedule_report_if_ready(state, exam_id).await;
    Ok(view)
}

pub async fn get_report(state: &AppState, user_id: i64, exam_id: i64) -> Result<ExamReport, AppError> {
    let mut conn = state.pool.acquire().await?;
    load_owned_exam(&mut conn, exam_id, user_id).await?;
    report_repo::find(&mut conn, exam_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Report for exam {} is not ready", exam_id)))
}
