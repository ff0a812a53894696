// src/services/history.rs

//! Read-only views of a candidate's past exams and practices. Records of
//! other candidates look absent.

use crate::{
    error::AppError,
    models::{
        exam::ExamView,
        exam_answer::ExamAnswer,
        history::{ExamHistoryDetail, ExamSummary, PracticeHistoryDetail},
        practice::Practice,
    },
    repository::{answer as answer_repo, exam as exam_repo, practice as practice_repo, report as report_repo},
    services::exam::load_owned_exam,
    state::AppState,
};

pub async fn list_exams(state: &AppState, user_id: i64) -> Result<Vec<ExamSummary>, AppError> {
    let mut conn = state.pool.acquire().await?;
    exam_repo::list_for_user(&mut conn, user_id).await
}

pub async fn exam_detail(
    state: &AppState,
    user_id: i64,
    exam_id: i64,
) -> Result<ExamHistoryDetail, AppError> {
    let mut conn = state.pool.acquire().await?;
    let exam = load_owned_exam(&mut conn, exam_id, user_id).await?;
    let answers = answer_repo::list_for_exam(&mut conn, exam_id).await?;
    let report = report_repo::find(&mut conn, exam_id).await?;

    Ok(ExamHistoryDetail {
        exam: ExamView::new(&exam, &answers),
        report,
    })
}

/// Full feedback of one stored answer, whatever its status.
pub async fn exam_answer(
    state: &AppState,
    user_id: i64,
    exam_id: i64,
    question_order: i64,
) -> Result<ExamAnswer, AppError> {
    let mut conn = state.pool.acquire().await?;
    load_owned_exam(&mut conn, exam_id, user_id).await?;
    answer_repo::find(&mut conn, exam_id, question_order)
        .await?
        .ok_or_else(|| {
            AppError::NotFound(format!("Answer {} of exam {} not found", question_order, exam_id))
        })
}

pub async fn list_practices(state: &AppState, user_id: i64) -> Result<Vec<Practice>, AppError> {
    let mut conn = state.pool.acquire().await?;
    practice_repo::list_practices(&mut conn, user_id).await
}

pub async fn practice_detail(
    state: &AppState,
    user_id: i64,
    practice_id: i64,
) -> Result<PracticeHistoryDetail, AppError> {
    let mut conn = state.pool.acquire().await?;
    let practice = practice_repo::find_practice(&mut conn, practice_id)
        .await?
        .filter(|p| p.user_id == user_id)
        .ok_or_else(|| AppError::NotFound(format!("Practice {} not found", practice_id)))?;
    let answers = practice_repo::list_answers(&mut conn, practice_id).await?;

    Ok(PracticeHistoryDetail { practice, answers })
}
