// src/handlers/exam.rs

use axum::{
    Extension, Json,
    extract::{Multipart, Path, State},
    http::StatusCode,
    response::IntoResponse,
};

use crate::{
    error::AppError,
    handlers::AnswerForm,
    models::exam::{AdjustDifficultyRequest, StartExamRequest},
    services::exam as exam_service,
    state::AppState,
    utils::jwt::Claims,
};

/// Starts an exam and returns its first seven questions.
pub async fn start_exam(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<StartExamRequest>,
) -> Result<impl IntoResponse, AppError> {
    let view = exam_service::start_exam(&state, claims.user_id()?, payload.survey_id).await?;
    Ok((StatusCode::CREATED, Json(view)))
}

pub async fn get_exam(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let view = exam_service::get_exam(&state, claims.user_id()?, id).await?;
    Ok(Json(view))
}

/// Mid-exam checkpoint. Returns the newly drafted questions.
pub async fn adjust_difficulty(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
    Json(payload): Json<AdjustDifficultyRequest>,
) -> Result<impl IntoResponse, AppError> {
    let batch = exam_service::adjust_difficulty(&state, claims.user_id()?, id, payload.level).await?;
    Ok(Json(batch))
}

/// Multipart: `file` (audio) and `stt_text`.
pub async fn submit_answer(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path((id, order)): Path<(i64, i64)>,
    multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;
    let mut form = AnswerForm::parse(multipart).await?;
    let stt_text = form.required_text("stt_text")?;
    let file = form
        .file
        .take()
        .ok_or_else(|| AppError::BadRequest("Missing audio file".to_string()))?;

    let answer = exam_service::submit_answer(&state, user_id, id, order, file, stt_text).await?;
    Ok((StatusCode::ACCEPTED, Json(answer)))
}

pub async fn complete_exam(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let view = exam_service::complete_exam(&state, claims.user_id()?, id).await?;
    Ok(Json(view))
}

pub async fn get_report(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let report = exam_service::get_report(&state, claims.user_id()?, id).await?;
    Ok(Json(report))
}
