// src/handlers/practice.rs

use axum::{
    Extension, Json,
    extract::{Multipart, Path, State},
    http::StatusCode,
    response::IntoResponse,
};

use crate::{
    error::AppError,
    handlers::AnswerForm,
    models::practice::CreatePracticeRequest,
    services::practice as practice_service,
    state::AppState,
    utils::jwt::Claims,
};

pub async fn create_practice(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<CreatePracticeRequest>,
) -> Result<impl IntoResponse, AppError> {
    let view = practice_service::create_practice(&state, claims.user_id()?, &payload).await?;
    Ok((StatusCode::CREATED, Json(view)))
}

/// Multipart: optional `file`, `question_id`, `english_script`, `korean_script`.
pub async fn submit_answer(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(practice_id): Path<i64>,
    multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;
    let mut form = AnswerForm::parse(multipart).await?;
    let question_id = form.required_i64("question_id")?;
    let english_script = form.text("english_script");
    let korean_script = form.text("korean_script");

    if english_script.is_none() {
        return Err(AppError::BadRequest("Missing field 'english_script'".to_string()));
    }

    let submission = practice_service::submit_answer(
        &state,
        user_id,
        practice_id,
        question_id,
        form.file.take(),
        english_script,
        korean_script,
    )
    .await?;
    Ok((StatusCode::ACCEPTED, Json(submission)))
}

/// Feedback of one practice answer; full content only once completed.
pub async fn get_feedback(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(answer_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let result = practice_service::get_feedback(&state, claims.user_id()?, answer_id).await?;
    Ok(Json(result))
}
