// src/handlers/admin.rs

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde_json::json;
use validator::Validate;

use crate::{
    error::AppError,
    models::question::{CreateQuestionSetRequest, CreateTopicRequest},
    services::{admin as admin_service, content as content_service},
    state::AppState,
};

/// Creates a topic.
/// Admin only.
pub async fn create_topic(
    State(state): State<AppState>,
    Json(payload): Json<CreateTopicRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload
        .validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let topic = content_service::create_topic(&state, &payload).await?;
    Ok((StatusCode::CREATED, Json(topic)))
}

/// Creates a question set with its questions.
/// Admin only.
pub async fn create_question_set(
    State(state): State<AppState>,
    Json(payload): Json<CreateQuestionSetRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload
        .validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let set = content_service::create_question_set(&state, &payload).await?;
    Ok((StatusCode::CREATED, Json(set)))
}

/// Regenerates the exam report in the background.
/// Admin only.
pub async fn recreate_report(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    admin_service::request_report_recreation(&state, id).await?;
    Ok((
        StatusCode::ACCEPTED,
        Json(json!({ "message": "Report regeneration scheduled", "exam_id": id })),
    ))
}

/// Re-analyzes one exam answer in the background.
/// Admin only.
pub async fn reanalyze_answer(
    State(state): State<AppState>,
    Path((id, order)): Path<(i64, i64)>,
) -> Result<impl IntoResponse, AppError> {
    admin_service::request_answer_reanalysis(&state, id, order).await?;
    Ok((
        StatusCode::ACCEPTED,
        Json(json!({
            "message": "Answer re-analysis scheduled",
            "exam_id": id,
            "question_order": order
        })),
    ))
}
