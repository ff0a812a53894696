// src/handlers/history.rs

use axum::{
    Extension, Json,
    extract::{Path, State},
    response::IntoResponse,
};

use crate::{error::AppError, services::history, state::AppState, utils::jwt::Claims};

/// The caller's exams, newest first.
pub async fn list_exams(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let exams = history::list_exams(&state, claims.user_id()?).await?;
    Ok(Json(exams))
}

pub async fn get_exam(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let detail = history::exam_detail(&state, claims.user_id()?, id).await?;
    Ok(Json(detail))
}

pub async fn get_exam_answer(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path((id, order)): Path<(i64, i64)>,
) -> Result<impl IntoResponse, AppError> {
    let answer = history::exam_answer(&state, claims.user_id()?, id, order).await?;
    Ok(Json(answer))
}

pub async fn list_practices(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let practices = history::list_practices(&state, claims.user_id()?).await?;
    Ok(Json(practices))
}

pub async fn get_practice(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let detail = history::practice_detail(&state, claims.user_id()?, id).await?;
    Ok(Json(detail))
}
