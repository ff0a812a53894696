// src/handlers/survey.rs

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use validator::Validate;

use crate::{
    error::AppError,
    models::{history::SurveyView, survey::CreateSurveyRequest},
    repository::{content, survey as survey_repo},
    state::AppState,
    utils::jwt::Claims,
};

/// Records the candidate's self-assessed level and topic choices.
pub async fn create_survey(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<CreateSurveyRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload
        .validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;
    let user_id = claims.user_id()?;

    let mut tx = state.pool.begin().await?;
    let survey = survey_repo::insert(&mut tx, user_id, payload.level, &payload.topic_ids).await?;
    tx.commit().await?;

    tracing::info!(survey_id = survey.id, user_id, "Survey recorded");
    Ok((StatusCode::CREATED, Json(survey)))
}

/// A survey of the caller with its topics resolved.
pub async fn get_survey(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;

    let mut conn = state.pool.acquire().await?;
    let survey = survey_repo::find(&mut conn, id)
        .await?
        .filter(|s| s.user_id == user_id)
        .ok_or_else(|| AppError::NotFound(format!("Survey {} not found", id)))?;
    let topics = content::list_topics(&mut conn)
        .await?
        .into_iter()
        .filter(|t| survey.topic_ids.contains(&t.id))
        .collect();

    Ok(Json(SurveyView { survey, topics }))
}

/// Topics a candidate can pick in a survey.
pub async fn list_topics(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let mut conn = state.pool.acquire().await?;
    let topics = content::list_topics(&mut conn).await?;
    Ok(Json(topics))
}
