// src/services/content.rs

use crate::{
    error::AppError,
    models::question::{CreateQuestionSetRequest, CreateTopicRequest, QuestionSet, QuestionType, Topic},
    repository::content as content_repo,
    state::AppState,
};

pub async fn create_topic(state: &AppState, req: &CreateTopicRequest) -> Result<Topic, AppError> {
    let mut tx = state.pool.begin().await?;
    let topic = content_repo::insert_topic(&mut tx, req.name.trim(), req.category.as_deref()).await?;
    tx.commit().await?;

    tracing::info!(topic_id = topic.id, name = %topic.name, "Topic created");
    Ok(topic)
}

/// Adds a set to the content pool.
///
/// Intro sets carry no topic, every other type needs an existing one, and the
/// number of questions must match the type.
pub async fn create_question_set(
    state: &AppState,
    req: &CreateQuestionSetRequest,
) -> Result<QuestionSet, AppError> {
    let question_type = QuestionType::from_id(req.type_id)?;

    match (question_type, req.topic_id) {
        (QuestionType::Intro, Some(_)) => {
            return Err(AppError::BadRequest(
                "Introduction sets must not reference a topic".to_string(),
            ));
        }
        (QuestionType::Intro, None) => {}
        (_, None) => {
            return Err(AppError::BadRequest(format!(
                "{:?} sets require a topic_id",
                question_type
            )));
        }
        (_, Some(_)) => {}
    }

    if req.questions.len() != question_type.expected_count() {
        return Err(AppError::BadRequest(format!(
            "{:?} sets hold exactly {} question(s), got {}",
            question_type,
            question_type.expected_count(),
            req.questions.len()
        )));
    }

    let mut tx = state.pool.begin().await?;
    if let Some(topic_id) = req.topic_id {
        content_repo::find_topic(&mut tx, topic_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Topic {} not found", topic_id)))?;
    }
    let set = content_repo::insert_question_set(
        &mut tx,
        req.level,
        req.topic_id,
        question_type,
        &req.questions,
    )
    .await?;
    tx.commit().await?;

    tracing::info!(set_id = set.id, ?question_type, level = set.level, "Question set created");
    Ok(set)
}
