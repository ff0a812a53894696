// src/services/practice.rs

use crate::{
    clients::storage::UploadFile,
    error::AppError,
    models::{
        practice::{
            CreatePracticeRequest, FeedbackStatus, PracticeFeedbackResult, PracticeSubmission,
            PracticeView,
        },
        question::QuestionType,
    },
    repository::{
        content,
        practice::{self as practice_repo, NewPracticeAnswer},
        survey as survey_repo,
    },
    services::grading,
    state::AppState,
};

const AUDIO_DOMAIN: &str = "practice";

/// Starts a single-set practice at the candidate's surveyed level.
pub async fn create_practice(
    state: &AppState,
    user_id: i64,
    req: &CreatePracticeRequest,
) -> Result<PracticeView, AppError> {
    if req.question_type == QuestionType::Intro {
        return Err(AppError::BadRequest(
            "Practice is not available for the introduction".to_string(),
        ));
    }

    let mut tx = state.pool.begin().await?;
    let survey = survey_repo::find(&mut tx, req.survey_id)
        .await?
        .filter(|s| s.user_id == user_id)
        .ok_or_else(|| AppError::NotFound(format!("Survey {} not found", req.survey_id)))?;
    content::find_topic(&mut tx, req.topic_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Topic {} not found", req.topic_id)))?;

    let set = content::find_by_level_topic_type(&mut tx, survey.level, req.topic_id, req.question_type)
        .await?
        .ok_or_else(|| {
            AppError::AllocationFailed(format!(
                "no {:?} set at level {} for topic {}",
                req.question_type, survey.level, req.topic_id
            ))
        })?;

    let practice =
        practice_repo::insert_practice(&mut tx, user_id, req.topic_id, set.id, req.question_type).await?;
    tx.commit().await?;

    tracing::info!(practice_id = practice.id, user_id, set_id = set.id, "Practice started");
    Ok(PracticeView {
        practice,
        questions: set.questions,
    })
}

/// Stores a practice answer and queues its live grading.
pub async fn submit_answer(
    state: &AppState,
    user_id: i64,
    practice_id: i64,
    question_id: i64,
    file: Option<UploadFile>,
    english_script: Option<String>,
    korean_script: Option<String>,
) -> Result<PracticeSubmission, AppError> {
    {
        let mut conn = state.pool.acquire().await?;
        let practice = practice_repo::find_practice(&mut conn, practice_id)
            .await?
            .filter(|p| p.user_id == user_id)
            .ok_or_else(|| AppError::NotFound(format!("Practice {} not found", practice_id)))?;
        let (_, set_id) = content::find_question(&mut conn, question_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Question {} not found", question_id)))?;

        if set_id != practice.set_id {
            return Err(AppError::BadRequest(format!(
                "Question {} is not part of practice {}",
                question_id, practice_id
            )));
        }
    }

    let audio_url = match &file {
        Some(file) => Some(state.storage.upload(file, AUDIO_DOMAIN).await?),
        None => None,
    };

    let mut tx = state.pool.begin().await?;
    let answer_id = practice_repo::insert_answer(
        &mut tx,
        &NewPracticeAnswer {
            practice_id,
            question_id,
            korean_script,
            english_script,
            audio_url,
        },
    )
    .await?;
    tx.commit().await?;

    let task_state = state.clone();
    state.runner.spawn("practice_answer", async move {
        grading::grade_practice_answer(&task_state, answer_id).await;
    });

    Ok(PracticeSubmission {
        answer_id,
        feedback_status: FeedbackStatus::Pending,
    })
}

pub async fn get_feedback(
    state: &AppState,
    user_id: i64,
    answer_id: i64,
) -> Result<PracticeFeedbackResult, AppError> {
    let mut conn = state.pool.acquire().await?;
    let answer = practice_repo::find_answer(&mut conn, answer_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Practice answer {} not found", answer_id)))?;

    practice_repo::find_practice(&mut conn, answer.practice_id)
        .await?
        .filter(|p| p.user_id == user_id)
        .ok_or_else(|| AppError::NotFound(format!("Practice answer {} not found", answer_id)))?;

    Ok(answer.into())
}
