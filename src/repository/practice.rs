// src/repository/practice.rs

use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;

use crate::{
    error::AppError,
    models::{
        practice::{FeedbackStatus, Practice, PracticeAnswer, PracticeFeedback, PracticeSentenceFeedback},
        question::QuestionType,
    },
};

#[derive(sqlx::FromRow)]
struct PracticeRow {
    id: i64,
    user_id: i64,
    topic_id: i64,
    set_id: i64,
    type_id: i64,
    started_at: DateTime<Utc>,
}

impl TryFrom<PracticeRow> for Practice {
    type Error = AppError;

    fn try_from(r: PracticeRow) -> Result<Self, Self::Error> {
        Ok(Practice {
            id: r.id,
            user_id: r.user_id,
            topic_id: r.topic_id,
            set_id: r.set_id,
            question_type: QuestionType::from_id(r.type_id)?,
            started_at: r.started_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct PracticeAnswerRow {
    id: i64,
    practice_id: i64,
    question_id: i64,
    korean_script: Option<String>,
    english_script: Option<String>,
    audio_url: Option<String>,
    improved_answer: Option<String>,
    relevance_feedback: Option<String>,
    logic_feedback: Option<String>,
    fluency_feedback: Option<String>,
    feedback_status: String,
    created_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct SentenceRow {
    target_sentence: Option<String>,
    target_segment: Option<String>,
    improved_segment: Option<String>,
    comment: Option<String>,
    sentence_order: Option<i64>,
    sentence_score: Option<i64>,
}

/// Fields of a practice answer captured at submission.
#[derive(Debug, Clone)]
pub struct NewPracticeAnswer {
    pub practice_id: i64,
    pub question_id: i64,
    pub korean_script: Option<String>,
    pub english_script: Option<String>,
    pub audio_url: Option<String>,
}

pub async fn insert_practice(
    conn: &mut SqliteConnection,
    user_id: i64,
    topic_id: i64,
    set_id: i64,
    question_type: QuestionType,
) -> Result<Practice, AppError> {
    let started_at = Utc::now();
    let id = sqlx::query(
        "INSERT INTO practices (user_id, topic_id, set_id, type_id, started_at) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(user_id)
    .bind(topic_id)
    .bind(set_id)
    .bind(question_type.id())
    .bind(started_at)
    .execute(&mut *conn)
    .await?
    .last_insert_rowid();

    Ok(Practice {
        id,
        user_id,
        topic_id,
        set_id,
        question_type,
        started_at,
    })
}

pub async fn find_practice(conn: &mut SqliteConnection, id: i64) -> Result<Option<Practice>, AppError> {
    let row = sqlx::query_as::<_, PracticeRow>(
        "SELECT id, user_id, topic_id, set_id, type_id, started_at FROM practices WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;

    row.map(Practice::try_from).transpose()
}

/// The user's practices, newest first.
pub async fn list_practices(conn: &mut SqliteConnection, user_id: i64) -> Result<Vec<Practice>, AppError> {
    let rows = sqlx::query_as::<_, PracticeRow>(
        r#"
        SELECT id, user_id, topic_id, set_id, type_id, started_at
        FROM practices
        WHERE user_id = ?
        ORDER BY started_at DESC, id DESC
        "#,
    )
    .bind(user_id)
    .fetch_all(&mut *conn)
    .await?;

    rows.into_iter().map(Practice::try_from).collect()
}

pub async fn insert_answer(
    conn: &mut SqliteConnection,
    answer: &NewPracticeAnswer,
) -> Result<i64, AppError> {
    let id = sqlx::query(
        r#"
        INSERT INTO practice_answers (
            practice_id, question_id, korean_script, english_script, audio_url,
            feedback_status, created_at
        )
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(answer.practice_id)
    .bind(answer.question_id)
    .bind(&answer.korean_script)
    .bind(&answer.english_script)
    .bind(&answer.audio_url)
    .bind(FeedbackStatus::Pending.as_str())
    .bind(Utc::now())
    .execute(&mut *conn)
    .await?
    .last_insert_rowid();
    Ok(id)
}

pub async fn find_answer(
    conn: &mut SqliteConnection,
    id: i64,
) -> Result<Option<PracticeAnswer>, AppError> {
    let row = sqlx::query_as::<_, PracticeAnswerRow>(
        r#"
        SELECT id, practice_id, question_id, korean_script, english_script, audio_url,
               improved_answer, relevance_feedback, logic_feedback, fluency_feedback,
               feedback_status, created_at
        FROM practice_answers
        WHERE id = ?
        "#,
    )
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;

    let Some(row) = row else {
        return Ok(None);
    };

    let sentences = sqlx::query_as::<_, SentenceRow>(
        r#"
        SELECT target_sentence, target_segment, improved_segment, comment,
               sentence_order, sentence_score
        FROM practice_sentence_feedback
        WHERE practice_answer_id = ?
        ORDER BY id
        "#,
    )
    .bind(id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(Some(PracticeAnswer {
        id: row.id,
        practice_id: row.practice_id,
        question_id: row.question_id,
        korean_script: row.korean_script,
        english_script: row.english_script,
        audio_url: row.audio_url,
        improved_answer: row.improved_answer,
        relevance_feedback: row.relevance_feedback,
        logic_feedback: row.logic_feedback,
        fluency_feedback: row.fluency_feedback,
        feedback_status: FeedbackStatus::parse(&row.feedback_status)?,
        feedbacks: sentences
            .into_iter()
            .map(|s| PracticeSentenceFeedback {
                target_sentence: s.target_sentence,
                target_segment: s.target_segment,
                improved_segment: s.improved_segment,
                comment: s.comment,
                sentence_order: s.sentence_order,
                sentence_score: s.sentence_score,
            })
            .collect(),
        created_at: row.created_at,
    }))
}

/// Every answer of a practice in submission order.
pub async fn list_answers(
    conn: &mut SqliteConnection,
    practice_id: i64,
) -> Result<Vec<PracticeAnswer>, AppError> {
    let ids: Vec<i64> =
        sqlx::query_scalar("SELECT id FROM practice_answers WHERE practice_id = ? ORDER BY id")
            .bind(practice_id)
            .fetch_all(&mut *conn)
            .await?;

    let mut answers = Vec::with_capacity(ids.len());
    for id in ids {
        if let Some(answer) = find_answer(conn, id).await? {
            answers.push(answer);
        }
    }
    Ok(answers)
}

pub async fn update_feedback_status(
    conn: &mut SqliteConnection,
    id: i64,
    status: FeedbackStatus,
) -> Result<(), AppError> {
    let result = sqlx::query("UPDATE practice_answers SET feedback_status = ? WHERE id = ?")
        .bind(status.as_str())
        .bind(id)
        .execute(&mut *conn)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound(format!("Practice answer {} not found", id)));
    }
    Ok(())
}

/// Stores `feedback` as the answer's only feedback and marks it COMPLETED.
pub async fn apply_feedback(
    conn: &mut SqliteConnection,
    id: i64,
    feedback: &PracticeFeedback,
) -> Result<(), AppError> {
    let result = sqlx::query(
        r#"
        UPDATE practice_answers
        SET improved_answer = ?, relevance_feedback = ?, logic_feedback = ?,
            fluency_feedback = ?, feedback_status = ?
        WHERE id = ?
        "#,
    )
    .bind(&feedback.improved_answer)
    .bind(&feedback.relevance_feedback)
    .bind(&feedback.logic_feedback)
    .bind(&feedback.fluency_feedback)
    .bind(FeedbackStatus::Completed.as_str())
    .bind(id)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound(format!("Practice answer {} not found", id)));
    }

    sqlx::query("DELETE FROM practice_sentence_feedback WHERE practice_answer_id = ?")
        .bind(id)
        .execute(&mut *conn)
        .await?;

    for sentence in &feedback.sentences {
        sqlx::query(
            r#"
            INSERT INTO practice_sentence_feedback (
                practice_answer_id, target_sentence, target_segment, improved_segment,
                comment, sentence_order, sentence_score, created_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(id)
        .bind(&sentence.target_sentence)
        .bind(&sentence.target_segment)
        .bind(&sentence.improved_segment)
        .bind(&sentence.comment)
        .bind(sentence.sentence_order)
        .bind(sentence.sentence_score)
        .bind(Utc::now())
        .execute(&mut *conn)
        .await?;
    }

    Ok(())
}
