// src/repository/exam.rs

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, types::Json};

use crate::{
    error::AppError,
    models::{
        exam::{Exam, ExamStatus, TopicRotation},
        history::ExamSummary,
    },
    repository::content,
};

#[derive(sqlx::FromRow)]
struct ExamRow {
    id: i64,
    user_id: i64,
    survey_id: i64,
    initial_difficulty: i64,
    adjusted_difficulty: Option<i64>,
    topic_order: Json<Vec<i64>>,
    topic_cursor: i64,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    end_at: Option<DateTime<Utc>>,
}

#[derive(sqlx::FromRow)]
struct SummaryRow {
    id: i64,
    initial_difficulty: i64,
    adjusted_difficulty: Option<i64>,
    status: String,
    created_at: DateTime<Utc>,
    end_at: Option<DateTime<Utc>>,
}

/// Inserts a new exam with its drafted sets and returns the assigned id.
pub async fn insert(conn: &mut SqliteConnection, exam: &Exam) -> Result<i64, AppError> {
    let id = sqlx::query(
        r#"
        INSERT INTO exams (
            user_id, survey_id, initial_difficulty, adjusted_difficulty,
            topic_order, topic_cursor, status, created_at, updated_at, end_at
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(exam.user_id)
    .bind(exam.survey_id)
    .bind(exam.initial_difficulty)
    .bind(exam.adjusted_difficulty())
    .bind(Json(exam.rotation.order()))
    .bind(exam.rotation.cursor())
    .bind(exam.status.as_str())
    .bind(exam.created_at)
    .bind(exam.updated_at)
    .bind(exam.end_at())
    .execute(&mut *conn)
    .await?
    .last_insert_rowid();

    replace_sets(conn, id, exam).await?;
    Ok(id)
}

/// Writes back every mutable column and the drafted set history.
pub async fn save(conn: &mut SqliteConnection, exam: &Exam) -> Result<(), AppError> {
    let result = sqlx::query(
        r#"
        UPDATE exams
        SET adjusted_difficulty = ?, topic_order = ?, topic_cursor = ?,
            status = ?, updated_at = ?, end_at = ?
        WHERE id = ?
        "#,
    )
    .bind(exam.adjusted_difficulty())
    .bind(Json(exam.rotation.order()))
    .bind(exam.rotation.cursor())
    .bind(exam.status.as_str())
    .bind(exam.updated_at)
    .bind(exam.end_at())
    .bind(exam.id)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound(format!("Exam {} not found", exam.id)));
    }

    replace_sets(conn, exam.id, exam).await
}

async fn replace_sets(conn: &mut SqliteConnection, exam_id: i64, exam: &Exam) -> Result<(), AppError> {
    sqlx::query("DELETE FROM exam_question_sets WHERE exam_id = ?")
        .bind(exam_id)
        .execute(&mut *conn)
        .await?;

    for (position, set) in exam.question_sets.iter().enumerate() {
        sqlx::query("INSERT INTO exam_question_sets (exam_id, position, set_id) VALUES (?, ?, ?)")
            .bind(exam_id)
            .bind(position as i64)
            .bind(set.id)
            .execute(&mut *conn)
            .await?;
    }
    Ok(())
}

pub async fn update_status(
    conn: &mut SqliteConnection,
    exam_id: i64,
    status: ExamStatus,
) -> Result<(), AppError> {
    sqlx::query("UPDATE exams SET status = ?, updated_at = ? WHERE id = ?")
        .bind(status.as_str())
        .bind(Utc::now())
        .bind(exam_id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

pub async fn find(conn: &mut SqliteConnection, id: i64) -> Result<Option<Exam>, AppError> {
    let row = sqlx::query_as::<_, ExamRow>(
        r#"
        SELECT id, user_id, survey_id, initial_difficulty, adjusted_difficulty,
               topic_order, topic_cursor, status, created_at, updated_at, end_at
        FROM exams
        WHERE id = ?
        "#,
    )
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;

    let Some(row) = row else {
        return Ok(None);
    };

    let set_ids: Vec<i64> = sqlx::query_scalar(
        "SELECT set_id FROM exam_question_sets WHERE exam_id = ? ORDER BY position",
    )
    .bind(id)
    .fetch_all(&mut *conn)
    .await?;

    let mut question_sets = Vec::with_capacity(set_ids.len());
    for set_id in set_ids {
        let set = content::find_question_set(conn, set_id)
            .await?
            .ok_or_else(|| {
                AppError::InternalServerError(format!(
                    "Exam {} references missing question set {}",
                    id, set_id
                ))
            })?;
        question_sets.push(set);
    }

    Ok(Some(Exam::restore(
        row.id,
        row.user_id,
        row.survey_id,
        row.initial_difficulty,
        row.adjusted_difficulty,
        TopicRotation::new(row.topic_order.0, row.topic_cursor),
        question_sets,
        ExamStatus::parse(&row.status)?,
        row.created_at,
        row.updated_at,
        row.end_at,
    )))
}

/// The user's exams, newest first.
pub async fn list_for_user(conn: &mut SqliteConnection, user_id: i64) -> Result<Vec<ExamSummary>, AppError> {
    let rows = sqlx::query_as::<_, SummaryRow>(
        r#"
        SELECT id, initial_difficulty, adjusted_difficulty, status, created_at, end_at
        FROM exams
        WHERE user_id = ?
        ORDER BY created_at DESC, id DESC
        "#,
    )
    .bind(user_id)
    .fetch_all(&mut *conn)
    .await?;

    rows.into_iter()
        .map(|r| {
            Ok(ExamSummary {
                id: r.id,
                status: ExamStatus::parse(&r.status)?,
                initial_difficulty: r.initial_difficulty,
                adjusted_difficulty: r.adjusted_difficulty,
                completed: r.end_at.is_some(),
                created_at: r.created_at,
                end_at: r.end_at,
            })
        })
        .collect()
}
