// src/repository/report.rs

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, types::Json};

use crate::{error::AppError, models::report::ExamReport};

#[derive(sqlx::FromRow)]
struct ReportRow {
    exam_id: i64,
    avg_grammar: f64,
    avg_vocab: f64,
    avg_logic: f64,
    avg_fluency: f64,
    avg_relevance: f64,
    total_score: f64,
    grade: String,
    predicted_level: Option<String>,
    comment: String,
    strength_type: String,
    weakness_type: String,
    strengths: Json<Vec<String>>,
    improvements: Json<Vec<String>>,
    created_at: DateTime<Utc>,
}

impl From<ReportRow> for ExamReport {
    fn from(row: ReportRow) -> Self {
        ExamReport {
            exam_id: row.exam_id,
            avg_grammar: row.avg_grammar,
            avg_vocab: row.avg_vocab,
            avg_logic: row.avg_logic,
            avg_fluency: row.avg_fluency,
            avg_relevance: row.avg_relevance,
            total_score: row.total_score,
            grade: row.grade,
            predicted_level: row.predicted_level,
            comment: row.comment,
            strength_type: row.strength_type,
            weakness_type: row.weakness_type,
            strengths: row.strengths.0,
            improvements: row.improvements.0,
            created_at: row.created_at,
        }
    }
}

/// Removes the report of `exam_id`. Returns whether one existed.
pub async fn delete(conn: &mut SqliteConnection, exam_id: i64) -> Result<bool, AppError> {
    let result = sqlx::query("DELETE FROM exam_reports WHERE exam_id = ?")
        .bind(exam_id)
        .execute(&mut *conn)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn insert(conn: &mut SqliteConnection, report: &ExamReport) -> Result<(), AppError> {
    sqlx::query(
        r#"
        INSERT INTO exam_reports (
            exam_id, avg_grammar, avg_vocab, avg_logic, avg_fluency, avg_relevance,
            total_score, grade, predicted_level, comment, strength_type, weakness_type,
            strengths, improvements, created_at
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(report.exam_id)
    .bind(report.avg_grammar)
    .bind(report.avg_vocab)
    .bind(report.avg_logic)
    .bind(report.avg_fluency)
    .bind(report.avg_relevance)
    .bind(report.total_score)
    .bind(&report.grade)
    .bind(&report.predicted_level)
    .bind(&report.comment)
    .bind(&report.strength_type)
    .bind(&report.weakness_type)
    .bind(Json(&report.strengths))
    .bind(Json(&report.improvements))
    .bind(report.created_at)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

pub async fn find(conn: &mut SqliteConnection, exam_id: i64) -> Result<Option<ExamReport>, AppError> {
    let row = sqlx::query_as::<_, ReportRow>(
        r#"
        SELECT exam_id, avg_grammar, avg_vocab, avg_logic, avg_fluency, avg_relevance,
               total_score, grade, predicted_level, comment, strength_type, weakness_type,
               strengths, improvements, created_at
        FROM exam_reports
        WHERE exam_id = ?
        "#,
    )
    .bind(exam_id)
    .fetch_optional(&mut *conn)
    .await?;
    Ok(row.map(ExamReport::from))
}

pub async fn count_for_exam(conn: &mut SqliteConnection, exam_id: i64) -> Result<i64, AppError> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM exam_reports WHERE exam_id = ?")
        .bind(exam_id)
        .fetch_one(&mut *conn)
        .await?;
    Ok(count)
}
