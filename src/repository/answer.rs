// src/repository/answer.rs

use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;

use crate::{
    error::AppError,
    models::exam_answer::{AnswerScores, AnswerStatus, CategoryFeedback, ExamAnswer, SentenceFeedback},
};

#[derive(sqlx::FromRow)]
struct AnswerRow {
    exam_id: i64,
    question_order: i64,
    audio_url: Option<String>,
    stt_script: Option<String>,
    improved_answer: Option<String>,
    grammar_score: Option<i64>,
    vocab_score: Option<i64>,
    logic_score: Option<i64>,
    fluency_score: Option<i64>,
    relevance_score: Option<i64>,
    logic_feedback: Option<String>,
    fluency_feedback: Option<String>,
    relevance_feedback: Option<String>,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct SentenceRow {
    target_sentence: Option<String>,
    target_segment: Option<String>,
    corrected_segment: Option<String>,
    comment: Option<String>,
    sentence_order: Option<i64>,
}

const SELECT_ANSWER: &str = r#"
    SELECT exam_id, question_order, audio_url, stt_script, improved_answer,
           grammar_score, vocab_score, logic_score, fluency_score, relevance_score,
           logic_feedback, fluency_feedback, relevance_feedback,
           status, created_at, updated_at
    FROM exam_answers
"#;

async fn hydrate(conn: &mut SqliteConnection, row: AnswerRow) -> Result<ExamAnswer, AppError> {
    let sentences = sqlx::query_as::<_, SentenceRow>(
        r#"
        SELECT target_sentence, target_segment, corrected_segment, comment, sentence_order
        FROM exam_sentence_feedback
        WHERE exam_id = ? AND question_order = ?
        ORDER BY id
        "#,
    )
    .bind(row.exam_id)
    .bind(row.question_order)
    .fetch_all(&mut *conn)
    .await?;

    let scores = match (
        row.grammar_score,
        row.vocab_score,
        row.logic_score,
        row.fluency_score,
        row.relevance_score,
    ) {
        (Some(grammar), Some(vocab), Some(logic), Some(fluency), Some(relevance)) => {
            Some(AnswerScores {
                grammar,
                vocab,
                logic,
                fluency,
                relevance,
            })
        }
        _ => None,
    };

    Ok(ExamAnswer {
        exam_id: row.exam_id,
        question_order: row.question_order,
        audio_url: row.audio_url,
        stt_script: row.stt_script,
        improved_answer: row.improved_answer,
        scores,
        feedback: CategoryFeedback {
            logic: row.logic_feedback,
            fluency: row.fluency_feedback,
            relevance: row.relevance_feedback,
        },
        sentence_feedbacks: sentences
            .into_iter()
            .map(|s| SentenceFeedback {
                target_sentence: s.target_sentence,
                target_segment: s.target_segment,
                corrected_segment: s.corrected_segment,
                comment: s.comment,
                sentence_order: s.sentence_order,
            })
            .collect(),
        status: AnswerStatus::parse(&row.status)?,
        created_at: row.created_at,
        updated_at: row.updated_at,
    })
}

pub async fn find(
    conn: &mut SqliteConnection,
    exam_id: i64,
    question_order: i64,
) -> Result<Option<ExamAnswer>, AppError> {
    let row = sqlx::query_as::<_, AnswerRow>(&format!(
        "{} WHERE exam_id = ? AND question_order = ?",
        SELECT_ANSWER
    ))
    .bind(exam_id)
    .bind(question_order)
    .fetch_optional(&mut *conn)
    .await?;

    match row {
        Some(row) => Ok(Some(hydrate(conn, row).await?)),
        None => Ok(None),
    }
}

pub async fn list_for_exam(
    conn: &mut SqliteConnection,
    exam_id: i64,
) -> Result<Vec<ExamAnswer>, AppError> {
    let rows = sqlx::query_as::<_, AnswerRow>(&format!(
        "{} WHERE exam_id = ? ORDER BY question_order",
        SELECT_ANSWER
    ))
    .bind(exam_id)
    .fetch_all(&mut *conn)
    .await?;

    let mut answers = Vec::with_capacity(rows.len());
    for row in rows {
        answers.push(hydrate(conn, row).await?);
    }
    Ok(answers)
}

/// Upserts the answer and replaces its sentence feedback wholesale.
pub async fn save(conn: &mut SqliteConnection, answer: &ExamAnswer) -> Result<(), AppError> {
    let scores = answer.scores;
    sqlx::query(
        r#"
        INSERT INTO exam_answers (
            exam_id, question_order, audio_url, stt_script, improved_answer,
            grammar_score, vocab_score, logic_score, fluency_score, relevance_score,
            logic_feedback, fluency_feedback, relevance_feedback,
            status, created_at, updated_at
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT (exam_id, question_order) DO UPDATE SET
            audio_url = excluded.audio_url,
            stt_script = excluded.stt_script,
            improved_answer = excluded.improved_answer,
            grammar_score = excluded.grammar_score,
            vocab_score = excluded.vocab_score,
            logic_score = excluded.logic_score,
            fluency_score = excluded.fluency_score,
            relevance_score = excluded.relevance_score,
            logic_feedback = excluded.logic_feedback,
            fluency_feedback = excluded.fluency_feedback,
            relevance_feedback = excluded.relevance_feedback,
            status = excluded.status,
            created_at = excluded.created_at,
            updated_at = excluded.updated_at
        "#,
    )
    .bind(answer.exam_id)
    .bind(answer.question_order)
    .bind(&answer.audio_url)
    .bind(&answer.stt_script)
    .bind(&answer.improved_answer)
    .bind(scores.map(|s| s.grammar))
    .bind(scores.map(|s| s.vocab))
    .bind(scores.map(|s| s.logic))
    .bind(scores.map(|s| s.fluency))
    .bind(scores.map(|s| s.relevance))
    .bind(&answer.feedback.logic)
    .bind(&answer.feedback.fluency)
    .bind(&answer.feedback.relevance)
    .bind(answer.status.as_str())
    .bind(answer.created_at)
    .bind(answer.updated_at)
    .execute(&mut *conn)
    .await?;

    sqlx::query("DELETE FROM exam_sentence_feedback WHERE exam_id = ? AND question_order = ?")
        .bind(answer.exam_id)
        .bind(answer.question_order)
        .execute(&mut *conn)
        .await?;

    for sentence in &answer.sentence_feedbacks {
        sqlx::query(
            r#"
            INSERT INTO exam_sentence_feedback (
                exam_id, question_order, target_sentence, target_segment,
                corrected_segment, comment, sentence_order, created_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(answer.exam_id)
        .bind(answer.question_order)
        .bind(&sentence.target_sentence)
        .bind(&sentence.target_segment)
        .bind(&sentence.corrected_segment)
        .bind(&sentence.comment)
        .bind(sentence.sentence_order)
        .bind(Utc::now())
        .execute(&mut *conn)
        .await?;
    }

    Ok(())
}

/// Overwrites only the status column.
pub async fn update_status(
    conn: &mut SqliteConnection,
    exam_id: i64,
    question_order: i64,
    status: AnswerStatus,
) -> Result<(), AppError> {
    let result = sqlx::query(
        "UPDATE exam_answers SET status = ?, updated_at = ? WHERE exam_id = ? AND question_order = ?",
    )
    .bind(status.as_str())
    .bind(Utc::now())
    .bind(exam_id)
    .bind(question_order)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound(format!(
            "Answer {} of exam {} not found",
            question_order, exam_id
        )));
    }
    Ok(())
}
