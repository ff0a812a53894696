// src/repository/content.rs

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};

use crate::{
    error::AppError,
    models::question::{CreateQuestionRequest, Question, QuestionSet, QuestionType, Topic},
};

/// Read-only lookup over drafted content.
///
/// Absence is a normal outcome and is reported as `Ok(None)`.
#[async_trait]
pub trait ContentPool: Send + Sync {
    async fn find_intro_set(&self) -> Result<Option<QuestionSet>, AppError>;

    async fn find_by_level_topic_type(
        &self,
        level: i64,
        topic_id: i64,
        question_type: QuestionType,
    ) -> Result<Option<QuestionSet>, AppError>;
}

/// `ContentPool` backed by the database. Each lookup borrows a connection
/// only for the duration of the query.
#[derive(Clone)]
pub struct SqlContentPool {
    pool: SqlitePool,
}

impl SqlContentPool {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ContentPool for SqlContentPool {
    async fn find_intro_set(&self) -> Result<Option<QuestionSet>, AppError> {
        let mut conn = self.pool.acquire().await?;
        find_intro_set(&mut conn).await
    }

    async fn find_by_level_topic_type(
        &self,
        level: i64,
        topic_id: i64,
        question_type: QuestionType,
    ) -> Result<Option<QuestionSet>, AppError> {
        let mut conn = self.pool.acquire().await?;
        find_by_level_topic_type(&mut conn, level, topic_id, question_type).await
    }
}

#[derive(sqlx::FromRow)]
struct QuestionSetRow {
    id: i64,
    level: i64,
    topic_id: Option<i64>,
    type_id: i64,
    created_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct QuestionRow {
    id: i64,
    question_text: String,
    audio_url: String,
    order_index: i64,
}

impl From<QuestionRow> for Question {
    fn from(row: QuestionRow) -> Self {
        Question {
            id: row.id,
            question_text: row.question_text,
            audio_url: row.audio_url,
            order: row.order_index,
        }
    }
}

async fn load_set(conn: &mut SqliteConnection, row: QuestionSetRow) -> Result<QuestionSet, AppError> {
    // Reject unknown tags before touching the questions.
    let question_type = QuestionType::from_id(row.type_id)?;

    let questions = sqlx::query_as::<_, QuestionRow>(
        "SELECT id, question_text, audio_url, order_index FROM questions WHERE set_id = ? ORDER BY order_index, id",
    )
    .bind(row.id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(QuestionSet {
        id: row.id,
        level: row.level,
        topic_id: row.topic_id,
        question_type,
        questions: questions.into_iter().map(Question::from).collect(),
        created_at: row.created_at,
    })
}

pub async fn insert_topic(
    conn: &mut SqliteConnection,
    name: &str,
    category: Option<&str>,
) -> Result<Topic, AppError> {
    let id = sqlx::query("INSERT INTO topics (name, category, created_at) VALUES (?, ?, ?)")
        .bind(name)
        .bind(category)
        .bind(Utc::now())
        .execute(&mut *conn)
        .await?
        .last_insert_rowid();

    Ok(Topic {
        id,
        name: name.to_string(),
        category: category.map(str::to_string),
    })
}

pub async fn find_topic(conn: &mut SqliteConnection, id: i64) -> Result<Option<Topic>, AppError> {
    let topic = sqlx::query_as::<_, Topic>("SELECT id, name, category FROM topics WHERE id = ?")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(topic)
}

pub async fn list_topics(conn: &mut SqliteConnection) -> Result<Vec<Topic>, AppError> {
    let topics = sqlx::query_as::<_, Topic>("SELECT id, name, category FROM topics ORDER BY id")
        .fetch_all(&mut *conn)
        .await?;
    Ok(topics)
}

/// Keeps the ids in `ids` that name an existing topic, preserving order.
pub async fn existing_topic_ids(
    conn: &mut SqliteConnection,
    ids: &[i64],
) -> Result<Vec<i64>, AppError> {
    let known: Vec<i64> = sqlx::query_scalar("SELECT id FROM topics")
        .fetch_all(&mut *conn)
        .await?;
    Ok(ids.iter().copied().filter(|id| known.contains(id)).collect())
}

/// Inserts a set and its questions; question order follows `questions`.
pub async fn insert_question_set(
    conn: &mut SqliteConnection,
    level: i64,
    topic_id: Option<i64>,
    question_type: QuestionType,
    questions: &[CreateQuestionRequest],
) -> Result<QuestionSet, AppError> {
    let created_at = Utc::now();
    let set_id = sqlx::query(
        "INSERT INTO question_sets (level, topic_id, type_id, created_at) VALUES (?, ?, ?, ?)",
    )
    .bind(level)
    .bind(topic_id)
    .bind(question_type.id())
    .bind(created_at)
    .execute(&mut *conn)
    .await?
    .last_insert_rowid();

    let mut stored = Vec::with_capacity(questions.len());
    for (idx, q) in questions.iter().enumerate() {
        let order = idx as i64 + 1;
        let id = sqlx::query(
            "INSERT INTO questions (set_id, question_text, audio_url, order_index) VALUES (?, ?, ?, ?)",
        )
        .bind(set_id)
        .bind(&q.question_text)
        .bind(&q.audio_url)
        .bind(order)
        .execute(&mut *conn)
        .await?
        .last_insert_rowid();

        stored.push(Question {
            id,
            question_text: q.question_text.clone(),
            audio_url: q.audio_url.clone(),
            order,
        });
    }

    Ok(QuestionSet {
        id: set_id,
        level,
        topic_id,
        question_type,
        questions: stored,
        created_at,
    })
}

pub async fn find_question_set(
    conn: &mut SqliteConnection,
    id: i64,
) -> Result<Option<QuestionSet>, AppError> {
    let row = sqlx::query_as::<_, QuestionSetRow>(
        "SELECT id, level, topic_id, type_id, created_at FROM question_sets WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;

    match row {
        Some(row) => Ok(Some(load_set(conn, row).await?)),
        None => Ok(None),
    }
}

/// The canonical introduction set: the oldest INTRO set.
pub async fn find_intro_set(conn: &mut SqliteConnection) -> Result<Option<QuestionSet>, AppError> {
    let row = sqlx::query_as::<_, QuestionSetRow>(
        "SELECT id, level, topic_id, type_id, created_at FROM question_sets WHERE type_id = ? ORDER BY id LIMIT 1",
    )
    .bind(QuestionType::Intro.id())
    .fetch_optional(&mut *conn)
    .await?;

    match row {
        Some(row) => Ok(Some(load_set(conn, row).await?)),
        None => Ok(None),
    }
}

/// A random set matching `(level, topic, type)`, if any.
pub async fn find_by_level_topic_type(
    conn: &mut SqliteConnection,
    level: i64,
    topic_id: i64,
    question_type: QuestionType,
) -> Result<Option<QuestionSet>, AppError> {
    let row = sqlx::query_as::<_, QuestionSetRow>(
        r#"
        SELECT id, level, topic_id, type_id, created_at
        FROM question_sets
        WHERE level = ? AND topic_id = ? AND type_id = ?
        ORDER BY RANDOM()
        LIMIT 1
        "#,
    )
    .bind(level)
    .bind(topic_id)
    .bind(question_type.id())
    .fetch_optional(&mut *conn)
    .await?;

    match row {
        Some(row) => Ok(Some(load_set(conn, row).await?)),
        None => Ok(None),
    }
}

/// A question together with the id of the set that owns it.
pub async fn find_question(
    conn: &mut SqliteConnection,
    id: i64,
) -> Result<Option<(Question, i64)>, AppError> {
    #[derive(sqlx::FromRow)]
    struct Row {
        id: i64,
        set_id: i64,
        question_text: String,
        audio_url: String,
        order_index: i64,
    }

    let row = sqlx::query_as::<_, Row>(
        "SELECT id, set_id, question_text, audio_url, order_index FROM questions WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(row.map(|r| {
        (
            Question {
                id: r.id,
                question_text: r.question_text,
                audio_url: r.audio_url,
                order: r.order_index,
            },
            r.set_id,
        )
    }))
}
