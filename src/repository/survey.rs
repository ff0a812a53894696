// src/repository/survey.rs

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, types::Json};

use crate::{error::AppError, models::survey::Survey};

#[derive(sqlx::FromRow)]
struct SurveyRow {
    id: i64,
    user_id: i64,
    level: i64,
    topic_ids: Json<Vec<i64>>,
    created_at: DateTime<Utc>,
}

impl From<SurveyRow> for Survey {
    fn from(row: SurveyRow) -> Self {
        Survey {
            id: row.id,
            user_id: row.user_id,
            level: row.level,
            topic_ids: row.topic_ids.0,
            created_at: row.created_at,
        }
    }
}

pub async fn insert(
    conn: &mut SqliteConnection,
    user_id: i64,
    level: i64,
    topic_ids: &[i64],
) -> Result<Survey, AppError> {
    let created_at = Utc::now();
    let id = sqlx::query(
        "INSERT INTO surveys (user_id, level, topic_ids, created_at) VALUES (?, ?, ?, ?)",
    )
    .bind(user_id)
    .bind(level)
    .bind(Json(topic_ids))
    .bind(created_at)
    .execute(&mut *conn)
    .await?
    .last_insert_rowid();

    Ok(Survey {
        id,
        user_id,
        level,
        topic_ids: topic_ids.to_vec(),
        created_at,
    })
}

pub async fn find(conn: &mut SqliteConnection, id: i64) -> Result<Option<Survey>, AppError> {
    let row = sqlx::query_as::<_, SurveyRow>(
        "SELECT id, user_id, level, topic_ids, created_at FROM surveys WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;
    Ok(row.map(Survey::from))
}
