// src/state.rs

use std::sync::Arc;

use axum::extract::FromRef;
use sqlx::SqlitePool;

use crate::{
    clients::{ai::AiClient, alarm::AlarmService, storage::FileStorage},
    config::Config,
    repository::content::{ContentPool, SqlContentPool},
    utils::{locks::ExamLocks, tasks::TaskRunner},
};

/// Shared by handlers and background grading tasks.
#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub config: Config,
    pub content: Arc<dyn ContentPool>,
    pub ai: Arc<dyn AiClient>,
    pub storage: Arc<dyn FileStorage>,
    pub alarm: Arc<dyn AlarmService>,
    pub exam_locks: ExamLocks,
    pub runner: TaskRunner,
}

impl AppState {
    pub fn new(
        pool: SqlitePool,
        config: Config,
        ai: Arc<dyn AiClient>,
        storage: Arc<dyn FileStorage>,
        alarm: Arc<dyn AlarmService>,
    ) -> Self {
        let runner = TaskRunner::new(config.grading_concurrency);
        Self {
            content: Arc::new(SqlContentPool::new(pool.clone())),
            pool,
            config,
            ai,
            storage,
            alarm,
            exam_locks: ExamLocks::new(),
            runner,
        }
    }
}

impl FromRef<AppState> for SqlitePool {
    fn from_ref(state: &AppState) -> Self {
        state.pool.clone()
    }
}

impl FromRef<AppState> for Config {
    fn from_ref(state: &AppState) -> Self {
        state.config.clone()
    }
}
