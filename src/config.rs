// src/config.rs

use std::env;
use dotenvy::dotenv;

/// Attempt ceiling for the administrative regeneration routines.
pub const ADMIN_MAX_ATTEMPTS: u32 = 3;

/// Valid self-assessed difficulty range (inclusive).
pub const MIN_DIFFICULTY: i64 = 1;
pub const MAX_DIFFICULTY: i64 = 6;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub jwt_expiration: u64,
    pub rust_log: String,
    pub bind_addr: String,

    /// Base URL of the AI grading server. `None` selects the built-in fake client.
    pub ai_base_url: Option<String>,
    pub ai_timeout_secs: u64,
    pub ai_retry_backoff_ms: u64,

    pub storage_dir: String,
    pub storage_public_url: String,

    pub alarm_webhook_url: Option<String>,

    /// Upper bound on concurrently running background grading tasks.
    pub grading_concurrency: usize,
}

impl Config {
    pub fn from_env() -> Self {
        dotenv().ok();

        let database_url = env::var("DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://data/exam.db?mode=rwc".to_string());

        let jwt_secret = env::var("JWT_SECRET")
            .expect("JWT_SECRET must be set");

        let rust_log = env::var("RUST_LOG")
            .unwrap_or_else(|_| "info".to_string());

        Self {
            database_url,
            jwt_secret,
            jwt_expiration: parse_or("JWT_EXPIRATION", 3600),
            rust_log,
            bind_addr: env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string()),
            ai_base_url: env::var("AI_BASE_URL").ok().filter(|v| !v.trim().is_empty()),
            ai_timeout_secs: parse_or("AI_TIMEOUT_SECS", 30),
            ai_retry_backoff_ms: parse_or("AI_RETRY_BACKOFF_MS", 500),
            storage_dir: env::var("STORAGE_DIR").unwrap_or_else(|_| "uploads".to_string()),
            storage_public_url: env::var("STORAGE_PUBLIC_URL")
                .unwrap_or_else(|_| "http://localhost:3000/files".to_string()),
            alarm_webhook_url: env::var("ALARM_WEBHOOK_URL").ok().filter(|v| !v.trim().is_empty()),
            grading_concurrency: parse_or("GRADING_CONCURRENCY", 8).max(1),
        }
    }
}

fn parse_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(raw) => raw.parse().unwrap_or_else(|_| {
            tracing::warn!("Ignoring unparsable {}={:?}, using default", key, raw);
            default
        }),
        Err(_) => default,
    }
}
