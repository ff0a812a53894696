// src/main.rs

use std::{str::FromStr, sync::Arc, time::Duration};

use dotenvy::dotenv;
use exam_backend::{
    clients::{
        ai::{AiClient, FakeAiClient, HttpAiClient},
        alarm::{AlarmService, LogAlarm, WebhookAlarm},
        storage::LocalFileStorage,
    },
    config::Config,
    routes,
    state::AppState,
};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    // Load .env file (if present)
    dotenv().ok();

    // Load configuration from environment
    let config = Config::from_env();

    let file_appender = tracing_appender::rolling::daily("logs", "app.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    let env_filter = EnvFilter::new(&config.rust_log);
    let stdout_layer = fmt::layer().with_writer(std::io::stdout).with_target(false);
    let file_layer = fmt::layer().with_writer(non_blocking).with_ansi(false);

    // Initialize Tracing (Logging)
    tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_layer)
        .with(file_layer)
        .init();

    let connect_options = SqliteConnectOptions::from_str(&config.database_url)
        .expect("DATABASE_URL must be a valid sqlite URL")
        .create_if_missing(true)
        .foreign_keys(true);

    if let Some(parent) = connect_options.get_filename().parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).expect("Failed to create database directory");
        }
    }

    // Initialize Database Pool with Retry
    let mut retry_count = 0;
    let pool = loop {
        match SqlitePoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(3))
            .connect_with(connect_options.clone())
            .await
        {
            Ok(pool) => break pool,
            Err(e) => {
                retry_count += 1;
                if retry_count > 5 {
                    panic!("Failed to open database after 5 retries: {}", e);
                }
                tracing::warn!("Database not ready, retrying in 2s... (Attempt {})", retry_count);
                tokio::time::sleep(Duration::from_secs(2)).await;
            }
        }
    };

    tracing::info!("Database connected...");

    // Run Migrations Automatically
    tracing::info!("Running migrations...");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to run database migrations");
    tracing::info!("Migrations applied successfully.");

    let ai: Arc<dyn AiClient> = match &config.ai_base_url {
        Some(url) => {
            tracing::info!("Using AI server at {}", url);
            Arc::new(
                HttpAiClient::new(url, Duration::from_secs(config.ai_timeout_secs))
                    .expect("Failed to build AI client"),
            )
        }
        None => {
            tracing::warn!("AI_BASE_URL not set, using the fake AI client");
            Arc::new(FakeAiClient)
        }
    };

    let alarm: Arc<dyn AlarmService> = match &config.alarm_webhook_url {
        Some(url) => Arc::new(WebhookAlarm::new(url.clone())),
        None => Arc::new(LogAlarm),
    };

    let storage = Arc::new(LocalFileStorage::new(
        &config.storage_dir,
        &config.storage_public_url,
    ));

    let state = AppState::new(pool, config.clone(), ai, storage, alarm);

    // Create the Axum application router
    let app = routes::create_router(state);

    tracing::info!("Listening on {}", config.bind_addr);
    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .expect("Failed to bind listening address");

    // Start the server
    axum::serve(listener, app).await.expect("Server error");
}
