// src/routes.rs

use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::{HeaderValue, Method, header},
    middleware,
    routing::{get, post, put},
};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};

use crate::{
    handlers::{admin, exam, history, practice, survey},
    state::AppState,
    utils::jwt::{admin_middleware, auth_middleware},
};

/// Audio uploads are the largest bodies this service accepts.
const MAX_BODY_BYTES: usize = 20 * 1024 * 1024;

/// Assembles the main application router.
///
/// * Candidate routes (topics, surveys, exams, practice, history) require a valid JWT.
/// * Admin routes additionally require the 'admin' role.
/// * Uploaded audio is served read-only under `/files`.
/// * Applies global middleware (Trace, CORS).
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin([
            HeaderValue::from_static("http://localhost:3000"),
            HeaderValue::from_static("http://127.0.0.1:3000"),
        ])
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    let candidate_routes = Router::new()
        .route("/topics", get(survey::list_topics))
        .route("/surveys", post(survey::create_survey))
        .route("/surveys/{id}", get(survey::get_survey))
        .route("/exams", post(exam::start_exam))
        .route("/exams/{id}", get(exam::get_exam))
        .route("/exams/{id}/difficulty", put(exam::adjust_difficulty))
        .route("/exams/{id}/answers/{order}", post(exam::submit_answer))
        .route("/exams/{id}/complete", post(exam::complete_exam))
        .route("/exams/{id}/report", get(exam::get_report))
        .route("/practices", post(practice::create_practice))
        .route("/practices/{id}/answers", post(practice::submit_answer))
        .route("/practice-answers/{id}", get(practice::get_feedback))
        .route("/history/exams", get(history::list_exams))
        .route("/history/exams/{id}", get(history::get_exam))
        .route("/history/exams/{id}/answers/{order}", get(history::get_exam_answer))
        .route("/history/practices", get(history::list_practices))
        .route("/history/practices/{id}", get(history::get_practice))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    let admin_routes = Router::new()
        .route("/topics", post(admin::create_topic))
        .route("/question-sets", post(admin::create_question_set))
        .route("/exams/{id}/report", post(admin::recreate_report))
        .route(
            "/exams/{id}/answers/{order}/analysis",
            post(admin::reanalyze_answer),
        )
        // Auth first, then the admin check
        .layer(
            ServiceBuilder::new()
                .layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
                .layer(middleware::from_fn(admin_middleware)),
        );

    let api_routes = Router::new()
        .merge(candidate_routes)
        .nest("/admin", admin_routes);

    Router::new()
        .nest("/api", api_routes)
        .nest_service("/files", ServeDir::new(&state.config.storage_dir))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
