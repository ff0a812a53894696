// src/error.rs

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

/// Global Application Error Enum.
/// Centralizes error handling and mapping to HTTP responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    // 500 Internal Server Error
    #[error("internal server error: {0}")]
    InternalServerError(String),

    // 400 Bad Request
    #[error("bad request: {0}")]
    BadRequest(String),

    // 400 Bad Request, fatal configuration problem in the content pool
    #[error("unknown question type id: {0}")]
    UnknownQuestionType(i64),

    // 401 Unauthorized
    #[error("unauthorized: {0}")]
    AuthError(String),

    // 403 Forbidden
    #[error("forbidden: {0}")]
    Forbidden(String),

    // 404 Not Found
    #[error("not found: {0}")]
    NotFound(String),

    // 409 Conflict (e.g., exam already completed)
    #[error("conflict: {0}")]
    Conflict(String),

    // 500, no content for a required (level, topic, type) combination
    #[error("question allocation failed: {0}")]
    AllocationFailed(String),

    // 502, storage or other collaborator failure
    #[error("external service error: {0}")]
    External(String),

    /// Retries exhausted against an external collaborator.
    /// `user_message` is safe to show; `operator_message` goes to the alert channel only.
    #[error("{title}: {operator_message}")]
    System {
        title: String,
        user_message: String,
        operator_message: String,
    },
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) | AppError::UnknownQuestionType(_) => StatusCode::BAD_REQUEST,
            AppError::AuthError(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::External(_) => StatusCode::BAD_GATEWAY,
            AppError::InternalServerError(_)
            | AppError::AllocationFailed(_)
            | AppError::System { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Implements `IntoResponse` for `AppError`.
/// Converts the error into a JSON response with appropriate HTTP status code.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error_message = match self {
            AppError::InternalServerError(msg) => {
                tracing::error!("Internal Server Error: {}", msg);
                "Internal Server Error".to_string()
            }
            AppError::AllocationFailed(msg) => {
                tracing::error!("Question allocation failed: {}", msg);
                "Failed to allocate exam questions".to_string()
            }
            AppError::External(msg) => {
                tracing::error!("External service failure: {}", msg);
                "Upstream service unavailable".to_string()
            }
            AppError::System {
                title,
                user_message,
                operator_message,
            } => {
                tracing::error!("{}: {}", title, operator_message);
                user_message
            }
            AppError::UnknownQuestionType(id) => format!("Unknown question type: {}", id),
            AppError::BadRequest(msg)
            | AppError::AuthError(msg)
            | AppError::Forbidden(msg)
            | AppError::NotFound(msg)
            | AppError::Conflict(msg) => msg,
        };
        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

/// Converts `sqlx::Error` into `AppError::InternalServerError`.
/// Allows using `?` operator on database queries.
impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::InternalServerError(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::BadRequest(err.to_string())
    }
}
