//! Application error types.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::error;
use vitrine_core::auth::AuthError;
use vitrine_core::blob::BlobError;
use vitrine_core::content::ContentError;
use vitrine_core::validation::{Issue, summarize};

use crate::models::ErrorResponse;

/// Convenience alias for handler return types.
pub type AppResult<T> = Result<T, AppError>;

/// Application-level errors with HTTP status mapping.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    /// Field-level validation failures.
    #[error("Validation error: {}", summarize(.0))]
    InvalidFields(Vec<Issue>),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Internal server error")]
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error, message, issues) = match self {
            AppError::Validation(m) => (StatusCode::BAD_REQUEST, "validation_error", m, Vec::new()),
            AppError::InvalidFields(issues) => (
                StatusCode::BAD_REQUEST,
                "validation_error",
                summarize(&issues),
                issues,
            ),
            AppError::NotFound(m) => (StatusCode::NOT_FOUND, "not_found", m, Vec::new()),
            AppError::Unauthorized(m) => (StatusCode::UNAUTHORIZED, "unauthorized", m, Vec::new()),
            AppError::Forbidden(m) => (StatusCode::FORBIDDEN, "forbidden", m, Vec::new()),
            AppError::Conflict(m) => (StatusCode::CONFLICT, "conflict", m, Vec::new()),
            AppError::Internal(detail) => {
                error!(%detail, "internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "Internal server error".to_string(),
                    Vec::new(),
                )
            }
        };
        let body = Json(ErrorResponse {
            error: error.to_string(),
            message,
            issues,
        });
        (status, body).into_response()
    }
}

impl From<sqlx::Error> for AppError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::RowNotFound => AppError::NotFound("Not found".into()),
            _ => AppError::Internal(e.to_string()),
        }
    }
}

impl From<AuthError> for AppError {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::InvalidCredentials
            | AuthError::MissingToken
            | AuthError::InvalidToken
            | AuthError::InvalidRefreshToken => AppError::Unauthorized(e.to_string()),
            AuthError::Forbidden(msg) => AppError::Forbidden(msg),
            AuthError::EmailTaken => AppError::Conflict("Email already in use".into()),
            AuthError::NotFound => AppError::NotFound("Not found".into()),
            AuthError::DuplicateToken => AppError::Internal("refresh token collision".into()),
            AuthError::Db(e) => AppError::Internal(e.to_string()),
            AuthError::Internal(msg) => AppError::Internal(msg),
        }
    }
}

impl From<ContentError> for AppError {
    fn from(e: ContentError) -> Self {
        match e {
            ContentError::NotFound => AppError::NotFound("Not found".into()),
            ContentError::Db(e) => AppError::from(e),
            ContentError::Blob(e) => AppError::from(e),
        }
    }
}

impl From<BlobError> for AppError {
    fn from(e: BlobError) -> Self {
        match e {
            BlobError::Rejected(msg) => AppError::Validation(msg),
            other => AppError::Internal(other.to_string()),
        }
    }
}

impl From<Vec<Issue>> for AppError {
    fn from(issues: Vec<Issue>) -> Self {
        AppError::InvalidFields(issues)
    }
}
