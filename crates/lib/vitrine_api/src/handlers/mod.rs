//! Request handlers.

pub mod admin;
pub mod auth;
pub mod blogs;
pub mod faqs;
pub mod health;
pub mod products;

use uuid::Uuid;

use crate::error::{AppError, AppResult};

/// Parse a path id. Anything that is not a UUID cannot name a row.
pub(crate) fn parse_id(raw: &str) -> AppResult<Uuid> {
    Uuid::parse_str(raw).map_err(|_| AppError::NotFound("Not found".into()))
}

/// Fallback for unmatched routes.
pub async fn not_found() -> AppError {
    AppError::NotFound("Not found".into())
}
