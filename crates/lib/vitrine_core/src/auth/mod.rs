//! Authentication and authorization logic.
//!
//! Provides password hashing, the token codec, the credential store and
//! refresh-token ledger seams, the session orchestrator, and the admin gate
//! rules shared with `vitrine_api`.

pub mod gate;
pub mod jwt;
pub mod ledger;
pub mod password;
pub mod principals;
pub mod session;
pub mod ttl;

use thiserror::Error;

/// Authentication errors.
///
/// Several variants intentionally share one client-facing message so callers
/// cannot tell *why* a credential was rejected.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Unknown email or wrong password at login.
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Missing token")]
    MissingToken,

    /// Access token failed signature, expiry or shape checks.
    #[error("Invalid or expired token")]
    InvalidToken,

    /// Bad signature, expired, or not (or no longer) in the ledger.
    #[error("Invalid refresh token")]
    InvalidRefreshToken,

    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Refresh token value collided with an existing ledger row.
    #[error("Duplicate refresh token")]
    DuplicateToken,

    #[error("Email already in use")]
    EmailTaken,

    #[error("Not found")]
    NotFound,

    #[error("Database error: {0}")]
    Db(#[from] sqlx::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}
