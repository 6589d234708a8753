//! JWT token generation and verification.
//!
//! Access and refresh tokens are both HS256 JWTs, but they are signed with
//! independent secrets and carry independent lifetimes, so a leaked refresh
//! secret cannot mint access tokens and vice versa.

use std::path::PathBuf;

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use rand::distr::Alphanumeric;
use rand::{Rng, rng};
use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use super::AuthError;
use crate::models::auth::{AccessClaims, Principal, RefreshClaims};

/// Why a token failed verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TokenError {
    #[error("invalid signature")]
    InvalidSignature,

    #[error("token expired")]
    Expired,

    #[error("malformed token")]
    Malformed,
}

impl From<jsonwebtoken::errors::Error> for TokenError {
    fn from(e: jsonwebtoken::errors::Error) -> Self {
        match e.kind() {
            ErrorKind::InvalidSignature => TokenError::InvalidSignature,
            ErrorKind::ExpiredSignature => TokenError::Expired,
            _ => TokenError::Malformed,
        }
    }
}

/// Signs and verifies access and refresh tokens.
#[derive(Clone)]
pub struct TokenCodec {
    access_secret: Vec<u8>,
    refresh_secret: Vec<u8>,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl std::fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCodec")
            .field("access_ttl", &self.access_ttl)
            .field("refresh_ttl", &self.refresh_ttl)
            .finish_non_exhaustive()
    }
}

impl TokenCodec {
    pub fn new(
        access_secret: impl Into<Vec<u8>>,
        refresh_secret: impl Into<Vec<u8>>,
        access_ttl: Duration,
        refresh_ttl: Duration,
    ) -> Self {
        Self {
            access_secret: access_secret.into(),
            refresh_secret: refresh_secret.into(),
            access_ttl,
            refresh_ttl,
        }
    }

    pub fn access_ttl(&self) -> Duration {
        self.access_ttl
    }

    pub fn refresh_ttl(&self) -> Duration {
        self.refresh_ttl
    }

    /// Access lifetime as encoded in `exp - iat`.
    pub fn access_ttl_secs(&self) -> i64 {
        whole_seconds(self.access_ttl)
    }

    /// Sign an access token for `principal`, valid for the access TTL.
    pub fn issue_access(&self, principal: &Principal) -> Result<String, AuthError> {
        self.issue_access_at(principal, Utc::now())
    }

    fn issue_access_at(&self, principal: &Principal, now: DateTime<Utc>) -> Result<String, AuthError> {
        let claims = AccessClaims {
            sub: principal.id.to_string(),
            role: principal.role,
            email: principal.email.clone(),
            iat: now.timestamp(),
            exp: expiry(now, self.access_ttl)?,
        };
        sign(&claims, &self.access_secret)
    }

    /// Sign a refresh token carrying only the subject and a random `jti`.
    pub fn issue_refresh(&self, principal_id: Uuid) -> Result<String, AuthError> {
        self.issue_refresh_at(principal_id, Utc::now())
    }

    fn issue_refresh_at(&self, principal_id: Uuid, now: DateTime<Utc>) -> Result<String, AuthError> {
        let claims = RefreshClaims {
            sub: principal_id.to_string(),
            jti: Uuid::new_v4().simple().to_string(),
            iat: now.timestamp(),
            exp: expiry(now, self.refresh_ttl)?,
        };
        sign(&claims, &self.refresh_secret)
    }

    /// Verify an access token, returning its claims.
    pub fn verify_access(&self, token: &str) -> Result<AccessClaims, TokenError> {
        verify(token, &self.access_secret)
    }

    /// Verify a refresh token, returning its claims.
    pub fn verify_refresh(&self, token: &str) -> Result<RefreshClaims, TokenError> {
        verify(token, &self.refresh_secret)
    }
}

/// Claims carry whole seconds; a partial second counts as a full one.
pub fn whole_seconds(ttl: Duration) -> i64 {
    let millis = ttl.num_milliseconds();
    millis / 1_000 + i64::from(millis % 1_000 > 0)
}

fn expiry(now: DateTime<Utc>, ttl: Duration) -> Result<i64, AuthError> {
    now.timestamp()
        .checked_add(whole_seconds(ttl))
        .ok_or_else(|| AuthError::Internal("token lifetime overflows".into()))
}

fn sign<T: Serialize>(claims: &T, secret: &[u8]) -> Result<String, AuthError> {
    encode(
        &Header::new(Algorithm::HS256),
        claims,
        &EncodingKey::from_secret(secret),
    )
    .map_err(|e| AuthError::Internal(format!("jwt encode: {e}")))
}

/// Signature is checked before `exp` is looked at; zero leeway.
fn verify<T: DeserializeOwned>(token: &str, secret: &[u8]) -> Result<T, TokenError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = true;
    validation.leeway = 0;
    decode::<T>(token, &DecodingKey::from_secret(secret), &validation)
        .map(|data| data.claims)
        .map_err(TokenError::from)
}

/// Resolve a signing secret: env var `var` → persisted file `file_name` →
/// freshly generated (and persisted) 64-char secret.
pub fn resolve_secret(var: &str, file_name: &str) -> String {
    if let Ok(secret) = std::env::var(var)
        && !secret.is_empty()
    {
        return secret;
    }
    let secret_path = secret_path(file_name);
    if let Ok(existing) = std::fs::read_to_string(&secret_path) {
        let trimmed = existing.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }
    let secret: String = rng()
        .sample_iter(&Alphanumeric)
        .take(64)
        .map(char::from)
        .collect();
    if let Some(parent) = secret_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }
    let _ = std::fs::write(&secret_path, &secret);
    info!(path = %secret_path.display(), var, "generated new signing secret");
    secret
}

/// Path to a persisted secret file.
fn secret_path(file_name: &str) -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("vitrine")
        .join(file_name)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn codec() -> TokenCodec {
        TokenCodec::new(
            "access-secret",
            "refresh-secret",
            Duration::minutes(15),
            Duration::days(7),
        )
    }

    fn admin() -> Principal {
        Principal::new_admin("admin@example.com", "hash".into())
    }

    #[test]
    fn access_token_round_trips_claims() {
        let codec = codec();
        let p = admin();
        let token = codec.issue_access(&p).unwrap();
        let claims = codec.verify_access(&token).unwrap();
        assert_eq!(claims.sub, p.id.to_string());
        assert_eq!(claims.email, "admin@example.com");
        assert_eq!(claims.role, crate::models::auth::Role::Admin);
        assert_eq!(claims.exp - claims.iat, 15 * 60);
        assert_eq!(claims.principal_id(), Some(p.id));
    }

    #[test]
    fn refresh_token_carries_no_identity_beyond_subject() {
        let codec = codec();
        let id = Uuid::new_v4();
        let token = codec.issue_refresh(id).unwrap();
        let claims: serde_json::Value = verify(&token, b"refresh-secret").unwrap();
        let obj = claims.as_object().unwrap();
        let mut keys: Vec<_> = obj.keys().map(String::as_str).collect();
        keys.sort_unstable();
        assert_eq!(keys, ["exp", "iat", "jti", "sub"]);
        assert_eq!(obj["sub"], id.to_string());
    }

    #[test]
    fn refresh_tokens_minted_together_differ() {
        let codec = codec();
        let id = Uuid::new_v4();
        let now = Utc::now();
        let a = codec.issue_refresh_at(id, now).unwrap();
        let b = codec.issue_refresh_at(id, now).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn secrets_are_not_interchangeable() {
        let codec = codec();
        let p = admin();
        let access = codec.issue_access(&p).unwrap();
        let refresh = codec.issue_refresh(p.id).unwrap();
        assert_eq!(codec.verify_refresh(&access), Err(TokenError::InvalidSignature));
        assert_eq!(codec.verify_access(&refresh), Err(TokenError::InvalidSignature));
    }

    #[test]
    fn expired_access_token_is_classified_as_expired() {
        let codec = codec();
        let issued = Utc::now() - Duration::minutes(16);
        let token = codec.issue_access_at(&admin(), issued).unwrap();
        assert_eq!(codec.verify_access(&token), Err(TokenError::Expired));
    }

    #[test]
    fn access_token_is_valid_just_before_expiry() {
        let codec = codec();
        let issued = Utc::now() - Duration::minutes(14);
        let token = codec.issue_access_at(&admin(), issued).unwrap();
        assert!(codec.verify_access(&token).is_ok());
    }

    #[test]
    fn expired_token_with_wrong_secret_reports_signature() {
        let codec = codec();
        let issued = Utc::now() - Duration::days(1);
        let token = codec.issue_access_at(&admin(), issued).unwrap();
        let other = TokenCodec::new("other", "other", Duration::minutes(15), Duration::days(7));
        assert_eq!(other.verify_access(&token), Err(TokenError::InvalidSignature));
    }

    #[test]
    fn tampered_payload_fails_signature() {
        let codec = codec();
        let token = codec.issue_access(&admin()).unwrap();
        let mut parts: Vec<String> = token.split('.').map(str::to_string).collect();
        let other = codec
            .issue_access(&Principal::new_admin("mallory@example.com", "x".into()))
            .unwrap();
        parts[1] = other.split('.').nth(1).unwrap().to_string();
        assert_eq!(
            codec.verify_access(&parts.join(".")),
            Err(TokenError::InvalidSignature)
        );
    }

    #[test]
    fn sub_second_lifetimes_round_up() {
        assert_eq!(whole_seconds(Duration::milliseconds(900)), 1);
        assert_eq!(whole_seconds(Duration::milliseconds(1_001)), 2);
        assert_eq!(whole_seconds(Duration::seconds(30)), 30);

        let codec = TokenCodec::new("a", "r", Duration::milliseconds(900), Duration::days(7));
        let claims = codec.verify_access(&codec.issue_access(&admin()).unwrap()).unwrap();
        assert_eq!(claims.exp - claims.iat, codec.access_ttl_secs());
        assert_eq!(codec.access_ttl_secs(), 1);
    }

    #[test]
    fn garbage_is_malformed() {
        let codec = codec();
        assert_eq!(codec.verify_access("not-a-jwt"), Err(TokenError::Malformed));
        assert_eq!(codec.verify_refresh(""), Err(TokenError::Malformed));
    }
}
