//! Refresh ledger: durable record of outstanding refresh tokens.
//!
//! Tokens are stored as SHA-256 digests. A row is deleted when its token is
//! rotated or logged out; `revoked_at` marks out-of-band invalidation.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use sha2::{Digest, Sha256};
use sqlx::PgPool;
use uuid::Uuid;

use super::AuthError;
use crate::models::auth::RefreshTokenRecord;
use crate::uuid::uuidv7;

/// SHA-256 hash a refresh token for storage.
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Storage seam for refresh tokens.
#[async_trait]
pub trait RefreshLedger: Send + Sync {
    /// Persist a new active record. Fails with `DuplicateToken` on collision.
    async fn record(
        &self,
        principal_id: Uuid,
        token: &str,
        ttl: Duration,
    ) -> Result<RefreshTokenRecord, AuthError>;

    /// Atomically delete the active, unexpired record matching both `token`
    /// and `principal_id`. Concurrent callers with the same token: exactly one
    /// gets the record, the rest get `NotFound`.
    async fn consume(
        &self,
        token: &str,
        principal_id: Uuid,
    ) -> Result<RefreshTokenRecord, AuthError>;

    /// Delete every record for `principal_id`. Returns how many went.
    async fn revoke_all_for(&self, principal_id: Uuid) -> Result<u64, AuthError>;

    /// Delete the record for `token` if present. Idempotent.
    async fn delete_by_token(&self, token: &str) -> Result<(), AuthError>;

    /// Mark the record for `token` revoked without deleting it.
    /// Returns whether an active record was found.
    async fn revoke(&self, token: &str) -> Result<bool, AuthError>;

    /// Delete records whose expiry has passed. Returns how many went.
    async fn purge_expired(&self) -> Result<u64, AuthError>;
}

fn expires_at(ttl: Duration) -> Result<DateTime<Utc>, AuthError> {
    Utc::now()
        .checked_add_signed(ttl)
        .ok_or_else(|| AuthError::Internal("refresh lifetime overflows".into()))
}

// ---------------------------------------------------------------------------
// PostgreSQL
// ---------------------------------------------------------------------------

#[derive(Debug, sqlx::FromRow)]
struct RefreshTokenRow {
    id: Uuid,
    principal_id: Uuid,
    token_hash: String,
    expires_at: DateTime<Utc>,
    revoked_at: Option<DateTime<Utc>>,
}

impl From<RefreshTokenRow> for RefreshTokenRecord {
    fn from(row: RefreshTokenRow) -> Self {
        Self {
            id: row.id,
            principal_id: row.principal_id,
            token_hash: row.token_hash,
            expires_at: row.expires_at,
            revoked_at: row.revoked_at,
        }
    }
}

/// Ledger in the `refresh_tokens` table (unique index on `token_hash`).
#[derive(Debug, Clone)]
pub struct PgRefreshLedger {
    pool: PgPool,
}

impl PgRefreshLedger {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RefreshLedger for PgRefreshLedger {
    async fn record(
        &self,
        principal_id: Uuid,
        token: &str,
        ttl: Duration,
    ) -> Result<RefreshTokenRecord, AuthError> {
        let result = sqlx::query_as::<_, RefreshTokenRow>(
            "INSERT INTO refresh_tokens (id, principal_id, token_hash, expires_at) \
             VALUES ($1, $2, $3, $4) \
             RETURNING id, principal_id, token_hash, expires_at, revoked_at",
        )
        .bind(uuidv7())
        .bind(principal_id)
        .bind(hash_token(token))
        .bind(expires_at(ttl)?)
        .fetch_one(&self.pool)
        .await;

        match result {
            Ok(row) => Ok(row.into()),
            Err(e)
                if e.as_database_error()
                    .is_some_and(|d| d.is_unique_violation()) =>
            {
                Err(AuthError::DuplicateToken)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn consume(
        &self,
        token: &str,
        principal_id: Uuid,
    ) -> Result<RefreshTokenRecord, AuthError> {
        // A single DELETE … RETURNING: the row lock serializes concurrent
        // consumers and only the first one sees the row.
        let row = sqlx::query_as::<_, RefreshTokenRow>(
            "DELETE FROM refresh_tokens \
             WHERE token_hash = $1 \
               AND principal_id = $2 \
               AND revoked_at IS NULL \
               AND expires_at > now() \
             RETURNING id, principal_id, token_hash, expires_at, revoked_at",
        )
        .bind(hash_token(token))
        .bind(principal_id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(Into::into).ok_or(AuthError::NotFound)
    }

    async fn revoke_all_for(&self, principal_id: Uuid) -> Result<u64, AuthError> {
        let result = sqlx::query("DELETE FROM refresh_tokens WHERE principal_id = $1")
            .bind(principal_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn delete_by_token(&self, token: &str) -> Result<(), AuthError> {
        sqlx::query("DELETE FROM refresh_tokens WHERE token_hash = $1")
            .bind(hash_token(token))
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn revoke(&self, token: &str) -> Result<bool, AuthError> {
        let result = sqlx::query(
            "UPDATE refresh_tokens SET revoked_at = now() \
             WHERE token_hash = $1 AND revoked_at IS NULL",
        )
        .bind(hash_token(token))
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn purge_expired(&self) -> Result<u64, AuthError> {
        let result = sqlx::query("DELETE FROM refresh_tokens WHERE expires_at <= now()")
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

// ---------------------------------------------------------------------------
// In-memory
// ---------------------------------------------------------------------------

/// Process-local ledger keyed by token digest.
#[derive(Debug, Default)]
pub struct MemoryRefreshLedger {
    records: DashMap<String, RefreshTokenRecord>,
}

impl MemoryRefreshLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records currently held, revoked ones included.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[async_trait]
impl RefreshLedger for MemoryRefreshLedger {
    async fn record(
        &self,
        principal_id: Uuid,
        token: &str,
        ttl: Duration,
    ) -> Result<RefreshTokenRecord, AuthError> {
        let token_hash = hash_token(token);
        match self.records.entry(token_hash.clone()) {
            Entry::Occupied(_) => Err(AuthError::DuplicateToken),
            Entry::Vacant(slot) => {
                let record = RefreshTokenRecord {
                    id: uuidv7(),
                    principal_id,
                    token_hash,
                    expires_at: expires_at(ttl)?,
                    revoked_at: None,
                };
                slot.insert(record.clone());
                Ok(record)
            }
        }
    }

    async fn consume(
        &self,
        token: &str,
        principal_id: Uuid,
    ) -> Result<RefreshTokenRecord, AuthError> {
        let now = Utc::now();
        self.records
            .remove_if(&hash_token(token), |_, r| {
                r.principal_id == principal_id && r.revoked_at.is_none() && r.expires_at > now
            })
            .map(|(_, record)| record)
            .ok_or(AuthError::NotFound)
    }

    async fn revoke_all_for(&self, principal_id: Uuid) -> Result<u64, AuthError> {
        let mut removed = 0;
        self.records.retain(|_, r| {
            let keep = r.principal_id != principal_id;
            if !keep {
                removed += 1;
            }
            keep
        });
        Ok(removed)
    }

    async fn delete_by_token(&self, token: &str) -> Result<(), AuthError> {
        self.records.remove(&hash_token(token));
        Ok(())
    }

    async fn revoke(&self, token: &str) -> Result<bool, AuthError> {
        match self.records.get_mut(&hash_token(token)) {
            Some(mut r) if r.revoked_at.is_none() => {
                r.revoked_at = Some(Utc::now());
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn purge_expired(&self) -> Result<u64, AuthError> {
        let now = Utc::now();
        let mut removed = 0;
        self.records.retain(|_, r| {
            let keep = r.expires_at > now;
            if !keep {
                removed += 1;
            }
            keep
        });
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    fn week() -> Duration {
        Duration::days(7)
    }

    #[tokio::test]
    async fn record_then_consume_once() {
        let ledger = MemoryRefreshLedger::new();
        let pid = Uuid::new_v4();
        let rec = ledger.record(pid, "token-a", week()).await.unwrap();
        assert_eq!(rec.token_hash, hash_token("token-a"));
        assert!(rec.revoked_at.is_none());

        let consumed = ledger.consume("token-a", pid).await.unwrap();
        assert_eq!(consumed.id, rec.id);
        assert!(matches!(
            ledger.consume("token-a", pid).await,
            Err(AuthError::NotFound)
        ));
        assert!(ledger.is_empty());
    }

    #[tokio::test]
    async fn duplicate_token_is_rejected() {
        let ledger = MemoryRefreshLedger::new();
        let pid = Uuid::new_v4();
        ledger.record(pid, "dup", week()).await.unwrap();
        assert!(matches!(
            ledger.record(pid, "dup", week()).await,
            Err(AuthError::DuplicateToken)
        ));
    }

    #[tokio::test]
    async fn consume_requires_matching_principal() {
        let ledger = MemoryRefreshLedger::new();
        let owner = Uuid::new_v4();
        ledger.record(owner, "t", week()).await.unwrap();

        assert!(matches!(
            ledger.consume("t", Uuid::new_v4()).await,
            Err(AuthError::NotFound)
        ));
        // The mismatched attempt must not have eaten the row.
        assert!(ledger.consume("t", owner).await.is_ok());
    }

    #[tokio::test]
    async fn revoked_and_expired_records_cannot_be_consumed() {
        let ledger = MemoryRefreshLedger::new();
        let pid = Uuid::new_v4();
        ledger.record(pid, "revoked", week()).await.unwrap();
        ledger.record(pid, "expired", Duration::milliseconds(-1)).await.unwrap();

        assert!(ledger.revoke("revoked").await.unwrap());
        assert!(!ledger.revoke("revoked").await.unwrap());
        assert!(ledger.consume("revoked", pid).await.is_err());
        assert!(ledger.consume("expired", pid).await.is_err());
    }

    #[tokio::test]
    async fn revoke_all_for_only_touches_that_principal() {
        let ledger = MemoryRefreshLedger::new();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        ledger.record(a, "a1", week()).await.unwrap();
        ledger.record(a, "a2", week()).await.unwrap();
        ledger.record(b, "b1", week()).await.unwrap();

        assert_eq!(ledger.revoke_all_for(a).await.unwrap(), 2);
        assert!(ledger.consume("a1", a).await.is_err());
        assert!(ledger.consume("a2", a).await.is_err());
        assert!(ledger.consume("b1", b).await.is_ok());
    }

    #[tokio::test]
    async fn delete_by_token_is_idempotent() {
        let ledger = MemoryRefreshLedger::new();
        let pid = Uuid::new_v4();
        ledger.record(pid, "t", week()).await.unwrap();
        ledger.delete_by_token("t").await.unwrap();
        ledger.delete_by_token("t").await.unwrap();
        ledger.delete_by_token("never-issued").await.unwrap();
        assert!(ledger.is_empty());
    }

    #[tokio::test]
    async fn purge_expired_keeps_live_records() {
        let ledger = MemoryRefreshLedger::new();
        let pid = Uuid::new_v4();
        ledger.record(pid, "live", week()).await.unwrap();
        ledger.record(pid, "dead", Duration::milliseconds(-1)).await.unwrap();
        assert_eq!(ledger.purge_expired().await.unwrap(), 1);
        assert_eq!(ledger.len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_consume_succeeds_exactly_once() {
        let ledger = Arc::new(MemoryRefreshLedger::new());
        let pid = Uuid::new_v4();
        ledger.record(pid, "contested", week()).await.unwrap();

        let attempts = (0..16).map(|_| {
            let ledger = Arc::clone(&ledger);
            tokio::spawn(async move { ledger.consume("contested", pid).await.is_ok() })
        });
        let results = futures::future::join_all(attempts).await;
        let wins = results.into_iter().filter(|r| *r.as_ref().unwrap()).count();
        assert_eq!(wins, 1);
    }
}
