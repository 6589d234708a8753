//! Credential store: persistence for the admin principal.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::AuthError;
use crate::models::auth::{Principal, normalize_email};

/// Storage seam for principals. Emails are compared after normalization.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn find_by_email(&self, email: &str) -> Result<Option<Principal>, AuthError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Principal>, AuthError>;

    /// Insert or update by id. Fails with `EmailTaken` when another principal
    /// already owns the email.
    async fn save(&self, principal: &Principal) -> Result<(), AuthError>;

    async fn exists(&self, email: &str) -> Result<bool, AuthError>;

    async fn count(&self) -> Result<u64, AuthError>;
}

// ---------------------------------------------------------------------------
// PostgreSQL
// ---------------------------------------------------------------------------

#[derive(Debug, sqlx::FromRow)]
struct PrincipalRow {
    id: Uuid,
    email: String,
    password_hash: String,
    role: String,
    last_login_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<PrincipalRow> for Principal {
    type Error = AuthError;

    fn try_from(row: PrincipalRow) -> Result<Self, Self::Error> {
        Ok(Principal {
            id: row.id,
            email: row.email,
            password_hash: row.password_hash,
            role: row.role.parse().map_err(AuthError::Internal)?,
            last_login_at: row.last_login_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Principals in the `principals` table.
#[derive(Debug, Clone)]
pub struct PgCredentialStore {
    pool: PgPool,
}

impl PgCredentialStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const SELECT_PRINCIPAL: &str = "SELECT id, email, password_hash, role, last_login_at, created_at, updated_at \
     FROM principals";

#[async_trait]
impl CredentialStore for PgCredentialStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<Principal>, AuthError> {
        let row = sqlx::query_as::<_, PrincipalRow>(&format!("{SELECT_PRINCIPAL} WHERE email = $1"))
            .bind(normalize_email(email))
            .fetch_optional(&self.pool)
            .await?;
        row.map(Principal::try_from).transpose()
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Principal>, AuthError> {
        let row = sqlx::query_as::<_, PrincipalRow>(&format!("{SELECT_PRINCIPAL} WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(Principal::try_from).transpose()
    }

    async fn save(&self, principal: &Principal) -> Result<(), AuthError> {
        let result = sqlx::query(
            "INSERT INTO principals \
               (id, email, password_hash, role, last_login_at, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             ON CONFLICT (id) DO UPDATE SET \
               email = EXCLUDED.email, \
               password_hash = EXCLUDED.password_hash, \
               role = EXCLUDED.role, \
               last_login_at = EXCLUDED.last_login_at, \
               updated_at = EXCLUDED.updated_at",
        )
        .bind(principal.id)
        .bind(normalize_email(&principal.email))
        .bind(&principal.password_hash)
        .bind(principal.role.as_str())
        .bind(principal.last_login_at)
        .bind(principal.created_at)
        .bind(principal.updated_at)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(e)
                if e.as_database_error()
                    .is_some_and(|d| d.is_unique_violation()) =>
            {
                Err(AuthError::EmailTaken)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn exists(&self, email: &str) -> Result<bool, AuthError> {
        let exists =
            sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM principals WHERE email = $1)")
                .bind(normalize_email(email))
                .fetch_one(&self.pool)
                .await?;
        Ok(exists)
    }

    async fn count(&self) -> Result<u64, AuthError> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM principals")
            .fetch_one(&self.pool)
            .await?;
        Ok(count.max(0) as u64)
    }
}

// ---------------------------------------------------------------------------
// In-memory
// ---------------------------------------------------------------------------

/// Process-local credential store.
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    principals: RwLock<HashMap<Uuid, Principal>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<Principal>, AuthError> {
        let email = normalize_email(email);
        let principals = self.principals.read().await;
        Ok(principals.values().find(|p| p.email == email).cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Principal>, AuthError> {
        Ok(self.principals.read().await.get(&id).cloned())
    }

    async fn save(&self, principal: &Principal) -> Result<(), AuthError> {
        let email = normalize_email(&principal.email);
        let mut principals = self.principals.write().await;
        if principals
            .values()
            .any(|p| p.email == email && p.id != principal.id)
        {
            return Err(AuthError::EmailTaken);
        }
        let mut stored = principal.clone();
        stored.email = email;
        principals.insert(stored.id, stored);
        Ok(())
    }

    async fn exists(&self, email: &str) -> Result<bool, AuthError> {
        Ok(self.find_by_email(email).await?.is_some())
    }

    async fn count(&self) -> Result<u64, AuthError> {
        Ok(self.principals.read().await.len() as u64)
    }
}
