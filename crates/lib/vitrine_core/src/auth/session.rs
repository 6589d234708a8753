//! Session service: login, refresh rotation, logout, credential changes.

use std::sync::Arc;

use chrono::Utc;
use tracing::{error, info};
use uuid::Uuid;

use super::AuthError;
use super::jwt::TokenCodec;
use super::ledger::RefreshLedger;
use super::password::{dummy_hash, hash_password, verify_password};
use super::principals::CredentialStore;
use crate::models::auth::{Principal, PrincipalProfile, TokenPair, normalize_email};

/// Orchestrates the credential store, token codec and refresh ledger.
#[derive(Clone)]
pub struct SessionService {
    principals: Arc<dyn CredentialStore>,
    ledger: Arc<dyn RefreshLedger>,
    codec: TokenCodec,
    bcrypt_cost: u32,
    dummy_hash: String,
}

impl SessionService {
    /// Build a service hashing new passwords at `bcrypt_cost`.
    pub fn new(
        principals: Arc<dyn CredentialStore>,
        ledger: Arc<dyn RefreshLedger>,
        codec: TokenCodec,
        bcrypt_cost: u32,
    ) -> Result<Self, AuthError> {
        Ok(Self {
            principals,
            ledger,
            codec,
            bcrypt_cost,
            dummy_hash: dummy_hash(bcrypt_cost)?,
        })
    }

    pub fn codec(&self) -> &TokenCodec {
        &self.codec
    }

    pub fn ledger(&self) -> &Arc<dyn RefreshLedger> {
        &self.ledger
    }

    /// Create the admin principal when the store is empty and both bootstrap
    /// values are present. Returns whether a principal was created.
    pub async fn bootstrap_admin(
        &self,
        email: Option<&str>,
        password: Option<&str>,
    ) -> Result<bool, AuthError> {
        let (Some(email), Some(password)) = (email, password) else {
            return Ok(false);
        };
        if email.trim().is_empty() || password.is_empty() {
            return Ok(false);
        }
        if self.principals.count().await? > 0 {
            return Ok(false);
        }

        let principal = Principal::new_admin(email, hash_password(password, self.bcrypt_cost)?);
        self.principals.save(&principal).await?;
        info!(email = %principal.email, "bootstrap admin created");
        Ok(true)
    }

    /// Authenticate with email + password.
    pub async fn login(&self, email: &str, password: &str) -> Result<TokenPair, AuthError> {
        let Some(mut principal) = self.principals.find_by_email(email).await? else {
            // Same bcrypt work as a real miss.
            let _ = verify_password(password, &self.dummy_hash);
            return Err(AuthError::InvalidCredentials);
        };

        if !verify_password(password, &principal.password_hash).unwrap_or(false) {
            return Err(AuthError::InvalidCredentials);
        }

        let now = Utc::now();
        principal.last_login_at = Some(now);
        principal.updated_at = now;
        self.principals.save(&principal).await?;

        self.issue_pair(&principal).await
    }

    /// Exchange a refresh token for a new pair; the presented token is spent.
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, AuthError> {
        let claims = self
            .codec
            .verify_refresh(refresh_token)
            .map_err(|_| AuthError::InvalidRefreshToken)?;
        let principal_id =
            Uuid::parse_str(&claims.sub).map_err(|_| AuthError::InvalidRefreshToken)?;

        match self.ledger.consume(refresh_token, principal_id).await {
            Ok(_) => {}
            Err(AuthError::NotFound) => return Err(AuthError::InvalidRefreshToken),
            Err(e) => return Err(e),
        }

        let principal = self
            .principals
            .find_by_id(principal_id)
            .await?
            .ok_or(AuthError::InvalidRefreshToken)?;

        self.issue_pair(&principal).await
    }

    /// Forget a refresh token. Unknown tokens are fine.
    pub async fn logout(&self, refresh_token: &str) -> Result<(), AuthError> {
        self.ledger.delete_by_token(refresh_token).await
    }

    /// Public profile of a principal.
    pub async fn me(&self, principal_id: Uuid) -> Result<PrincipalProfile, AuthError> {
        self.principals
            .find_by_id(principal_id)
            .await?
            .map(|p| p.profile())
            .ok_or(AuthError::NotFound)
    }

    /// Change the login email. Every refresh token of the principal dies.
    pub async fn change_email(
        &self,
        principal_id: Uuid,
        current_password: &str,
        new_email: &str,
    ) -> Result<(), AuthError> {
        let mut principal = self.authorize_change(principal_id, current_password).await?;

        let new_email = normalize_email(new_email);
        if new_email != principal.email && self.principals.exists(&new_email).await? {
            return Err(AuthError::EmailTaken);
        }

        principal.email = new_email;
        principal.updated_at = Utc::now();
        self.principals.save(&principal).await?;

        let revoked = self.ledger.revoke_all_for(principal_id).await?;
        info!(%principal_id, revoked, "email changed, sessions revoked");
        Ok(())
    }

    /// Change the password. Every refresh token of the principal dies.
    pub async fn change_password(
        &self,
        principal_id: Uuid,
        current_password: &str,
        new_password: &str,
    ) -> Result<(), AuthError> {
        let mut principal = self.authorize_change(principal_id, current_password).await?;

        principal.password_hash = hash_password(new_password, self.bcrypt_cost)?;
        principal.updated_at = Utc::now();
        self.principals.save(&principal).await?;

        let revoked = self.ledger.revoke_all_for(principal_id).await?;
        info!(%principal_id, revoked, "password changed, sessions revoked");
        Ok(())
    }

    async fn authorize_change(
        &self,
        principal_id: Uuid,
        current_password: &str,
    ) -> Result<Principal, AuthError> {
        let principal = self
            .principals
            .find_by_id(principal_id)
            .await?
            .ok_or(AuthError::NotFound)?;
        if !verify_password(current_password, &principal.password_hash).unwrap_or(false) {
            return Err(AuthError::InvalidCredentials);
        }
        Ok(principal)
    }

    async fn issue_pair(&self, principal: &Principal) -> Result<TokenPair, AuthError> {
        let access_token = self.codec.issue_access(principal)?;
        let refresh_token = self.codec.issue_refresh(principal.id)?;

        if let Err(e) = self
            .ledger
            .record(principal.id, &refresh_token, self.codec.refresh_ttl())
            .await
        {
            if matches!(e, AuthError::DuplicateToken) {
                error!(principal_id = %principal.id, "refresh token collision in ledger");
            }
            return Err(e);
        }

        Ok(TokenPair {
            access_token,
            refresh_token,
            expires_in: self.codec.access_ttl_secs(),
        })
    }
}
