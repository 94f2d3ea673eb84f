/// Session Management
///
/// Orchestrates register, login, rotation, logout and account deletion on top
/// of the stores, the credential verifier and the token issuer.
///
/// A session is tracked only through its refresh record:
/// - Active: a live, unexpired record exists
/// - Rotated: `refresh_tokens` replaced the record under a new hash
/// - Revoked: `logout` or `delete_account` removed it
/// - Expired: the record outlived `expires_at`; detected lazily, swept later
///
/// Rotation validates the presented token and then deletes its record with a
/// conditional delete. Only the caller whose delete actually removed the row
/// gets a new pair, so concurrent rotations of one token yield one winner.
/// Delete-old and store-new remain separate calls: a failure between them
/// leaves the user without a refresh token and forces a new login.

use std::sync::Arc;

use chrono::{Duration, Utc};

use crate::auth::{hash_token, Claims, CredentialVerifier, TokenIssuer, TokenValidator};
use crate::configuration::JwtSettings;
use crate::error::{AuthError, TokenError};
use crate::store::{RefreshTokenStore, UserStore};

/// Access and refresh token handed to the client together
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

pub struct SessionManager {
    users: Arc<dyn UserStore>,
    tokens: Arc<dyn RefreshTokenStore>,
    verifier: CredentialVerifier,
    issuer: TokenIssuer,
    validator: TokenValidator,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl SessionManager {
    pub fn new(
        users: Arc<dyn UserStore>,
        tokens: Arc<dyn RefreshTokenStore>,
        config: &JwtSettings,
    ) -> Self {
        Self {
            users,
            tokens,
            verifier: CredentialVerifier::new(config.password_cost),
            issuer: TokenIssuer::new(config),
            validator: TokenValidator::new(config),
            access_ttl: Duration::seconds(config.access_token_expiry),
            refresh_ttl: Duration::seconds(config.refresh_token_expiry),
        }
    }

    pub fn access_ttl(&self) -> Duration {
        self.access_ttl
    }

    pub fn refresh_ttl(&self) -> Duration {
        self.refresh_ttl
    }

    /// Hash the password and create the user
    ///
    /// # Errors
    /// `UserExists` for a registered email, `Internal` on hashing or storage failure
    pub async fn register(&self, email: &str, password: &str) -> Result<i64, AuthError> {
        let password_hash = self.verifier.hash(password)?;
        let user_id = self.users.save_user(email, &password_hash).await?;

        tracing::info!(user_id = user_id, "User registered");
        Ok(user_id)
    }

    /// Check credentials and open a new session
    ///
    /// Tokens are returned only once the refresh record is stored.
    ///
    /// # Errors
    /// `InvalidCredentials` for an unknown email or a wrong password
    pub async fn login(&self, email: &str, password: &str) -> Result<TokenPair, AuthError> {
        let user = match self.users.user_by_email(email).await {
            Ok(user) => user,
            Err(AuthError::UserNotFound) => return Err(AuthError::InvalidCredentials),
            Err(e) => return Err(e),
        };

        if !self.verifier.verify(password, &user.password_hash) {
            tracing::warn!(user_id = user.id, "Password mismatch on login");
            return Err(AuthError::InvalidCredentials);
        }

        let pair = self.issue_pair(user.id, &user.email)?;
        self.persist_refresh(user.id, &pair.refresh_token).await?;

        tracing::info!(user_id = user.id, "User logged in");
        Ok(pair)
    }

    /// Exchange a refresh token for a new pair, retiring the old one
    ///
    /// # Errors
    /// `TokenNotFound` when the token is unknown, already rotated or lost a
    /// concurrent rotation; `TokenExpired` when it is stale; `TokenProcessing`
    /// when its owner no longer exists.
    pub async fn refresh_tokens(&self, raw_refresh: &str) -> Result<TokenPair, AuthError> {
        let record = self.tokens.validate_refresh_token(raw_refresh).await?;

        let user = match self.users.user_by_email(&record.email).await {
            Ok(user) => user,
            Err(AuthError::UserNotFound) => return Err(AuthError::TokenProcessing),
            Err(e) => return Err(e),
        };

        let pair = self.issue_pair(user.id, &user.email)?;

        if !self.tokens.delete_refresh_token(&record.token_hash).await? {
            tracing::warn!(user_id = user.id, "Refresh token already consumed by a concurrent rotation");
            return Err(AuthError::TokenNotFound);
        }

        self.persist_refresh(user.id, &pair.refresh_token).await?;

        tracing::info!(user_id = user.id, "Tokens rotated");
        Ok(pair)
    }

    /// Revoke the session behind a refresh token
    ///
    /// Access tokens already issued stay valid until they expire.
    ///
    /// # Errors
    /// `TokenNotFound` when there is no record, e.g. on a second logout
    pub async fn logout(&self, raw_refresh: &str) -> Result<(), AuthError> {
        let token_hash = hash_token(raw_refresh);
        let record = self
            .tokens
            .get_refresh_token(&token_hash)
            .await?
            .ok_or(AuthError::TokenNotFound)?;

        if !self.tokens.delete_refresh_token(&token_hash).await? {
            return Err(AuthError::TokenNotFound);
        }

        tracing::info!(user_id = record.user_id, "User logged out");
        Ok(())
    }

    /// Remove the user and every refresh record it owns in one transaction
    ///
    /// # Errors
    /// `InvalidCredentials` when the user does not exist
    pub async fn delete_account(&self, user_id: i64) -> Result<(), AuthError> {
        match self.users.delete_user(user_id).await {
            Ok(()) => {
                tracing::info!(user_id = user_id, "Account deleted");
                Ok(())
            }
            Err(AuthError::UserNotFound) => Err(AuthError::InvalidCredentials),
            Err(e) => Err(e),
        }
    }

    /// Revoke every refresh token of a user without deleting the account
    pub async fn logout_everywhere(&self, user_id: i64) -> Result<u64, AuthError> {
        let removed = self.tokens.delete_refresh_tokens_by_user_id(user_id).await?;

        tracing::info!(user_id = user_id, removed = removed, "All sessions revoked");
        Ok(removed)
    }

    /// # Errors
    /// `InvalidCredentials` when the user does not exist
    pub async fn is_admin(&self, user_id: i64) -> Result<bool, AuthError> {
        match self.users.is_admin(user_id).await {
            Err(AuthError::UserNotFound) => Err(AuthError::InvalidCredentials),
            other => other,
        }
    }

    /// Delete expired refresh records; safe to call repeatedly
    pub async fn sweep_expired_tokens(&self) -> Result<u64, AuthError> {
        let removed = self.tokens.delete_expired_refresh_tokens().await?;

        tracing::info!(removed = removed, "Expired refresh tokens swept");
        Ok(removed)
    }

    /// Stateless check of a signed token; no storage lookup
    pub fn validate_token(&self, token: &str) -> Result<Claims, TokenError> {
        self.validator.verify(token)
    }

    fn issue_pair(&self, user_id: i64, email: &str) -> Result<TokenPair, AuthError> {
        Ok(TokenPair {
            access_token: self.issuer.issue(user_id, email, self.access_ttl)?,
            refresh_token: self.issuer.issue(user_id, email, self.refresh_ttl)?,
        })
    }

    async fn persist_refresh(&self, user_id: i64, refresh_token: &str) -> Result<(), AuthError> {
        let expires_at = Utc::now() + self.refresh_ttl;

        match self.tokens.store_refresh_token(user_id, refresh_token, expires_at).await {
            Err(AuthError::UserNotFound) => Err(AuthError::TokenProcessing),
            other => other,
        }
    }
}
