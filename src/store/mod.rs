/// Storage module
///
/// Two small capability traits injected into `SessionManager`: one for user
/// identity, one for refresh-token state. Adapters classify backend failures
/// into `AuthError` before returning.

mod memory;
mod postgres;

pub use memory::InMemoryStore;
pub use postgres::PostgresStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::auth::{hash_token, RefreshTokenRecord};
use crate::error::AuthError;

/// A registered user as stored
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub password_hash: String,
    pub is_admin: bool,
}

#[async_trait]
pub trait UserStore: Send + Sync {
    /// Insert a user and return its ID
    ///
    /// # Errors
    /// `UserExists` when the email is already registered
    async fn save_user(&self, email: &str, password_hash: &str) -> Result<i64, AuthError>;

    /// # Errors
    /// `UserNotFound` when no user has this email
    async fn user_by_email(&self, email: &str) -> Result<User, AuthError>;

    /// # Errors
    /// `UserNotFound` when no user has this ID
    async fn is_admin(&self, user_id: i64) -> Result<bool, AuthError>;

    /// Delete every refresh token of the user, then the user, atomically
    ///
    /// # Errors
    /// `UserNotFound` when no user has this ID; nothing is deleted then
    async fn delete_user(&self, user_id: i64) -> Result<(), AuthError>;
}

#[async_trait]
pub trait RefreshTokenStore: Send + Sync {
    /// Hash `raw_token` and persist it for `user_id`
    ///
    /// Storing a hash that already exists is a no-op.
    ///
    /// # Errors
    /// `UserNotFound` when `user_id` does not reference a user
    async fn store_refresh_token(
        &self,
        user_id: i64,
        raw_token: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), AuthError>;

    /// Fetch a record by hash, expired or not
    async fn get_refresh_token(&self, token_hash: &str) -> Result<Option<RefreshTokenRecord>, AuthError>;

    /// Delete one record; `true` if a row was actually removed
    async fn delete_refresh_token(&self, token_hash: &str) -> Result<bool, AuthError>;

    /// Delete all records of a user ("log out everywhere"); returns the count
    async fn delete_refresh_tokens_by_user_id(&self, user_id: i64) -> Result<u64, AuthError>;

    /// Sweep records whose expiry has passed; returns the count
    async fn delete_expired_refresh_tokens(&self) -> Result<u64, AuthError>;

    /// Hash, fetch and check expiry of a presented raw token
    ///
    /// # Errors
    /// `TokenNotFound` when no record exists, `TokenExpired` when it is stale
    async fn validate_refresh_token(&self, raw_token: &str) -> Result<RefreshTokenRecord, AuthError> {
        let token_hash = hash_token(raw_token);

        match self.get_refresh_token(&token_hash).await? {
            None => {
                tracing::warn!("Refresh token not found in store");
                Err(AuthError::TokenNotFound)
            }
            Some(record) if record.is_expired() => {
                tracing::info!(user_id = record.user_id, "Refresh token expired");
                Err(AuthError::TokenExpired)
            }
            Some(record) => Ok(record),
        }
    }
}
