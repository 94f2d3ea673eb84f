/// Refresh Token Records
///
/// Refresh tokens are signed like access tokens but also persisted, so they
/// can be revoked one by one. Only the SHA-256 hash of the raw token is ever
/// stored; the raw token is the bearer credential held by the client.

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};

/// Persisted state of one refresh token
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct RefreshTokenRecord {
    pub token_hash: String,
    pub user_id: i64,
    /// Owner's email, joined in so rotation needs no second user read
    pub email: String,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl RefreshTokenRecord {
    /// Expired records count as absent even before the sweep removes them
    pub fn is_expired(&self) -> bool {
        Utc::now() > self.expires_at
    }
}

/// Hash a raw refresh token for storage and lookup (lowercase hex SHA-256)
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}
