/// JWT Claims structure
///
/// Payload shared by access and refresh tokens. The two kinds differ only in
/// lifetime and in how the server treats them afterwards.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AuthError;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Claims {
    /// Subject (user ID)
    pub sub: String,
    /// User email
    pub email: String,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Not before (Unix timestamp)
    pub nbf: i64,
    /// Issuer
    pub iss: String,
    /// Unique token ID, keeps tokens minted in the same second distinct
    pub jti: String,
}

impl Claims {
    /// Create new claims for a user
    ///
    /// # Arguments
    /// * `user_id` - User's ID
    /// * `email` - User's email address
    /// * `ttl` - Token lifetime from now
    /// * `issuer` - Issuer identifier
    pub fn new(user_id: i64, email: String, ttl: chrono::Duration, issuer: String) -> Self {
        let now = chrono::Utc::now();
        Self {
            sub: user_id.to_string(),
            email,
            exp: (now + ttl).timestamp(),
            iat: now.timestamp(),
            nbf: now.timestamp(),
            iss: issuer,
            jti: Uuid::new_v4().to_string(),
        }
    }

    /// Extract user ID from claims
    ///
    /// # Errors
    /// Returns error if the subject is not a numeric user ID
    pub fn user_id(&self) -> Result<i64, AuthError> {
        self.sub
            .parse::<i64>()
            .map_err(|_| AuthError::Internal("Invalid user ID in token".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_claims_creation() {
        let email = "test@example.com".to_string();
        let claims = Claims::new(7, email.clone(), chrono::Duration::hours(1), "test".to_string());

        assert_eq!(claims.sub, "7");
        assert_eq!(claims.email, email);
        assert_eq!(claims.iss, "test");
        assert_eq!(claims.exp - claims.iat, 3600);
    }

    #[test]
    fn test_user_id_extraction() {
        let claims = Claims::new(42, "test@example.com".to_string(), chrono::Duration::hours(1), "test".to_string());

        assert_eq!(claims.user_id().unwrap(), 42);
    }

    #[test]
    fn test_invalid_user_id() {
        let mut claims = Claims::new(1, "test@example.com".to_string(), chrono::Duration::hours(1), "test".to_string());
        claims.sub = "not-a-number".to_string();

        assert!(claims.user_id().is_err());
    }

    #[test]
    fn test_token_ids_are_unique() {
        let ttl = chrono::Duration::hours(1);
        let a = Claims::new(1, "a@b.com".to_string(), ttl, "test".to_string());
        let b = Claims::new(1, "a@b.com".to_string(), ttl, "test".to_string());

        assert_ne!(a.jti, b.jti);
    }
}
