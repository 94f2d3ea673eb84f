/// JWT Token Generation and Validation
///
/// `TokenIssuer` signs claims, `TokenValidator` checks them. Both take the
/// signing secret at construction; nothing is read from the environment.
/// Validation never touches storage, so an access token stays valid until its
/// own expiry even after the session behind it is revoked.

use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};

use crate::auth::claims::Claims;
use crate::configuration::JwtSettings;
use crate::error::{AuthError, TokenError};

/// Signs access and refresh tokens
#[derive(Clone)]
pub struct TokenIssuer {
    key: EncodingKey,
    issuer: String,
}

impl TokenIssuer {
    pub fn new(config: &JwtSettings) -> Self {
        Self {
            key: EncodingKey::from_secret(config.secret.as_bytes()),
            issuer: config.issuer.clone(),
        }
    }

    /// Issue a signed token for a user
    ///
    /// # Arguments
    /// * `user_id` - Subject of the token
    /// * `email` - User's email address
    /// * `ttl` - Lifetime from now (access: minutes, refresh: days)
    ///
    /// # Errors
    /// Returns `AuthError::Internal` if signing fails
    pub fn issue(&self, user_id: i64, email: &str, ttl: chrono::Duration) -> Result<String, AuthError> {
        let claims = Claims::new(user_id, email.to_string(), ttl, self.issuer.clone());

        encode(&Header::new(Algorithm::HS256), &claims, &self.key).map_err(|e| {
            tracing::error!(error = %e, "Token signing failed");
            AuthError::Internal("token signing failed".to_string())
        })
    }
}

/// Stateless verification of signed tokens
#[derive(Clone)]
pub struct TokenValidator {
    key: DecodingKey,
    validation: Validation,
}

impl TokenValidator {
    pub fn new(config: &JwtSettings) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[&config.issuer]);
        validation.validate_nbf = true;
        validation.leeway = 0;

        Self {
            key: DecodingKey::from_secret(config.secret.as_bytes()),
            validation,
        }
    }

    /// Check signature, issuer and validity window, then return the claims
    ///
    /// # Errors
    /// One `TokenError` per failure class; callers facing other services
    /// collapse them into a single "invalid token" answer.
    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        decode::<Claims>(token, &self.key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| {
                let reason = match e.kind() {
                    ErrorKind::InvalidToken
                    | ErrorKind::Base64(_)
                    | ErrorKind::Json(_)
                    | ErrorKind::Utf8(_) => TokenError::Malformed,
                    ErrorKind::InvalidSignature => TokenError::InvalidSignature,
                    ErrorKind::ExpiredSignature => TokenError::Expired,
                    ErrorKind::ImmatureSignature => TokenError::NotYetValid,
                    _ => TokenError::Other(e.to_string()),
                };
                tracing::debug!(reason = %reason, "JWT validation error");
                reason
            })
    }
}
