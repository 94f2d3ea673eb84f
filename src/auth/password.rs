/// Password Hashing and Verification
///
/// One-way bcrypt hashing with a fixed cost factor chosen at construction.

use bcrypt::{hash, verify};

use crate::error::AuthError;

/// Hashes passwords on register and checks them on login
#[derive(Debug, Clone)]
pub struct CredentialVerifier {
    cost: u32,
}

impl CredentialVerifier {
    /// # Arguments
    /// * `cost` - bcrypt cost factor (4..=31)
    pub fn new(cost: u32) -> Self {
        Self { cost }
    }

    /// Hash a password with a fresh random salt
    ///
    /// Two calls with the same input produce different digests; both verify.
    ///
    /// # Errors
    /// Returns `AuthError::Internal` if bcrypt fails (invalid cost, no entropy)
    pub fn hash(&self, password: &str) -> Result<String, AuthError> {
        hash(password, self.cost).map_err(|e| {
            tracing::error!(error = %e, "Password hashing failed");
            AuthError::Internal("password hashing failed".to_string())
        })
    }

    /// Check a password against a stored digest
    ///
    /// Any mismatch, including a digest that is not a bcrypt hash, is `false`.
    pub fn verify(&self, password: &str, digest: &str) -> bool {
        match verify(password, digest) {
            Ok(matches) => matches,
            Err(e) => {
                tracing::warn!(error = %e, "Stored password digest could not be checked");
                false
            }
        }
    }
}
