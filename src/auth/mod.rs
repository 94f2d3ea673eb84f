/// Authentication module
///
/// Password hashing, token signing/verification and refresh token hashing.

mod claims;
mod jwt;
mod password;
mod refresh_token;

pub use claims::Claims;
pub use jwt::TokenIssuer;
pub use jwt::TokenValidator;
pub use password::CredentialVerifier;
pub use refresh_token::hash_token;
pub use refresh_token::RefreshTokenRecord;
