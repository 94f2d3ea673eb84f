/// Error Handling Module
///
/// Error types for the credential service, from domain failures raised by the
/// session layer up to the HTTP responses produced for callers:
/// 1. Domain errors (`AuthError`, `TokenError`, `ValidationError`)
/// 2. Unified transport error (`AppError`)
/// 3. HTTP response mapping with structured logging
/// 4. Error context for request-scoped logging

use actix_web::{error::ResponseError, http::StatusCode, HttpResponse};
use std::error::Error as StdError;
use std::fmt;

use crate::logger::current_request_id;

/// ============================================================================
/// 1. DOMAIN-SPECIFIC ERROR TYPES
/// ============================================================================

/// Validation errors for request input
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    EmptyField(&'static str),
    TooShort(&'static str, usize),
    TooLong(&'static str, usize),
    InvalidFormat(&'static str),
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::EmptyField(field) => write!(f, "{} is empty", field),
            ValidationError::TooShort(field, min) => {
                write!(f, "{} is too short (minimum {} characters)", field, min)
            }
            ValidationError::TooLong(field, max) => {
                write!(f, "{} is too long (maximum {} characters)", field, max)
            }
            ValidationError::InvalidFormat(field) => write!(f, "{} has invalid format", field),
        }
    }
}

impl StdError for ValidationError {}

/// Credential and session errors.
///
/// These cross the `SessionManager` boundary unchanged. Storage adapters
/// translate backend constraint violations into these variants; anything else
/// becomes `Internal` with a fixed description of the failed operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// Bad login, unknown email, or admin lookup on an unknown user
    InvalidCredentials,
    /// Duplicate email on register
    UserExists,
    /// Storage-level miss on a user row
    UserNotFound,
    /// No refresh record for the presented token
    TokenNotFound,
    /// Refresh record exists but is past its expiry
    TokenExpired,
    /// Refresh record could not be turned into a new session
    TokenProcessing,
    /// Unexpected storage, hashing or signing failure
    Internal(String),
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthError::InvalidCredentials => write!(f, "Invalid credentials"),
            AuthError::UserExists => write!(f, "User already exists"),
            AuthError::UserNotFound => write!(f, "User not found"),
            AuthError::TokenNotFound => write!(f, "Refresh token not found"),
            AuthError::TokenExpired => write!(f, "Refresh token expired"),
            AuthError::TokenProcessing => write!(f, "Refresh token could not be processed"),
            AuthError::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl StdError for AuthError {}

/// Reasons a signed token fails verification
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenError {
    Malformed,
    InvalidSignature,
    Expired,
    NotYetValid,
    Other(String),
}

impl fmt::Display for TokenError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenError::Malformed => write!(f, "malformed token"),
            TokenError::InvalidSignature => write!(f, "invalid signature"),
            TokenError::Expired => write!(f, "token expired"),
            TokenError::NotYetValid => write!(f, "token not active yet"),
            TokenError::Other(msg) => write!(f, "couldn't handle this token: {}", msg),
        }
    }
}

impl StdError for TokenError {}

/// ============================================================================
/// 2. UNIFIED APPLICATION ERROR TYPE
/// ============================================================================

/// Error returned by HTTP handlers.
///
/// `Unauthenticated` is raised by the middleware when a protected route has
/// no usable access token; `InvalidToken` is the collapsed form of every
/// `TokenError` on the remote-call surface.
#[derive(Debug)]
pub enum AppError {
    Validation(ValidationError),
    Auth(AuthError),
    InvalidToken(TokenError),
    Unauthenticated(TokenError),
    NotFound(&'static str),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Validation(e) => write!(f, "{}", e),
            AppError::Auth(e) => write!(f, "{}", e),
            AppError::InvalidToken(e) => write!(f, "invalid token: {}", e),
            AppError::Unauthenticated(e) => write!(f, "unauthenticated: {}", e),
            AppError::NotFound(what) => write!(f, "{} not found", what),
        }
    }
}

impl StdError for AppError {}

// ============================================================================
// FROM IMPLEMENTATIONS
// ============================================================================

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        AppError::Validation(err)
    }
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        AppError::Auth(err)
    }
}

// ============================================================================
// 3. HTTP RESPONSE MAPPING
// ============================================================================

/// Error response structure for HTTP responses
#[derive(Debug, serde::Serialize, serde::Deserialize)]
pub struct ErrorResponse {
    /// Unique error ID for tracking
    pub error_id: String,
    /// Human-readable error message
    pub message: String,
    /// Error code for client-side handling
    pub code: String,
    /// HTTP status code
    pub status: u16,
    /// Timestamp when error occurred
    pub timestamp: String,
}

impl ErrorResponse {
    pub fn new(error_id: String, message: String, code: String, status: u16) -> Self {
        Self {
            error_id,
            message,
            code,
            status,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Trait for converting errors to HTTP responses with proper logging
pub trait ErrorHandler {
    fn error_response(&self, request_id: &str) -> (StatusCode, ErrorResponse);
    fn log_error(&self, request_id: &str);
}

impl AppError {
    fn classify(&self) -> (StatusCode, &'static str, String) {
        match self {
            AppError::Validation(e) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", e.to_string()),

            AppError::Auth(e) => match e {
                AuthError::InvalidCredentials | AuthError::UserNotFound => (
                    StatusCode::UNAUTHORIZED,
                    "INVALID_CREDENTIALS",
                    "Invalid credentials".to_string(),
                ),
                AuthError::UserExists => (
                    StatusCode::CONFLICT,
                    "ALREADY_EXISTS",
                    "User already exists".to_string(),
                ),
                AuthError::TokenNotFound | AuthError::TokenExpired | AuthError::TokenProcessing => (
                    StatusCode::UNAUTHORIZED,
                    "UNAUTHORIZED",
                    "Invalid refresh token".to_string(),
                ),
                AuthError::Internal(_) => (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "Internal server error".to_string(),
                ),
            },

            AppError::InvalidToken(_) => (
                StatusCode::BAD_REQUEST,
                "INVALID_ARGUMENT",
                "invalid token".to_string(),
            ),

            AppError::Unauthenticated(_) => (
                StatusCode::UNAUTHORIZED,
                "TOKEN_INVALID",
                "Invalid or expired token".to_string(),
            ),

            AppError::NotFound(what) => (StatusCode::NOT_FOUND, "NOT_FOUND", format!("{} not found", what)),
        }
    }
}

impl ErrorHandler for AppError {
    fn error_response(&self, request_id: &str) -> (StatusCode, ErrorResponse) {
        let (status, code, message) = self.classify();
        let error_response =
            ErrorResponse::new(request_id.to_string(), message, code.to_string(), status.as_u16());
        (status, error_response)
    }

    fn log_error(&self, request_id: &str) {
        match self {
            AppError::Validation(e) => {
                tracing::warn!(request_id = request_id, error = %e, "Validation error");
            }
            AppError::Auth(AuthError::Internal(msg)) => {
                tracing::error!(request_id = request_id, error = %msg, "Internal error");
            }
            AppError::Auth(AuthError::InvalidCredentials) => {
                tracing::warn!(request_id = request_id, error = %self, "Invalid credentials attempt");
            }
            AppError::Auth(e) => {
                tracing::warn!(request_id = request_id, error = %e, "Authentication error");
            }
            AppError::InvalidToken(e) | AppError::Unauthenticated(e) => {
                tracing::warn!(request_id = request_id, reason = %e, "Token rejected");
            }
            AppError::NotFound(what) => {
                tracing::info!(request_id = request_id, resource = *what, "Resource not found");
            }
        }
    }
}

/// Implement ResponseError for Actix-web integration
impl ResponseError for AppError {
    fn error_response(&self) -> HttpResponse {
        let request_id = request_id();
        self.log_error(&request_id);

        let (status, error_response) = <Self as ErrorHandler>::error_response(self, &request_id);

        HttpResponse::build(status).json(error_response)
    }

    fn status_code(&self) -> StatusCode {
        self.classify().0
    }
}

/// Id of the request being served, or a fresh one outside `RequestLogger`
fn request_id() -> String {
    current_request_id().unwrap_or_else(|| uuid::Uuid::new_v4().to_string())
}

// ============================================================================
// 4. ERROR CONTEXT ENRICHMENT
// ============================================================================

/// Request-scoped context attached to log events of one operation
#[derive(Debug, Clone)]
pub struct ErrorContext {
    pub request_id: String,
    pub user_id: Option<String>,
    pub operation: String,
}

impl ErrorContext {
    pub fn new(operation: impl Into<String>) -> Self {
        Self {
            request_id: request_id(),
            user_id: None,
            operation: operation.into(),
        }
    }

    pub fn with_user_id(mut self, user_id: impl ToString) -> Self {
        self.user_id = Some(user_id.to_string());
        self
    }

    pub fn log_error(&self, error: &AppError) {
        match error {
            AppError::Auth(AuthError::Internal(_)) => {
                tracing::error!(
                    request_id = %self.request_id,
                    operation = %self.operation,
                    user_id = ?self.user_id,
                    error = %error,
                    "Operation failed"
                );
            }
            _ => {
                tracing::warn!(
                    request_id = %self.request_id,
                    operation = %self.operation,
                    user_id = ?self.user_id,
                    error = %error,
                    "Operation rejected"
                );
            }
        }
    }
}
