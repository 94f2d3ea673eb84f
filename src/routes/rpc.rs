/// Remote-call routes consumed by other services
///
/// `validate-token` is purely stateless; every token failure collapses into
/// one "invalid token" answer.

use actix_web::{web, HttpResponse};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AuthError};
use crate::session::SessionManager;

#[derive(Deserialize)]
pub struct TokenRequest {
    pub token: String,
}

#[derive(Serialize, Deserialize)]
pub struct TokenResponse {
    pub valid: bool,
    pub user_id: String,
    pub email: String,
}

#[derive(Deserialize)]
pub struct IsAdminRequest {
    pub user_id: i64,
}

#[derive(Serialize, Deserialize)]
pub struct IsAdminResponse {
    pub is_admin: bool,
}

/// POST /rpc/validate-token
pub async fn validate_token(
    body: web::Json<TokenRequest>,
    session: web::Data<SessionManager>,
) -> Result<HttpResponse, AppError> {
    let claims = session
        .validate_token(&body.token)
        .map_err(AppError::InvalidToken)?;

    Ok(HttpResponse::Ok().json(TokenResponse {
        valid: true,
        user_id: claims.sub,
        email: claims.email,
    }))
}

/// POST /rpc/is-admin
pub async fn is_admin(
    body: web::Json<IsAdminRequest>,
    session: web::Data<SessionManager>,
) -> Result<HttpResponse, AppError> {
    let is_admin = session.is_admin(body.user_id).await.map_err(|e| match e {
        AuthError::InvalidCredentials => AppError::NotFound("user"),
        other => AppError::Auth(other),
    })?;

    Ok(HttpResponse::Ok().json(IsAdminResponse { is_admin }))
}
