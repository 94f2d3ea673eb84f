/// Authentication Routes
///
/// Register, login, token rotation, logout and account management. Tokens
/// travel as httpOnly, SameSite=Strict cookies whose max-age equals the TTL.

use actix_web::cookie::{time::Duration as CookieDuration, Cookie, SameSite};
use actix_web::{web, HttpRequest, HttpResponse, HttpResponseBuilder};
use serde::{Deserialize, Serialize};

use crate::auth::Claims;
use crate::error::{AppError, AuthError, ErrorContext};
use crate::session::{SessionManager, TokenPair};
use crate::validators::{is_valid_email, is_valid_password};

pub const ACCESS_TOKEN_COOKIE: &str = "access_token";
pub const REFRESH_TOKEN_COOKIE: &str = "refresh_token";

/// Credentials for register and login
#[derive(Deserialize)]
pub struct CredentialsRequest {
    pub email: String,
    pub password: String,
}

#[derive(Serialize, Deserialize)]
pub struct RegisterResponse {
    pub user_id: i64,
}

/// Token lifetimes, in seconds, of the cookies just set
#[derive(Serialize, Deserialize)]
pub struct SessionResponse {
    pub access_token_expires_in: i64,
    pub refresh_token_expires_in: i64,
}

#[derive(Serialize, Deserialize)]
pub struct UserResponse {
    pub user_id: i64,
    pub email: String,
    pub is_admin: bool,
}

#[derive(Serialize, Deserialize)]
pub struct LogoutAllResponse {
    pub revoked_sessions: u64,
}

fn token_cookie(name: &'static str, value: String, max_age_seconds: i64) -> Cookie<'static> {
    Cookie::build(name, value)
        .path("/")
        .http_only(true)
        .same_site(SameSite::Strict)
        .max_age(CookieDuration::seconds(max_age_seconds))
        .finish()
}

fn set_auth_cookies(builder: &mut HttpResponseBuilder, pair: TokenPair, session: &SessionManager) {
    builder
        .cookie(token_cookie(
            ACCESS_TOKEN_COOKIE,
            pair.access_token,
            session.access_ttl().num_seconds(),
        ))
        .cookie(token_cookie(
            REFRESH_TOKEN_COOKIE,
            pair.refresh_token,
            session.refresh_ttl().num_seconds(),
        ));
}

fn clear_auth_cookies(builder: &mut HttpResponseBuilder) {
    builder
        .cookie(token_cookie(ACCESS_TOKEN_COOKIE, String::new(), -1))
        .cookie(token_cookie(REFRESH_TOKEN_COOKIE, String::new(), -1));
}

fn session_response(session: &SessionManager) -> SessionResponse {
    SessionResponse {
        access_token_expires_in: session.access_ttl().num_seconds(),
        refresh_token_expires_in: session.refresh_ttl().num_seconds(),
    }
}

fn refresh_cookie(req: &HttpRequest) -> Result<String, AppError> {
    req.cookie(REFRESH_TOKEN_COOKIE)
        .map(|c| c.value().to_string())
        .filter(|v| !v.is_empty())
        .ok_or(AppError::Auth(AuthError::TokenNotFound))
}

/// POST /auth/register
///
/// # Errors
/// - 400: invalid email or password
/// - 409: email already registered
/// - 500: internal error
pub async fn register(
    form: web::Json<CredentialsRequest>,
    session: web::Data<SessionManager>,
) -> Result<HttpResponse, AppError> {
    let context = ErrorContext::new("user_registration");

    let email = is_valid_email(&form.email)?;
    is_valid_password(&form.password)?;

    let user_id = session.register(&email, &form.password).await.map_err(|e| {
        let err = AppError::from(e);
        context.log_error(&err);
        err
    })?;

    tracing::info!(request_id = %context.request_id, user_id = user_id, "Registration completed");
    Ok(HttpResponse::Created().json(RegisterResponse { user_id }))
}

/// POST /auth/login
///
/// Same 401 for unknown email and wrong password.
pub async fn login(
    form: web::Json<CredentialsRequest>,
    session: web::Data<SessionManager>,
) -> Result<HttpResponse, AppError> {
    let context = ErrorContext::new("user_login");

    let pair = session
        .login(form.email.trim(), &form.password)
        .await
        .map_err(|e| {
            let err = AppError::from(e);
            context.log_error(&err);
            err
        })?;

    let mut response = HttpResponse::Ok();
    set_auth_cookies(&mut response, pair, &session);
    Ok(response.json(session_response(&session)))
}

/// POST /auth/refresh
///
/// Rotates the refresh cookie; the presented token is dead afterwards.
pub async fn refresh(
    req: HttpRequest,
    session: web::Data<SessionManager>,
) -> Result<HttpResponse, AppError> {
    let context = ErrorContext::new("token_refresh");
    let raw = refresh_cookie(&req)?;

    let pair = session.refresh_tokens(&raw).await.map_err(|e| {
        let err = AppError::from(e);
        context.log_error(&err);
        err
    })?;

    let mut response = HttpResponse::Ok();
    set_auth_cookies(&mut response, pair, &session);
    Ok(response.json(session_response(&session)))
}

/// POST /auth/logout
pub async fn logout(
    req: HttpRequest,
    session: web::Data<SessionManager>,
) -> Result<HttpResponse, AppError> {
    let context = ErrorContext::new("user_logout");
    let raw = refresh_cookie(&req)?;

    session.logout(&raw).await.map_err(|e| {
        let err = AppError::from(e);
        context.log_error(&err);
        err
    })?;

    let mut response = HttpResponse::Ok();
    clear_auth_cookies(&mut response);
    Ok(response.finish())
}

/// POST /auth/logout-all (access token required)
pub async fn logout_all(
    claims: web::ReqData<Claims>,
    session: web::Data<SessionManager>,
) -> Result<HttpResponse, AppError> {
    let user_id = claims.user_id()?;
    let revoked_sessions = session.logout_everywhere(user_id).await?;

    let mut response = HttpResponse::Ok();
    clear_auth_cookies(&mut response);
    Ok(response.json(LogoutAllResponse { revoked_sessions }))
}

/// GET /auth/me (access token required)
pub async fn get_current_user(
    claims: web::ReqData<Claims>,
    session: web::Data<SessionManager>,
) -> Result<HttpResponse, AppError> {
    let user_id = claims.user_id()?;
    let is_admin = session.is_admin(user_id).await?;

    Ok(HttpResponse::Ok().json(UserResponse {
        user_id,
        email: claims.email.clone(),
        is_admin,
    }))
}

/// DELETE /auth/account (access token required)
pub async fn delete_account(
    claims: web::ReqData<Claims>,
    session: web::Data<SessionManager>,
) -> Result<HttpResponse, AppError> {
    let user_id = claims.user_id()?;
    let context = ErrorContext::new("account_deletion").with_user_id(user_id);

    session.delete_account(user_id).await.map_err(|e| {
        let err = AppError::from(e);
        context.log_error(&err);
        err
    })?;

    let mut response = HttpResponse::NoContent();
    clear_auth_cookies(&mut response);
    Ok(response.finish())
}
