mod auth;
mod health_check;
mod rpc;

pub use auth::{
    delete_account, get_current_user, login, logout, logout_all, refresh, register,
    CredentialsRequest, LogoutAllResponse, RegisterResponse, SessionResponse, UserResponse,
    ACCESS_TOKEN_COOKIE, REFRESH_TOKEN_COOKIE,
};
pub use health_check::health_check;
pub use rpc::{is_admin, validate_token, IsAdminResponse, TokenResponse};
