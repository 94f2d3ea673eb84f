/// Middleware module
///
/// Access token authentication for protected routes.

mod jwt_middleware;

pub use jwt_middleware::JwtMiddleware;
