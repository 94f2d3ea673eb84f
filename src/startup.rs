use actix_web::dev::Server;
use actix_web::{web, App, HttpServer};
use std::net::TcpListener;

use crate::auth::TokenValidator;
use crate::logger::RequestLogger;
use crate::middleware::JwtMiddleware;
use crate::routes::{
    delete_account, get_current_user, health_check, is_admin, login, logout, logout_all, refresh,
    register, validate_token,
};
use crate::session::SessionManager;

/// Build the HTTP server around an already-wired `SessionManager`.
///
/// The validator guards the protected `/auth` routes and must share the
/// session's signing secret.
pub fn run(
    listener: TcpListener,
    session: SessionManager,
    validator: TokenValidator,
) -> Result<Server, std::io::Error> {
    let session = web::Data::new(session);

    let server = HttpServer::new(move || {
        App::new()
            .wrap(RequestLogger)
            .app_data(session.clone())
            .route("/health_check", web::get().to(health_check))
            // Public session routes
            .route("/auth/register", web::post().to(register))
            .route("/auth/login", web::post().to(login))
            .route("/auth/refresh", web::post().to(refresh))
            .route("/auth/logout", web::post().to(logout))
            // Routes requiring an access token
            .service(
                web::scope("/auth")
                    .wrap(JwtMiddleware::new(validator.clone()))
                    .route("/me", web::get().to(get_current_user))
                    .route("/logout-all", web::post().to(logout_all))
                    .route("/account", web::delete().to(delete_account)),
            )
            // Remote-call surface for other services
            .service(
                web::scope("/rpc")
                    .route("/validate-token", web::post().to(validate_token))
                    .route("/is-admin", web::post().to(is_admin)),
            )
    })
    .listen(listener)?
    .run();

    Ok(server)
}
