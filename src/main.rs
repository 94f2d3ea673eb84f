use std::net::TcpListener;
use std::sync::Arc;
use std::time::Duration;

use linkify_auth::auth::TokenValidator;
use linkify_auth::configuration::get_configuration;
use linkify_auth::session::SessionManager;
use linkify_auth::startup::run;
use linkify_auth::store::PostgresStore;
use linkify_auth::telemetry::init_telemetry;
use sqlx::postgres::PgPoolOptions;

#[tokio::main]
async fn main() -> std::io::Result<()> {
    init_telemetry();

    tracing::info!("Starting application");

    let configuration = match get_configuration() {
        Ok(config) => {
            tracing::info!("Configuration loaded successfully");
            config
        }
        Err(e) => {
            tracing::error!("Failed to read configuration: {}", e);
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "Configuration error",
            ));
        }
    };

    // Schema migrations are applied out of band.
    tracing::info!("Attempting to connect to database");
    let pool = PgPoolOptions::new()
        .max_connections(configuration.database.max_connections)
        .acquire_timeout(Duration::from_secs(configuration.database.timeout_seconds))
        .connect(&configuration.database.connection_string())
        .await
        .map_err(|e| {
            tracing::error!("Failed to create connection pool: {}", e);
            std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                "Database connection error",
            )
        })?;

    tracing::info!("Database connection pool created successfully");

    let query_timeout = Duration::from_secs(configuration.database.timeout_seconds);
    let store = Arc::new(PostgresStore::new(pool, query_timeout));
    let session = SessionManager::new(store.clone(), store, &configuration.jwt);
    let validator = TokenValidator::new(&configuration.jwt);

    let address = format!(
        "{}:{}",
        configuration.application.host, configuration.application.port
    );
    let listener = TcpListener::bind(&address)?;
    tracing::info!("Server listening on: {}", address);

    let server = run(listener, session, validator)?;
    server.await
}
