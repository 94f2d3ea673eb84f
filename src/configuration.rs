use config::ConfigError;

#[derive(serde::Deserialize, Clone, Debug)]
pub struct Settings {
    pub database: DatabaseSettings,
    pub application: ApplicationSettings,
    pub jwt: JwtSettings,
}

#[derive(serde::Deserialize, Clone, Debug)]
pub struct ApplicationSettings {
    #[serde(default = "default_host")]
    pub host: String,
    pub port: u16,
}

#[derive(serde::Deserialize, Clone, Debug)]
pub struct DatabaseSettings {
    pub username: String,
    pub password: String,
    pub port: u16,
    pub host: String,
    pub database_name: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Deadline for acquiring a connection and for each storage call; a
    /// stalled store surfaces as an internal error
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
}

impl DatabaseSettings {
    pub fn connection_string(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}",
            self.username, self.password, self.host, self.port, self.database_name
        )
    }

    pub fn connection_string_without_db(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}",
            self.username, self.password, self.host, self.port
        )
    }
}

/// Token signing and password hashing settings.
///
/// The secret is shared by every issuer and validator built from these
/// settings; changing it invalidates all outstanding tokens.
#[derive(serde::Deserialize, Clone, Debug)]
pub struct JwtSettings {
    pub secret: String,
    pub access_token_expiry: i64,   // seconds (e.g., 900 for 15 minutes)
    pub refresh_token_expiry: i64,  // seconds (e.g., 604800 for 7 days)
    pub issuer: String,
    #[serde(default = "default_password_cost")]
    pub password_cost: u32,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_max_connections() -> u32 {
    5
}

fn default_timeout_seconds() -> u64 {
    3
}

fn default_password_cost() -> u32 {
    bcrypt::DEFAULT_COST
}

/// Load settings from `configuration.yaml` (optional) and `APP_*` variables.
///
/// Nested keys use `__`, e.g. `APP_JWT__SECRET` or `APP_DATABASE__HOST`.
pub fn get_configuration() -> Result<Settings, ConfigError> {
    let settings = config::Config::builder()
        .add_source(config::File::with_name("configuration").required(false))
        .add_source(
            config::Environment::with_prefix("APP")
                .prefix_separator("_")
                .separator("__"),
        )
        .build()?;
    settings.try_deserialize::<Settings>()
}
