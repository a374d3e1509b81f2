//! Application configuration management.

use serde::Deserialize;

/// Application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Server configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Database configuration.
    pub database: DatabaseConfig,
    /// JWT configuration.
    pub jwt: JwtSettings,
    /// DIAN electronic-invoicing configuration.
    #[serde(default)]
    pub dian: DianConfig,
}

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to.
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Database connection URL.
    pub url: String,
    /// Maximum number of connections in the pool.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 {
    25
}

/// JWT configuration (wire-level settings; the signing service lives in `jwt`).
#[derive(Debug, Clone, Deserialize)]
pub struct JwtSettings {
    /// Secret key for signing tokens.
    pub secret: String,
    /// Token expiration in minutes.
    #[serde(default = "default_expiration_minutes")]
    pub expiration_minutes: i64,
    /// Token issuer.
    #[serde(default = "default_issuer")]
    pub issuer: String,
}

fn default_expiration_minutes() -> i64 {
    60
}

fn default_issuer() -> String {
    "andino".to_string()
}

/// Target DIAN deployment for the orchestrator.
///
/// `dev` never calls the web service; `test` submits to habilitación,
/// `prod` to production.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DianAppEnv {
    /// Local development: sign only, mock the submission.
    Dev,
    /// Habilitación (pre-production) web service.
    Test,
    /// Production web service.
    Prod,
}

impl DianAppEnv {
    /// Parses the `DIAN_APP_ENV` value. Empty defaults to `Dev`.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "" | "dev" => Some(Self::Dev),
            "test" => Some(Self::Test),
            "prod" => Some(Self::Prod),
            _ => None,
        }
    }
}

/// DIAN electronic-invoicing configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DianConfig {
    /// Technical key of the billing resolution (required for CUFE).
    #[serde(default)]
    pub technical_key: String,
    /// CUFE environment marker: "1" = production, "2" = habilitación.
    #[serde(default = "default_dian_environment")]
    pub environment: String,
    /// Deployment marker: "dev", "test" or "prod" (raw; parsed on use).
    #[serde(default)]
    pub app_env: String,
    /// Path to the signing certificate (.pem or .p12/.pfx).
    #[serde(default)]
    pub cert_path: String,
    /// Path to the private key (.pem) when `cert_path` holds only the cert.
    #[serde(default)]
    pub cert_key_path: String,
    /// Password of the .p12 keystore. May be empty.
    #[serde(default)]
    pub cert_password: String,
}

fn default_dian_environment() -> String {
    "2".to_string()
}

impl AppConfig {
    /// Loads configuration from config files and the environment.
    ///
    /// Sources, in increasing priority: `config/default`, `config/{RUN_MODE}`,
    /// `ANDINO__`-prefixed environment variables, and finally the flat
    /// variables named in the deployment docs (`DATABASE_URL`, `DB_HOST`...,
    /// `JWT_SECRET`, `DIAN_TECHNICAL_KEY`, ...).
    ///
    /// # Errors
    ///
    /// Returns an error if no database URL or JWT secret can be resolved.
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".to_string());

        let layered = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{run_mode}")).required(false))
            .add_source(config::Environment::with_prefix("ANDINO").separator("__"))
            .build()?;

        // The flat variables win so `docker run -e DATABASE_URL=...` behaves
        // as operators expect.
        let database_url = env_or(&layered, "database.url", "DATABASE_URL")
            .or_else(database_url_from_parts)
            .ok_or_else(|| {
                config::ConfigError::Message(
                    "database URL not configured (DATABASE_URL or DB_HOST/DB_PORT/...)".into(),
                )
            })?;

        let jwt_secret = env_or(&layered, "jwt.secret", "JWT_SECRET").ok_or_else(|| {
            config::ConfigError::Message("JWT_SECRET not configured".into())
        })?;

        Ok(Self {
            server: ServerConfig {
                host: env_or(&layered, "server.host", "HTTP_HOST").unwrap_or_else(default_host),
                port: env_or(&layered, "server.port", "HTTP_PORT")
                    .and_then(|p| p.parse().ok())
                    .unwrap_or_else(default_port),
            },
            database: DatabaseConfig {
                url: database_url,
                max_connections: env_or(&layered, "database.max_connections", "DB_MAX_CONNECTIONS")
                    .and_then(|p| p.parse().ok())
                    .unwrap_or_else(default_max_connections),
            },
            jwt: JwtSettings {
                secret: jwt_secret,
                expiration_minutes: env_or(&layered, "jwt.expiration_minutes", "JWT_EXPIRATION_MINUTES")
                    .and_then(|p| p.parse().ok())
                    .unwrap_or_else(default_expiration_minutes),
                issuer: env_or(&layered, "jwt.issuer", "JWT_ISSUER").unwrap_or_else(default_issuer),
            },
            dian: DianConfig {
                technical_key: env_or(&layered, "dian.technical_key", "DIAN_TECHNICAL_KEY")
                    .unwrap_or_default(),
                environment: env_or(&layered, "dian.environment", "DIAN_ENVIRONMENT")
                    .unwrap_or_else(default_dian_environment),
                app_env: env_or(&layered, "dian.app_env", "DIAN_APP_ENV").unwrap_or_default(),
                cert_path: env_or(&layered, "dian.cert_path", "DIAN_CERT_PATH").unwrap_or_default(),
                cert_key_path: env_or(&layered, "dian.cert_key_path", "DIAN_CERT_KEY_PATH")
                    .unwrap_or_default(),
                cert_password: env_or(&layered, "dian.cert_password", "DIAN_CERT_PASSWORD")
                    .unwrap_or_default(),
            },
        })
    }
}

/// Looks up a value in the layered config, then in a flat env variable.
fn env_or(layered: &config::Config, key: &str, env_name: &str) -> Option<String> {
    std::env::var(env_name)
        .ok()
        .filter(|v| !v.is_empty())
        .or_else(|| layered.get_string(key).ok())
}

/// Assembles a Postgres URL from the discrete `DB_*` variables.
fn database_url_from_parts() -> Option<String> {
    let host = std::env::var("DB_HOST").ok()?;
    let port = std::env::var("DB_PORT").unwrap_or_else(|_| "5432".to_string());
    let user = std::env::var("DB_USER").unwrap_or_else(|_| "postgres".to_string());
    let password = std::env::var("DB_PASSWORD").unwrap_or_default();
    let name = std::env::var("DB_NAME").unwrap_or_else(|_| "andino".to_string());
    let sslmode = std::env::var("DB_SSLMODE").unwrap_or_else(|_| "disable".to_string());
    Some(format!(
        "postgres://{user}:{password}@{host}:{port}/{name}?sslmode={sslmode}"
    ))
}
