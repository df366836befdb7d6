//! Server configuration module.
//!
//! Configuration is loaded from environment variables with fallback to defaults.

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;

use tracing::warn;

/// Used when `LIBRIS_JWT_SECRET` is unset. Fine for development only.
const DEV_JWT_SECRET: &str = "libris-dev-secret-change-in-production";

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address the HTTP listener binds to
    pub http_addr: SocketAddr,

    /// SQLite database file
    pub database_path: PathBuf,

    /// Connection pool size
    pub db_max_connections: u32,

    /// Secret key for signing tokens
    pub jwt_secret: String,

    /// Access token lifetime in seconds
    pub token_lifetime_secs: i64,
}

impl ServerConfig {
    /// Load configuration from environment variables.
    ///
    /// ## Variables
    /// - `LIBRIS_HTTP_ADDR` (default `0.0.0.0:8080`)
    /// - `LIBRIS_DATABASE_PATH` (default `./libris.db`)
    /// - `LIBRIS_DB_MAX_CONNECTIONS` (default 5)
    /// - `LIBRIS_JWT_SECRET` (default: a development secret, with a warning)
    /// - `LIBRIS_TOKEN_LIFETIME_SECS` (default 86400)
    pub fn load() -> Result<Self, ConfigError> {
        let jwt_secret = match env::var("LIBRIS_JWT_SECRET") {
            Ok(secret) if !secret.trim().is_empty() => secret,
            _ => {
                warn!("LIBRIS_JWT_SECRET not set, using the development secret");
                DEV_JWT_SECRET.to_string()
            }
        };

        let config = ServerConfig {
            http_addr: parse_var("LIBRIS_HTTP_ADDR", "0.0.0.0:8080")?,

            database_path: env::var("LIBRIS_DATABASE_PATH")
                .unwrap_or_else(|_| "./libris.db".to_string())
                .into(),

            db_max_connections: parse_var("LIBRIS_DB_MAX_CONNECTIONS", "5")?,

            jwt_secret,

            token_lifetime_secs: parse_var("LIBRIS_TOKEN_LIFETIME_SECS", "86400")?, // 1 day
        };

        if config.db_max_connections == 0 {
            return Err(ConfigError::InvalidValue("LIBRIS_DB_MAX_CONNECTIONS".to_string()));
        }
        if config.token_lifetime_secs <= 0 {
            return Err(ConfigError::InvalidValue("LIBRIS_TOKEN_LIFETIME_SECS".to_string()));
        }

        Ok(config)
    }

    /// Configuration for tests: in-memory database, fixed secret.
    pub fn for_tests() -> Self {
        ServerConfig {
            http_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
            database_path: PathBuf::from(":memory:"),
            db_max_connections: 1,
            jwt_secret: "test-secret".to_string(),
            token_lifetime_secs: 3600,
        }
    }
}

fn parse_var<T: std::str::FromStr>(name: &str, default: &str) -> Result<T, ConfigError> {
    env::var(name)
        .unwrap_or_else(|_| default.to_string())
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidValue(name.to_string()))
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}")]
    InvalidValue(String),
}
