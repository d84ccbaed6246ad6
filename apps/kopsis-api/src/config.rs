//! API configuration module.
//!
//! Configuration is loaded from environment variables with fallback to defaults.

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;

use kopsis_core::Actor;

/// API configuration.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Address the HTTP server listens on
    pub bind_addr: SocketAddr,

    /// SQLite database file
    pub database_path: PathBuf,

    /// Upper bound of the connection pool
    pub max_connections: u32,

    /// Actor recorded when a request carries no `X-Actor-Id` header
    pub default_actor: String,
}

impl ApiConfig {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        let config = ApiConfig {
            bind_addr: env::var("KOPSIS_BIND_ADDR")
                .unwrap_or_else(|_| "0.0.0.0:8080".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("KOPSIS_BIND_ADDR".to_string()))?,

            database_path: env::var("KOPSIS_DB_PATH")
                .unwrap_or_else(|_| "./kopsis.db".to_string())
                .into(),

            max_connections: env::var("KOPSIS_DB_MAX_CONNECTIONS")
                .unwrap_or_else(|_| "5".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("KOPSIS_DB_MAX_CONNECTIONS".to_string()))?,

            default_actor: env::var("KOPSIS_DEFAULT_ACTOR").unwrap_or_else(|_| "system".to_string()),
        };

        if config.max_connections == 0 {
            return Err(ConfigError::InvalidValue("KOPSIS_DB_MAX_CONNECTIONS".to_string()));
        }
        if config.default_actor.trim().is_empty() {
            return Err(ConfigError::MissingRequired("KOPSIS_DEFAULT_ACTOR".to_string()));
        }

        Ok(config)
    }

    /// Configuration for tests: in-memory database, ephemeral port.
    pub fn for_tests() -> Self {
        ApiConfig {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
            database_path: PathBuf::from(":memory:"),
            max_connections: 1,
            default_actor: "system".to_string(),
        }
    }

    pub fn default_actor(&self) -> Actor {
        Actor::new(self.default_actor.clone(), self.default_actor.clone())
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}")]
    InvalidValue(String),

    #[error("Missing required configuration: {0}")]
    MissingRequired(String),
}
