//! Configuration system for the activation server.
//!
//! Configuration is loaded from multiple sources with the following precedence:
//! 1. Environment variables (highest priority)
//! 2. `config.toml` file
//! 3. Default values (lowest priority)
//!
//! # Environment Variables
//!
//! - `ACTIVATOR_SERVER_HOST` - Server bind address (`0.0.0.0` to listen on all interfaces)
//! - `ACTIVATOR_SERVER_PORT` - Server port
//! - `ACTIVATOR_DATABASE_TYPE` - `sqlite` or `postgres`
//! - `ACTIVATOR_DATABASE_URL` - Database connection URL
//! - `ACTIVATOR_DATABASE_MAX_CONNECTIONS` - Connection pool size
//! - `ACTIVATOR_ISSUANCE_ENABLED` - Mount `POST /code/get`
//! - `ACTIVATOR_ISSUANCE_SECRET_KEY` - Shared secret for code issuance
//! - `ACTIVATOR_ISSUANCE_BATCH_SIZE` - Codes generated per pool refill
//! - `ACTIVATOR_ISSUANCE_CODE_SEED` - Static seed mixed into generated codes
//! - `ACTIVATOR_LOG_LEVEL` - Log level (trace, debug, info, warn, error)
//! - `ACTIVATOR_LOG_FILE` - Append-only request log file (empty disables it)
//! - `ACTIVATOR_CORS_ENABLED` - Attach the CORS layer

use config::{Config, ConfigError};
use serde::Deserialize;
use std::env;
use std::sync::OnceLock;

use crate::activation_code::{DEFAULT_BATCH_SIZE, DEFAULT_CODE_SEED};
use crate::errors::{LicenseError, LicenseResult};

/// Global configuration singleton.
static CONFIG: OnceLock<ActivatorConfig> = OnceLock::new();

/// Root configuration structure.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ActivatorConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub issuance: IssuanceConfig,
    pub logging: LoggingConfig,
    pub cors: CorsConfig,
}

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host address to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8090,
        }
    }
}

impl ServerConfig {
    /// `host:port` string suitable for `TcpListener::bind`.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Database type: "sqlite" or "postgres"
    pub db_type: String,
    /// SQLite connection URL
    pub sqlite_url: String,
    /// PostgreSQL connection URL
    pub postgres_url: String,
    /// Maximum pooled connections
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            db_type: "sqlite".to_string(),
            sqlite_url: "sqlite://activator.db?mode=rwc".to_string(),
            postgres_url: "postgres://localhost/activator".to_string(),
            max_connections: 5,
        }
    }
}

/// Activation code issuance configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct IssuanceConfig {
    /// Expose `POST /code/get`
    pub enabled: bool,
    /// Shared secret callers must present
    pub secret_key: String,
    /// Codes generated whenever the pool runs dry
    pub batch_size: usize,
    /// Static seed hashed into every generated code
    pub code_seed: String,
}

impl Default for IssuanceConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            secret_key: String::new(),
            batch_size: DEFAULT_BATCH_SIZE,
            code_seed: DEFAULT_CODE_SEED.to_string(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    pub level: String,
    /// Plain-text log file appended to alongside stdout; empty disables it
    pub file: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: "activator.log".to_string(),
        }
    }
}

/// CORS configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CorsConfig {
    pub enabled: bool,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

fn config_error(e: ConfigError) -> LicenseError {
    LicenseError::ConfigError(e.to_string())
}

fn env_parsed<T: std::str::FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.parse::<T>().ok())
}

impl ActivatorConfig {
    /// Load configuration from file and environment.
    ///
    /// Configuration is loaded in this order (later sources override earlier):
    /// 1. Default values
    /// 2. `config.toml` file (optional)
    /// 3. Environment variables
    pub fn load() -> LicenseResult<Self> {
        let defaults = ActivatorConfig::default();

        let builder = Config::builder()
            .set_default("server.host", defaults.server.host)
            .map_err(config_error)?
            .set_default("server.port", i64::from(defaults.server.port))
            .map_err(config_error)?
            .set_default("database.db_type", defaults.database.db_type)
            .map_err(config_error)?
            .set_default("database.sqlite_url", defaults.database.sqlite_url)
            .map_err(config_error)?
            .set_default("database.postgres_url", defaults.database.postgres_url)
            .map_err(config_error)?
            .set_default(
                "database.max_connections",
                i64::from(defaults.database.max_connections),
            )
            .map_err(config_error)?
            .set_default("issuance.enabled", defaults.issuance.enabled)
            .map_err(config_error)?
            .set_default("issuance.secret_key", defaults.issuance.secret_key)
            .map_err(config_error)?
            .set_default("issuance.batch_size", defaults.issuance.batch_size as i64)
            .map_err(config_error)?
            .set_default("issuance.code_seed", defaults.issuance.code_seed)
            .map_err(config_error)?
            .set_default("logging.level", defaults.logging.level)
            .map_err(config_error)?
            .set_default("logging.file", defaults.logging.file)
            .map_err(config_error)?
            .set_default("cors.enabled", defaults.cors.enabled)
            .map_err(config_error)?
            // Load from config.toml (optional)
            .add_source(config::File::with_name("config").required(false))
            // Override with environment variables
            .set_override_option("server.host", env::var("ACTIVATOR_SERVER_HOST").ok())
            .map_err(config_error)?
            .set_override_option("server.port", env_parsed::<i64>("ACTIVATOR_SERVER_PORT"))
            .map_err(config_error)?
            .set_override_option(
                "database.db_type",
                env::var("ACTIVATOR_DATABASE_TYPE").ok(),
            )
            .map_err(config_error)?
            .set_override_option(
                "database.sqlite_url",
                env::var("ACTIVATOR_DATABASE_URL")
                    .ok()
                    .filter(|url| url.starts_with("sqlite")),
            )
            .map_err(config_error)?
            .set_override_option(
                "database.postgres_url",
                env::var("ACTIVATOR_DATABASE_URL")
                    .ok()
                    .filter(|url| url.starts_with("postgres")),
            )
            .map_err(config_error)?
            .set_override_option(
                "database.max_connections",
                env_parsed::<i64>("ACTIVATOR_DATABASE_MAX_CONNECTIONS"),
            )
            .map_err(config_error)?
            .set_override_option(
                "issuance.enabled",
                env_parsed::<bool>("ACTIVATOR_ISSUANCE_ENABLED"),
            )
            .map_err(config_error)?
            .set_override_option(
                "issuance.secret_key",
                env::var("ACTIVATOR_ISSUANCE_SECRET_KEY").ok(),
            )
            .map_err(config_error)?
            .set_override_option(
                "issuance.batch_size",
                env_parsed::<i64>("ACTIVATOR_ISSUANCE_BATCH_SIZE"),
            )
            .map_err(config_error)?
            .set_override_option(
                "issuance.code_seed",
                env::var("ACTIVATOR_ISSUANCE_CODE_SEED").ok(),
            )
            .map_err(config_error)?
            .set_override_option("logging.level", env::var("ACTIVATOR_LOG_LEVEL").ok())
            .map_err(config_error)?
            .set_override_option("logging.file", env::var("ACTIVATOR_LOG_FILE").ok())
            .map_err(config_error)?
            .set_override_option(
                "cors.enabled",
                env_parsed::<bool>("ACTIVATOR_CORS_ENABLED"),
            )
            .map_err(config_error)?;

        let settings = builder
            .build()
            .map_err(|e| LicenseError::ConfigError(format!("failed to build config: {e}")))?;

        settings
            .try_deserialize()
            .map_err(|e| LicenseError::ConfigError(format!("failed to deserialize config: {e}")))
    }

    /// Validate the configuration.
    pub fn validate(&self) -> LicenseResult<()> {
        if self.server.port == 0 {
            return Err(LicenseError::ConfigError(
                "server.port must be greater than 0".to_string(),
            ));
        }

        match self.database.db_type.as_str() {
            "sqlite" | "postgres" => {}
            other => {
                return Err(LicenseError::ConfigError(format!(
                    "database.db_type must be 'sqlite' or 'postgres', got '{other}'"
                )));
            }
        }

        if self.database.max_connections == 0 {
            return Err(LicenseError::ConfigError(
                "database.max_connections must be greater than 0".to_string(),
            ));
        }

        if self.issuance.batch_size == 0 {
            return Err(LicenseError::ConfigError(
                "issuance.batch_size must be greater than 0".to_string(),
            ));
        }
        if self.issuance.code_seed.is_empty() {
            return Err(LicenseError::ConfigError(
                "issuance.code_seed cannot be empty".to_string(),
            ));
        }
        if self.issuance.enabled && self.issuance.secret_key.is_empty() {
            return Err(LicenseError::ConfigError(
                "issuance.secret_key is required when issuance.enabled is true".to_string(),
            ));
        }

        match self.logging.level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            other => {
                return Err(LicenseError::ConfigError(format!(
                    "logging.level must be one of: trace, debug, info, warn, error. Got '{other}'"
                )));
            }
        }

        Ok(())
    }
}

/// Get the global configuration.
///
/// Loads and validates on first access, then returns the cached value.
pub fn get_config() -> LicenseResult<&'static ActivatorConfig> {
    if let Some(config) = CONFIG.get() {
        return Ok(config);
    }

    let config = ActivatorConfig::load()?;
    config.validate()?;

    // Another thread may have won the race; either value is valid.
    let _ = CONFIG.set(config);

    CONFIG
        .get()
        .ok_or_else(|| LicenseError::ConfigError("configuration was not initialized".to_string()))
}
