//! Configuration management for dldata
//!
//! Settings are layered: built-in defaults, then an optional TOML file, then
//! `DLDATA__*` environment variables. The database section is read from the
//! `DATABASE_HOST`, `DATABASE_NAME`, `DATABASE_USER` and `DATABASE_PASSWORD`
//! variables.

use std::path::PathBuf;

use chrono::NaiveDate;
use config::{Config as ConfigBuilder, Environment, File};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Default configuration file name, looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "dldata.toml";

/// Environment variables feeding the database section
const DATABASE_ENV: [(&str, &str); 4] = [
    ("database.host", "DATABASE_HOST"),
    ("database.name", "DATABASE_NAME"),
    ("database.user", "DATABASE_USER"),
    ("database.password", "DATABASE_PASSWORD"),
];

/// Main configuration struct
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Database configuration
    pub database: DatabaseConfig,

    /// Authentication configuration
    #[serde(default)]
    pub auth: AuthConfig,

    /// Dashboard defaults
    #[serde(default)]
    pub dashboard: DashboardConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,
    /// HTTP port
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

/// Database connection parameters
#[derive(Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Database host
    pub host: String,
    /// Database name
    pub name: String,
    /// Database user
    pub user: String,
    /// Database password
    #[serde(default)]
    pub password: String,
}

impl std::fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("host", &self.host)
            .field("name", &self.name)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Authentication configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Path to the YAML credential store
    pub credentials_path: PathBuf,
    /// Interval between expired-session sweeps, in seconds
    pub session_sweep_interval_secs: u64,
    /// Mark the session cookie `Secure` (set when served over HTTPS)
    pub secure_cookies: bool,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            credentials_path: PathBuf::from("auth.yaml"),
            session_sweep_interval_secs: 3600,
            secure_cookies: false,
        }
    }
}

/// Dashboard defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    /// Lower date bound shown before the user picks one
    pub default_date_from: NaiveDate,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            default_date_from: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap_or_default(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level
    pub level: String,
    /// Log format (json or pretty)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from the given file (or `dldata.toml`) and the process environment.
    pub fn load(path: Option<&str>) -> Result<Self> {
        // A missing .env file is fine
        let _ = dotenvy::dotenv();
        Self::load_with_env(path, |key| std::env::var(key).ok())
    }

    /// Load configuration, resolving the `DATABASE_*` variables through `lookup`.
    pub fn load_with_env<F>(path: Option<&str>, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let path = path.unwrap_or(DEFAULT_CONFIG_FILE);

        let mut builder = ConfigBuilder::builder()
            .add_source(File::with_name(path).required(false))
            .add_source(
                Environment::with_prefix("DLDATA")
                    .separator("__")
                    .try_parsing(true),
            );

        for (key, var) in DATABASE_ENV {
            builder = builder.set_override_option(key, lookup(var))?;
        }

        let config: Self = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations that would only fail later, mid-request.
    pub fn validate(&self) -> Result<()> {
        let db = &self.database;
        for (field, value) in [("host", &db.host), ("name", &db.name), ("user", &db.user)] {
            if value.trim().is_empty() {
                return Err(Error::config(format!(
                    "database.{field} is empty; set DATABASE_{}",
                    field.to_uppercase()
                )));
            }
        }

        match self.logging.format.as_str() {
            "json" | "pretty" => {}
            other => {
                return Err(Error::config(format!(
                    "logging.format must be 'json' or 'pretty', got '{other}'"
                )))
            }
        }

        if self.auth.session_sweep_interval_secs == 0 {
            return Err(Error::config("auth.session_sweep_interval_secs must be positive"));
        }

        Ok(())
    }

    /// Address the HTTP server binds to
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}
