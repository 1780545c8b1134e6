//! Error types for dldata

use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use thiserror::Error;

/// Result type alias using dldata's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for dldata operations
#[derive(Error, Debug)]
pub enum Error {
    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Credential store error
    #[error("Credential store error: {0}")]
    Credentials(String),

    /// Template rendering error
    #[error("Template error: {0}")]
    Template(#[from] minijinja::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML parse error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Create a config error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a credential store error
    pub fn credentials(msg: impl Into<String>) -> Self {
        Self::Credentials(msg.into())
    }

    /// Create an internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// HTTP status used when this error ends a request
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Database(_) => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Text shown to the browser; details stay in the logs
    pub fn public_message(&self) -> &'static str {
        match self {
            Self::Database(_) => {
                "The interaction database is unavailable right now. Please try again shortly."
            }
            _ => "Something went wrong while building this page.",
        }
    }
}

impl From<config::ConfigError> for Error {
    fn from(err: config::ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}

impl From<bcrypt::BcryptError> for Error {
    fn from(err: bcrypt::BcryptError) -> Self {
        Self::Credentials(err.to_string())
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();
        tracing::error!(error = %self, status = status.as_u16(), "request failed");

        let body = crate::api::render::error_page(self.public_message())
            .unwrap_or_else(|_| "<h1>Internal error</h1>".to_string());
        (status, Html(body)).into_response()
    }
}
