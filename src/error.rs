//! Error types for chainchat.

use axum::http::StatusCode;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Process-level errors: configuration, IO, startup.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Web error: {0}")]
    Web(String),

    #[error(transparent)]
    Service(#[from] ServiceError),
}

pub type ServiceResult<T> = std::result::Result<T, ServiceError>;

/// Failures of a single request against one of the external collaborators.
///
/// Each variant maps to one HTTP status through [`ServiceError::status`].
/// Routes that embed a sub-action (the `/chat` pipeline) do not use the
/// status and fold the message into the intent instead.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ServiceError {
    #[error("{0} no configurado")]
    NotConfigured(&'static str),

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Upstream(String),
}

impl ServiceError {
    pub fn validation(msg: impl Into<String>) -> Self {
        ServiceError::Validation(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        ServiceError::NotFound(msg.into())
    }

    /// Wrap an upstream failure, promoting it to a conflict when the
    /// upstream reports a duplicate.
    pub fn upstream(err: impl std::fmt::Display) -> Self {
        let msg = err.to_string();
        if msg.to_lowercase().contains("duplicate") {
            ServiceError::Conflict(msg)
        } else {
            ServiceError::Upstream(msg)
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ServiceError::NotConfigured(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ServiceError::Validation(_) => StatusCode::BAD_REQUEST,
            ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
            ServiceError::Conflict(_) => StatusCode::CONFLICT,
            ServiceError::Upstream(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<rusqlite::Error> for ServiceError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(e, _)
                if e.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                ServiceError::Conflict(format!("duplicate record: {}", err))
            }
            _ => ServiceError::upstream(err),
        }
    }
}

impl From<reqwest::Error> for ServiceError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ServiceError::Upstream(format!("timeout: {}", err))
        } else {
            ServiceError::upstream(err)
        }
    }
}
