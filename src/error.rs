//! Error types for the library client

use thiserror::Error;
use validator::ValidationErrors;

use crate::token::TokenError;

/// Main client error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Authorization failed: {0}")]
    Authorization(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Server error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Invalid token: {0}")]
    Token(#[from] TokenError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Session storage error: {0}")]
    Storage(String),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),
}

impl AppError {
    /// Map a non-success backend status to the matching error kind
    pub fn from_status(status: u16, message: String) -> Self {
        match status {
            401 => AppError::Authentication(message),
            403 => AppError::Authorization(message),
            404 => AppError::NotFound(message),
            400 | 409 | 422 => AppError::Conflict(message),
            _ => AppError::Api { status, message },
        }
    }

    /// HTTP status the backend answered with, when the error came from one
    pub fn status_code(&self) -> Option<u16> {
        match self {
            AppError::Authentication(_) => Some(401),
            AppError::Authorization(_) => Some(403),
            AppError::NotFound(_) => Some(404),
            AppError::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Whether the session can no longer be trusted after this error
    pub fn is_auth_failure(&self) -> bool {
        matches!(self, AppError::Authentication(_) | AppError::Token(_))
    }

    /// Human-readable message without the error kind prefix
    pub fn message(&self) -> String {
        match self {
            AppError::Network(msg)
            | AppError::Authentication(msg)
            | AppError::Authorization(msg)
            | AppError::Validation(msg)
            | AppError::NotFound(msg)
            | AppError::Conflict(msg)
            | AppError::Storage(msg) => msg.clone(),
            AppError::Api { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        AppError::Network(err.to_string())
    }
}

impl From<redis::RedisError> for AppError {
    fn from(err: redis::RedisError) -> Self {
        AppError::Storage(err.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Storage(err.to_string())
    }
}

impl From<ValidationErrors> for AppError {
    fn from(errors: ValidationErrors) -> Self {
        let mut messages: Vec<String> = errors
            .field_errors()
            .into_iter()
            .flat_map(|(field, errs)| {
                errs.iter().map(move |e| match &e.message {
                    Some(message) => message.to_string(),
                    None => format!("{} is invalid", field),
                })
            })
            .collect();
        messages.sort();
        messages.dedup();
        AppError::Validation(messages.join("; "))
    }
}

/// Result type alias for client operations
pub type AppResult<T> = Result<T, AppError>;
