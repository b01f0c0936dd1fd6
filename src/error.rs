//! Error types shared across the crate.

use std::time::Duration;

use thiserror::Error;

/// Main error type for language_teacher
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed rating, card or task payload. Never coerced.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Model call returned nothing usable
    #[error("generation failed: {0}")]
    Generation(String),

    /// Structured response did not satisfy the expected schema
    #[error("validation failed: {0}")]
    Validation(String),

    /// Model call exceeded its deadline
    #[error("model call timed out after {0:?}")]
    Timeout(Duration),

    /// Persistence failure
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// A thread panicked while holding the database lock
    #[error("database unavailable")]
    LockPoisoned,

    /// Transport error talking to an external service
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("not found: {0}")]
    NotFound(String),
}

impl Error {
    /// Failures that a bounded retry is allowed to absorb.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Generation(_) | Self::Validation(_) | Self::Timeout(_)
        )
    }
}

/// Result type alias for language_teacher
pub type Result<T> = std::result::Result<T, Error>;

/// Extension trait for logging errors before discarding them
pub trait LogOnError<T> {
    /// Log the error at warn level and return None
    fn log_warn(self, context: &str) -> Option<T>;
}

impl<T, E: std::fmt::Display> LogOnError<T> for std::result::Result<T, E> {
    fn log_warn(self, context: &str) -> Option<T> {
        match self {
            Ok(v) => Some(v),
            Err(e) => {
                tracing::warn!("{}: {}", context, e);
                None
            }
        }
    }
}
