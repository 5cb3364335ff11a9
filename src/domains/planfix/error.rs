//! Planfix API error types.

use thiserror::Error;

/// Result type for Planfix API calls.
pub type PlanfixResult<T> = Result<T, PlanfixError>;

/// Errors that can occur while talking to the Planfix REST API.
#[derive(Debug, Error)]
pub enum PlanfixError {
    /// The API answered with an error status or a `"fail"` result.
    #[error("Planfix API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// The request could not be sent or the response could not be read.
    #[error("Planfix request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The response body was not what the caller expected.
    #[error("Invalid Planfix response: {0}")]
    InvalidResponse(String),

    /// Account or token are missing.
    #[error("Planfix is not configured: {0}")]
    NotConfigured(String),
}

impl PlanfixError {
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: message.into(),
        }
    }

    pub fn invalid_response(msg: impl Into<String>) -> Self {
        Self::InvalidResponse(msg.into())
    }

    pub fn not_configured(msg: impl Into<String>) -> Self {
        Self::NotConfigured(msg.into())
    }

    /// Whether the API reported a missing object.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Api { status: 404, .. })
    }
}

/// Errors that can occur while opening a persistent request cache.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Cache I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}
