//! Error types and handling for the MCP server.
//!
//! Domain errors convert into [`Error`] so startup code can use `?` across
//! layers. Tool calls report Planfix failures inside the call result and
//! never reach this type.

use thiserror::Error;

/// A specialized Result type for MCP server operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Unified error type for the MCP server.
#[derive(Debug, Error)]
pub enum Error {
    /// Error originating from the tools domain.
    #[error("Tool error: {0}")]
    Tool(#[from] crate::domains::tools::ToolError),

    /// Planfix API or cache failure.
    #[error("Planfix error: {0}")]
    Planfix(#[from] crate::domains::planfix::PlanfixError),

    /// Transport startup or runtime failure.
    #[error("Transport error: {0}")]
    Transport(#[from] super::transport::TransportError),

    /// Configuration-related errors.
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O errors from file operations or network communication.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Internal server errors that should not occur under normal operation.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a new configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a new internal error.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domains::planfix::PlanfixError;
    use crate::domains::tools::ToolError;

    #[test]
    fn test_domain_errors_convert() {
        let err: Error = ToolError::not_found("planfix_nope").into();
        assert_eq!(err.to_string(), "Tool error: Tool not found: planfix_nope");

        let err: Error = PlanfixError::api(403, "denied").into();
        assert!(err.to_string().starts_with("Planfix error:"));
        assert!(err.to_string().contains("denied"));
    }
}
