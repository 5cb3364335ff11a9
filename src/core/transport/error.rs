//! Errors raised while bringing a transport up or keeping it running.

use thiserror::Error;

pub type TransportResult<T> = Result<T, TransportError>;

#[derive(Debug, Error)]
pub enum TransportError {
    /// The HTTP listener could not claim its address.
    #[error("Cannot listen on {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },

    /// The client never completed the MCP initialize exchange.
    #[error("MCP handshake failed: {0}")]
    Handshake(String),

    /// An established session ended abnormally.
    #[error("MCP session aborted: {0}")]
    Session(String),

    #[error("HTTP server stopped: {0}")]
    Serve(String),
}

impl TransportError {
    pub fn bind(address: impl Into<String>, source: std::io::Error) -> Self {
        Self::Bind {
            address: address.into(),
            source,
        }
    }

    pub fn handshake(msg: impl Into<String>) -> Self {
        Self::Handshake(msg.into())
    }

    pub fn session(msg: impl Into<String>) -> Self {
        Self::Session(msg.into())
    }

    pub fn serve(msg: impl Into<String>) -> Self {
        Self::Serve(msg.into())
    }
}
