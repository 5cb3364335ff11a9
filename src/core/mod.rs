//! Core module containing shared infrastructure components.
//!
//! Configuration, the shared application context, error handling, server
//! lifecycle and the transport layer.

pub mod config;
pub mod context;
pub mod error;
pub mod server;
pub mod transport;

pub use config::Config;
pub use context::AppContext;
pub use error::{Error, Result};
pub use server::McpServer;
pub use transport::{TransportConfig, TransportService};
