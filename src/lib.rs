//! Planfix MCP Server Library
//!
//! Model Context Protocol server exposing Planfix CRM workflows as tools.
//! Task and contact tools accept account-specific custom fields described
//! in a YAML file.
//!
//! # Architecture
//!
//! - **core**: configuration, application context, errors, the server and
//!   its transports
//! - **domains**: business logic organized by bounded contexts
//!   - **custom_fields**: field configuration, schema extension, filters and
//!     payload building
//!   - **planfix**: REST client, request cache, directory resolver and
//!     object metadata cache
//!   - **tools**: MCP tools that can be executed by clients
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use planfix_mcp_server::core::{AppContext, Config, McpServer};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::from_env();
//!     let server = McpServer::new(Arc::new(AppContext::from_config(config)));
//!     // Start the server...
//!     Ok(())
//! }
//! ```

pub mod core;
pub mod domains;

// Re-export commonly used types for convenience
pub use core::{AppContext, Config, Error, McpServer, Result};
