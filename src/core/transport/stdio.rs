//! STDIO transport: one MCP session over stdin/stdout.
//!
//! Stdout carries protocol frames only; all logging goes to stderr.

use rmcp::ServiceExt;
use tracing::info;

use super::{TransportError, TransportResult};
use crate::core::McpServer;

pub struct StdioTransport;

impl StdioTransport {
    /// Serve a single client until it disconnects.
    pub async fn run(server: McpServer) -> TransportResult<()> {
        info!("{}", ready_message(&server));

        let service = server
            .serve(rmcp::transport::stdio())
            .await
            .map_err(|e| TransportError::handshake(e.to_string()))?;

        let reason = service
            .waiting()
            .await
            .map_err(|e| TransportError::session(e.to_string()))?;

        info!("STDIO session closed: {:?}", reason);
        Ok(())
    }
}

fn ready_message(server: &McpServer) -> String {
    format!(
        "{} v{} ready on stdin/stdout with {} tools",
        server.name(),
        server.version(),
        server.list_tools().len()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::context::testing::context_with;
    use crate::domains::custom_fields::CustomFieldsConfig;
    use crate::domains::planfix::mock::MockApi;
    use std::sync::Arc;
    use tempfile::TempDir;

    #[test]
    fn test_ready_message_names_server_and_tools() {
        let dir = TempDir::new().unwrap();
        let server = McpServer::new(context_with(
            Arc::new(MockApi::new()),
            CustomFieldsConfig::default(),
            &dir,
        ));
        let message = ready_message(&server);
        assert!(message.starts_with("planfix-mcp-server v"));
        assert!(message.ends_with("with 13 tools"));
    }
}
