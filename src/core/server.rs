//! MCP Server implementation and lifecycle management.
//!
//! ## Tool Architecture
//!
//! Tools are defined in `domains/tools/definitions/` with one file per tool.
//! Each tool defines:
//! - Parameters struct (for rmcp)
//! - `execute()` method (core logic)
//! - `http_handler()` method (called via ToolRegistry for HTTP transport)
//!
//! The ToolRouter is built in `domains/tools/router.rs` from the shared
//! [`AppContext`], so tool schemas reflect the loaded custom fields.

use rmcp::{ServerHandler, handler::server::tool::ToolRouter, model::*, tool_handler};
use std::sync::Arc;

use super::context::AppContext;
use crate::domains::tools::build_tool_router;

#[cfg(feature = "http")]
use crate::domains::tools::{ToolError, ToolRegistry};

/// Instructions advertised to clients on initialize.
pub const INSTRUCTIONS: &str = "Planfix CRM tools. Search before you create: look up contacts by phone, email or telegram, and lead tasks by client or custom fields. Directory-backed custom fields accept entry labels; unknown labels are created.";

/// The main MCP server handler.
#[derive(Clone)]
pub struct McpServer {
    ctx: Arc<AppContext>,

    /// Tool router for handling tool calls.
    tool_router: ToolRouter<Self>,
}

impl McpServer {
    pub fn new(ctx: Arc<AppContext>) -> Self {
        Self {
            tool_router: build_tool_router::<Self>(ctx.clone()),
            ctx,
        }
    }

    pub fn name(&self) -> &str {
        &self.ctx.config.server.name
    }

    pub fn version(&self) -> &str {
        &self.ctx.config.server.version
    }

    pub fn context(&self) -> &Arc<AppContext> {
        &self.ctx
    }

    // ========================================================================
    // HTTP Transport Support Methods
    // ========================================================================

    /// List all available tools (for HTTP transport).
    pub fn list_tools(&self) -> Vec<serde_json::Value> {
        self.tool_router
            .list_all()
            .into_iter()
            .map(|t| {
                serde_json::json!({
                    "name": t.name,
                    "description": t.description,
                    "inputSchema": t.input_schema,
                    "outputSchema": t.output_schema
                })
            })
            .collect()
    }

    /// Call a tool by name (for HTTP transport).
    #[cfg(feature = "http")]
    pub async fn call_tool(
        &self,
        name: &str,
        arguments: serde_json::Value,
    ) -> Result<serde_json::Value, ToolError> {
        let registry = ToolRegistry::new(self.ctx.clone());
        registry.call_tool(name, arguments).await
    }
}

/// ServerHandler implementation with tool_handler macro for automatic tool routing.
#[tool_handler]
impl ServerHandler for McpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(INSTRUCTIONS.to_string()),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: self.name().to_string(),
                version: self.version().to_string(),
                ..Implementation::from_build_env()
            },
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::context::testing::context_with;
    use crate::domains::custom_fields::CustomFieldsConfig;
    use crate::domains::planfix::mock::MockApi;
    use tempfile::TempDir;

    fn server(dir: &TempDir) -> McpServer {
        McpServer::new(context_with(
            Arc::new(MockApi::new()),
            CustomFieldsConfig::default(),
            dir,
        ))
    }

    #[test]
    fn test_info_advertises_tools_only() {
        let dir = TempDir::new().unwrap();
        let info = server(&dir).get_info();
        assert!(info.capabilities.tools.is_some());
        assert!(info.capabilities.resources.is_none());
        assert!(info.capabilities.prompts.is_none());
        assert_eq!(info.server_info.name, "planfix-mcp-server");
    }

    #[test]
    fn test_list_tools_includes_schemas() {
        let dir = TempDir::new().unwrap();
        let tools = server(&dir).list_tools();
        assert_eq!(tools.len(), 13);
        assert!(tools.iter().all(|t| t["inputSchema"].is_object()));
    }
}
