//! Tool Registry - central registration and dispatch for all tools.
//!
//! This module provides:
//! - A registry of all available tools
//! - HTTP dispatch for tool calls (when http feature is enabled)
//! - Tool metadata for listing

use std::sync::Arc;
#[cfg(feature = "http")]
use tracing::warn;

use rmcp::model::Tool;

use crate::core::AppContext;
#[cfg(feature = "http")]
use crate::domains::tools::ToolError;

use super::definitions::{
    AddCommentTool, CreateContactTool, CreateLeadTaskTool, ListReportsTool, PlanfixRequestTool,
    SearchContactTool, SearchDirectoryEntryTool, SearchDirectoryTool, SearchLeadTaskTool,
    SearchManagerTool, SearchTaskTool, UpdateContactTool, UpdateLeadTaskTool,
};

// ============================================================================
// Tool Registry
// ============================================================================

/// Tool registry - manages all available tools.
///
/// Tool schemas depend on the loaded custom fields, so the registry holds
/// the application context rather than plain config.
pub struct ToolRegistry {
    ctx: Arc<AppContext>,
}

impl ToolRegistry {
    pub fn new(ctx: Arc<AppContext>) -> Self {
        Self { ctx }
    }

    /// Get all tool names.
    pub fn tool_names(&self) -> Vec<&'static str> {
        vec![
            SearchTaskTool::NAME,
            SearchLeadTaskTool::NAME,
            CreateLeadTaskTool::NAME,
            UpdateLeadTaskTool::NAME,
            AddCommentTool::NAME,
            SearchContactTool::NAME,
            CreateContactTool::NAME,
            UpdateContactTool::NAME,
            SearchManagerTool::NAME,
            SearchDirectoryTool::NAME,
            SearchDirectoryEntryTool::NAME,
            ListReportsTool::NAME,
            PlanfixRequestTool::NAME,
        ]
    }

    /// Get all tools as Tool models (metadata).
    ///
    /// Single source of truth for tool listings on every transport.
    pub fn get_all_tools(&self) -> Vec<Tool> {
        let ctx = self.ctx.as_ref();
        vec![
            SearchTaskTool::to_tool(ctx),
            SearchLeadTaskTool::to_tool(ctx),
            CreateLeadTaskTool::to_tool(ctx),
            UpdateLeadTaskTool::to_tool(ctx),
            AddCommentTool::to_tool(),
            SearchContactTool::to_tool(ctx),
            CreateContactTool::to_tool(ctx),
            UpdateContactTool::to_tool(ctx),
            SearchManagerTool::to_tool(),
            SearchDirectoryTool::to_tool(),
            SearchDirectoryEntryTool::to_tool(),
            ListReportsTool::to_tool(),
            PlanfixRequestTool::to_tool(),
        ]
    }

    /// Dispatch an HTTP tool call to the appropriate handler.
    #[cfg(feature = "http")]
    pub async fn call_tool(
        &self,
        name: &str,
        arguments: serde_json::Value,
    ) -> Result<serde_json::Value, ToolError> {
        let ctx = self.ctx.clone();
        match name {
            SearchTaskTool::NAME => SearchTaskTool::http_handler(arguments, ctx).await,
            SearchLeadTaskTool::NAME => SearchLeadTaskTool::http_handler(arguments, ctx).await,
            CreateLeadTaskTool::NAME => CreateLeadTaskTool::http_handler(arguments, ctx).await,
            UpdateLeadTaskTool::NAME => UpdateLeadTaskTool::http_handler(arguments, ctx).await,
            AddCommentTool::NAME => AddCommentTool::http_handler(arguments, ctx).await,
            SearchContactTool::NAME => SearchContactTool::http_handler(arguments, ctx).await,
            CreateContactTool::NAME => CreateContactTool::http_handler(arguments, ctx).await,
            UpdateContactTool::NAME => UpdateContactTool::http_handler(arguments, ctx).await,
            SearchManagerTool::NAME => SearchManagerTool::http_handler(arguments, ctx).await,
            SearchDirectoryTool::NAME => SearchDirectoryTool::http_handler(arguments, ctx).await,
            SearchDirectoryEntryTool::NAME => {
                SearchDirectoryEntryTool::http_handler(arguments, ctx).await
            }
            ListReportsTool::NAME => ListReportsTool::http_handler(arguments, ctx).await,
            PlanfixRequestTool::NAME => PlanfixRequestTool::http_handler(arguments, ctx).await,
            _ => {
                warn!("Unknown tool requested: {}", name);
                Err(ToolError::not_found(name))
            }
        }
    }
}
