//! Tool Router - builds the rmcp ToolRouter for the STDIO transport.
//!
//! Each tool knows how to create its own route; routes of custom-field tools
//! carry the schema derived from the loaded field configuration.

use std::sync::Arc;

use rmcp::handler::server::tool::ToolRouter;

use crate::core::AppContext;

use super::definitions::{
    AddCommentTool, CreateContactTool, CreateLeadTaskTool, ListReportsTool, PlanfixRequestTool,
    SearchContactTool, SearchDirectoryEntryTool, SearchDirectoryTool, SearchLeadTaskTool,
    SearchManagerTool, SearchTaskTool, UpdateContactTool, UpdateLeadTaskTool,
};

/// Build the tool router with all registered tools.
pub fn build_tool_router<S>(ctx: Arc<AppContext>) -> ToolRouter<S>
where
    S: Send + Sync + 'static,
{
    ToolRouter::new()
        .with_route(SearchTaskTool::create_route(ctx.clone()))
        .with_route(SearchLeadTaskTool::create_route(ctx.clone()))
        .with_route(CreateLeadTaskTool::create_route(ctx.clone()))
        .with_route(UpdateLeadTaskTool::create_route(ctx.clone()))
        .with_route(AddCommentTool::create_route(ctx.clone()))
        .with_route(SearchContactTool::create_route(ctx.clone()))
        .with_route(CreateContactTool::create_route(ctx.clone()))
        .with_route(UpdateContactTool::create_route(ctx.clone()))
        .with_route(SearchManagerTool::create_route(ctx.clone()))
        .with_route(SearchDirectoryTool::create_route(ctx.clone()))
        .with_route(SearchDirectoryEntryTool::create_route(ctx.clone()))
        .with_route(ListReportsTool::create_route(ctx.clone()))
        .with_route(PlanfixRequestTool::create_route(ctx))
}
