//! Report list tool. The list rarely changes, so reads go through the
//! request cache.

use futures::FutureExt;
use rmcp::{
    ErrorData as McpError,
    handler::server::tool::{ToolCallContext, ToolRoute, cached_schema_for_type},
    model::{CallToolResult, Tool},
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::instrument;

use crate::core::AppContext;
use crate::domains::planfix::types::{PAGE_SIZE, ReportSummary, list_from};
use crate::domains::planfix::{PlanfixRequest};
use crate::domains::tools::definitions::common::{
    api_error_result, error_result, parse_arguments, structured_result,
};
#[cfg(feature = "http")]
use crate::domains::tools::{
    ToolError,
    definitions::common::{http_arguments, http_response},
};

#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ListReportsParams {
    /// Case-insensitive substring to filter report names by.
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Serialize, JsonSchema)]
struct ReportInfo {
    id: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
}

#[derive(Debug, Serialize, JsonSchema)]
struct ListReportsResult {
    reports: Vec<ReportInfo>,
    total: usize,
}

pub struct ListReportsTool;

impl ListReportsTool {
    pub const NAME: &'static str = "planfix_list_reports";

    pub const DESCRIPTION: &'static str = "List Planfix reports with their ids, optionally filtered by name.";

    #[instrument(skip_all)]
    pub async fn execute(params: &ListReportsParams, ctx: &AppContext) -> CallToolResult {
        let request = PlanfixRequest::post(
            "report/list",
            json!({"offset": 0, "pageSize": PAGE_SIZE, "fields": "id,name"}),
        )
        .with_cache(ctx.config.cache.ttl_secs);

        let response = match ctx.api.request(request).await {
            Ok(response) => response,
            Err(e) => return api_error_result("Listing reports", &e),
        };
        let reports: Vec<ReportSummary> = match list_from(&response, "reports") {
            Ok(reports) => reports,
            Err(e) => return error_result(format!("Unexpected report/list payload: {}", e)),
        };

        let wanted = params
            .name
            .as_deref()
            .map(|n| n.trim().to_lowercase())
            .filter(|n| !n.is_empty());
        let reports: Vec<ReportInfo> = reports
            .into_iter()
            .filter(|r| match (&wanted, &r.name) {
                (None, _) => true,
                (Some(wanted), Some(name)) => name.to_lowercase().contains(wanted),
                (Some(_), None) => false,
            })
            .map(|r| ReportInfo {
                id: r.id,
                name: r.name,
            })
            .collect();

        let result = ListReportsResult {
            total: reports.len(),
            reports,
        };
        structured_result(format!("{} report(s)", result.total), &result)
    }

    #[cfg(feature = "http")]
    pub async fn http_handler(
        arguments: serde_json::Value,
        ctx: Arc<AppContext>,
    ) -> Result<serde_json::Value, ToolError> {
        let (params, _) = http_arguments(arguments, None)?;
        http_response(Self::execute(&params, &ctx).await)
    }

    pub fn to_tool() -> Tool {
        Tool {
            name: Self::NAME.into(),
            description: Some(Self::DESCRIPTION.into()),
            input_schema: cached_schema_for_type::<ListReportsParams>(),
            annotations: None,
            output_schema: Some(cached_schema_for_type::<ListReportsResult>()),
            icons: None,
            meta: None,
            title: None,
        }
    }

    pub fn create_route<S>(ctx: Arc<AppContext>) -> ToolRoute<S>
    where
        S: Send + Sync + 'static,
    {
        ToolRoute::new_dyn(Self::to_tool(), move |call: ToolCallContext<'_, S>| {
            let args = call.arguments.clone().unwrap_or_default();
            let ctx = ctx.clone();
            async move {
                let (params, _): (ListReportsParams, _) = parse_arguments(args, None)?;
                Ok::<_, McpError>(Self::execute(&params, &ctx).await)
            }
            .boxed()
        })
    }
}
