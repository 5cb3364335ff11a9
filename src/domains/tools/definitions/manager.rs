//! Manager (employee) lookup by email.

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
use tracing::{info, instrument};

use crate::core::AppContext;
use crate::domains::custom_fields::FilterFragment;
use crate::domains::planfix::types::{PAGE_SIZE, UserSummary, filter_codes, list_from};
use crate::domains::planfix::{PlanfixRequest};
use crate::domains::tools::definitions::common::{
    api_error_result, error_result, parse_arguments, structured_result,
};
#[cfg(feature = "http")]
use crate::domains::tools::{
    ToolError,
    definitions::common::{http_arguments, http_response},
};

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct SearchManagerParams {
    /// Employee email.
    pub email: String,
}

#[derive(Debug, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
struct SearchManagerResult {
    found: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    manager_id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    email: Option<String>,
}

pub struct SearchManagerTool;

impl SearchManagerTool {
    pub const NAME: &'static str = "planfix_search_manager";

    pub const DESCRIPTION: &'static str = "Find a Planfix employee by email. Returns the user id to use as a task assignee.";

    #[instrument(skip_all, fields(email = %params.email))]
    pub async fn execute(params: &SearchManagerParams, ctx: &AppContext) -> CallToolResult {
        let email = params.email.trim();
        if email.is_empty() {
            return error_result("Email must not be empty");
        }

        let body = json!({
            "offset": 0,
            "pageSize": PAGE_SIZE,
            "filters": [FilterFragment::equal(filter_codes::USER_EMAIL, email)],
            "fields": "id,name,lastname,email",
        });
        let response = match ctx.api.request(PlanfixRequest::post("user/list", body)).await {
            Ok(response) => response,
            Err(e) => return api_error_result("Manager search", &e),
        };
        let users: Vec<UserSummary> = match list_from(&response, "users") {
            Ok(users) => users,
            Err(e) => return error_result(format!("Unexpected user/list payload: {}", e)),
        };

        let result = match users.into_iter().next() {
            Some(user) => {
                info!("Manager {} found", user.id);
                let name = [user.name, user.lastname]
                    .into_iter()
                    .flatten()
                    .collect::<Vec<_>>()
                    .join(" ");
                SearchManagerResult {
                    found: true,
                    manager_id: Some(user.id),
                    name: Some(name).filter(|n| !n.is_empty()),
                    email: user.email,
                }
            }
            None => SearchManagerResult {
                found: false,
                manager_id: None,
                name: None,
                email: Some(email.to_string()),
            },
        };
        let summary = match result.manager_id {
            Some(id) => format!("Manager found: {}", id),
            None => format!("No manager with email {}", email),
        };
        structured_result(summary, &result)
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
            input_schema: cached_schema_for_type::<SearchManagerParams>(),
            annotations: None,
            output_schema: Some(cached_schema_for_type::<SearchManagerResult>()),
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
                let (params, _): (SearchManagerParams, _) = parse_arguments(args, None)?;
                Ok::<_, McpError>(Self::execute(&params, &ctx).await)
            }
            .boxed()
        })
    }
}
