//! Task comment tool.

use futures::FutureExt;
use rmcp::{
    ErrorData as McpError,
    handler::server::tool::{ToolCallContext, ToolRoute, cached_schema_for_type},
    model::{CallToolResult, Tool},
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::{info, instrument};

use crate::core::AppContext;
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
#[serde(rename_all = "camelCase")]
pub struct AddCommentParams {
    /// Id of the task to comment on.
    pub task_id: u64,

    /// Comment text (HTML allowed).
    pub description: String,

    /// Planfix user ids to notify.
    #[serde(default)]
    pub recipients: Vec<u64>,
}

#[derive(Debug, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
struct AddCommentResult {
    task_id: u64,
    comment_id: u64,
}

pub struct AddCommentTool;

impl AddCommentTool {
    pub const NAME: &'static str = "planfix_add_comment";

    pub const DESCRIPTION: &'static str = "Add a comment to a Planfix task, optionally notifying users.";

    #[instrument(skip_all, fields(task_id = params.task_id))]
    pub async fn execute(params: &AddCommentParams, ctx: &AppContext) -> CallToolResult {
        if params.description.trim().is_empty() {
            return error_result("Comment text must not be empty");
        }

        let mut body = json!({ "description": params.description });
        if !params.recipients.is_empty() {
            let users: Vec<Value> = params
                .recipients
                .iter()
                .map(|id| json!({ "id": format!("user:{}", id) }))
                .collect();
            body["recipients"] = json!({ "users": users });
        }

        let path = format!("task/{}/comments/", params.task_id);
        match ctx.api.request(PlanfixRequest::post(path, body)).await {
            Ok(response) => {
                let Some(comment_id) = response.get("id").and_then(Value::as_u64) else {
                    return error_result("Planfix did not return the comment id");
                };
                info!("Added comment {} to task {}", comment_id, params.task_id);
                let result = AddCommentResult {
                    task_id: params.task_id,
                    comment_id,
                };
                structured_result(
                    format!("Comment {} added to task {}", comment_id, params.task_id),
                    &result,
                )
            }
            Err(e) => api_error_result("Adding the comment", &e),
        }
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
            input_schema: cached_schema_for_type::<AddCommentParams>(),
            annotations: None,
            output_schema: Some(cached_schema_for_type::<AddCommentResult>()),
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
                let (params, _): (AddCommentParams, _) = parse_arguments(args, None)?;
                Ok::<_, McpError>(Self::execute(&params, &ctx).await)
            }
            .boxed()
        })
    }
}
