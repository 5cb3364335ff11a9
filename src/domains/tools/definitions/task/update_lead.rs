//! Idempotent lead task update.
//!
//! Reads the task's current custom field values and writes only the
//! lead task fields whose value differs, unless `forceUpdate` is set.

use futures::FutureExt;
use rmcp::{
    ErrorData as McpError,
    handler::server::tool::{ToolCallContext, ToolRoute, cached_schema_for_type},
    model::{CallToolResult, JsonObject, Tool},
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, instrument};

use super::{TaskBody, task_fields_param};
use crate::core::AppContext;
use crate::domains::custom_fields::{ExtendedSchema, RecordSnapshot, extend_post_body};
use crate::domains::planfix::client::with_query;
use crate::domains::planfix::{PlanfixError, PlanfixRequest, PlanfixResult};
use crate::domains::tools::definitions::common::{
    api_error_result, base_schema, error_result, field_names, parse_arguments,
    resolve_directory_values, structured_result,
};
#[cfg(feature = "http")]
use crate::domains::tools::{
    ToolError,
    definitions::common::{http_arguments, http_response},
};

#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateLeadTaskParams {
    /// Id of the task to update.
    pub task_id: u64,

    /// Write values even when the task already holds them.
    #[serde(default)]
    pub force_update: bool,
}

#[derive(Debug, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
struct UpdateLeadTaskResult {
    task_id: u64,
    found: bool,
    updated: bool,
    /// Custom fields sent to Planfix.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    written: Vec<String>,
    /// Custom fields skipped because the task already holds the value.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    unchanged: Vec<String>,
}

pub struct UpdateLeadTaskTool;

impl UpdateLeadTaskTool {
    pub const NAME: &'static str = "planfix_update_lead_task";

    pub const DESCRIPTION: &'static str = "Update lead task custom fields. Only values that differ from the task's current values are written unless forceUpdate is true. Returns updated=false with the unchanged fields when there is nothing to write.";

    fn schema(ctx: &AppContext) -> ExtendedSchema {
        ctx.lead_task_schema.extend(&base_schema::<UpdateLeadTaskParams>())
    }

    async fn fetch_task(ctx: &AppContext, task_id: u64) -> PlanfixResult<RecordSnapshot> {
        let fields = task_fields_param(ctx);
        let path = with_query(&format!("task/{}", task_id), &[("fields", fields.as_str())]);
        let response = ctx.api.request(PlanfixRequest::get(path)).await?;
        let task = response
            .get("task")
            .cloned()
            .ok_or_else(|| PlanfixError::invalid_response("task payload missing"))?;
        serde_json::from_value(task).map_err(|e| PlanfixError::invalid_response(e.to_string()))
    }

    #[instrument(skip_all, fields(task_id = params.task_id, force = params.force_update))]
    pub async fn execute(
        params: &UpdateLeadTaskParams,
        custom: &JsonObject,
        ctx: &AppContext,
    ) -> CallToolResult {
        let task_id = params.task_id;
        let current = match Self::fetch_task(ctx, task_id).await {
            Ok(current) => current,
            Err(e) if e.is_not_found() => {
                let result = UpdateLeadTaskResult {
                    task_id,
                    found: false,
                    updated: false,
                    written: Vec::new(),
                    unchanged: Vec::new(),
                };
                return structured_result(format!("Task {} not found", task_id), &result);
            }
            Err(e) => return api_error_result("Loading the task", &e),
        };

        let fields = ctx.lead_task_fields();
        let mut body = TaskBody::default();
        let outcome = extend_post_body(&mut body, custom, fields, Some(&current), params.force_update);
        let unchanged = field_names(fields, &outcome.unchanged);

        if outcome.is_empty() {
            debug!("Task {} already up to date", task_id);
            let result = UpdateLeadTaskResult {
                task_id,
                found: true,
                updated: false,
                written: Vec::new(),
                unchanged,
            };
            return structured_result(format!("Task {} unchanged", task_id), &result);
        }

        if let Err(e) = resolve_directory_values(ctx, &mut body, fields, &outcome.written).await {
            return api_error_result("Directory entry creation", &e);
        }
        let payload = match serde_json::to_value(&body) {
            Ok(payload) => payload,
            Err(e) => return error_result(format!("Failed to build task payload: {}", e)),
        };
        if let Err(e) = ctx
            .api
            .request(PlanfixRequest::post(format!("task/{}", task_id), payload))
            .await
        {
            return api_error_result("Task update", &e);
        }

        info!("Updated {} field(s) of task {}", outcome.written.len(), task_id);
        let result = UpdateLeadTaskResult {
            task_id,
            found: true,
            updated: true,
            written: field_names(fields, &outcome.written),
            unchanged,
        };
        structured_result(format!("Task {} updated", task_id), &result)
    }

    #[cfg(feature = "http")]
    pub async fn http_handler(
        arguments: serde_json::Value,
        ctx: Arc<AppContext>,
    ) -> Result<serde_json::Value, ToolError> {
        let (params, custom) = http_arguments(arguments, Some(&Self::schema(&ctx)))?;
        http_response(Self::execute(&params, &custom, &ctx).await)
    }

    pub fn to_tool(ctx: &AppContext) -> Tool {
        Tool {
            name: Self::NAME.into(),
            description: Some(Self::DESCRIPTION.into()),
            input_schema: Arc::new(Self::schema(ctx).schema().clone()),
            annotations: None,
            output_schema: Some(cached_schema_for_type::<UpdateLeadTaskResult>()),
            icons: None,
            meta: None,
            title: None,
        }
    }

    pub fn create_route<S>(ctx: Arc<AppContext>) -> ToolRoute<S>
    where
        S: Send + Sync + 'static,
    {
        let schema = Arc::new(Self::schema(&ctx));
        ToolRoute::new_dyn(Self::to_tool(&ctx), move |call: ToolCallContext<'_, S>| {
            let args = call.arguments.clone().unwrap_or_default();
            let ctx = ctx.clone();
            let schema = schema.clone();
            async move {
                let (params, custom): (UpdateLeadTaskParams, _) =
                    parse_arguments(args, Some(schema.as_ref()))?;
                Ok::<_, McpError>(Self::execute(&params, &custom, &ctx).await)
            }
            .boxed()
        })
    }
}
