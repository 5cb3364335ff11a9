//! Lead task creation.
//!
//! Creates a task from the lead template, linked to the client contact and
//! carrying lead task custom field values. Enum values backed by a Planfix
//! directory are resolved to directory entries, creating missing ones.

use futures::FutureExt;
use rmcp::{
    ErrorData as McpError,
    handler::server::tool::{ToolCallContext, ToolRoute, cached_schema_for_type},
    model::{CallToolResult, JsonObject, Tool},
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::{info, instrument};

use super::{Assignees, TaskBody};
use crate::core::AppContext;
use crate::domains::custom_fields::{CustomFieldDataEntry, ExtendedSchema, extend_post_body};
use crate::domains::planfix::types::{ContactRef, IdRef};
use crate::domains::planfix::{PlanfixRequest};
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
pub struct CreateLeadTaskParams {
    /// Task title.
    pub name: String,

    /// Task description (HTML allowed).
    #[serde(default)]
    pub description: Option<String>,

    /// Planfix contact id of the client.
    #[serde(default)]
    pub client_id: Option<u64>,

    /// Planfix user id of the responsible manager.
    #[serde(default)]
    pub manager_id: Option<u64>,

    /// Template id; defaults to the configured lead template.
    #[serde(default)]
    pub template_id: Option<u64>,
}

#[derive(Debug, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
struct CreateLeadTaskResult {
    task_id: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    url: Option<String>,
    /// Custom fields written on the new task.
    custom_fields: Vec<String>,
}

pub struct CreateLeadTaskTool;

impl CreateLeadTaskTool {
    pub const NAME: &'static str = "planfix_create_lead_task";

    pub const DESCRIPTION: &'static str = "Create a lead task from the lead template for a client contact. Lead task custom fields can be passed as extra arguments; configured defaults apply to fields that are not passed.";

    fn schema(ctx: &AppContext) -> ExtendedSchema {
        ctx.lead_task_schema.extend(&base_schema::<CreateLeadTaskParams>())
    }

    #[instrument(skip_all, fields(name = %params.name, client_id = ?params.client_id))]
    pub async fn execute(
        params: &CreateLeadTaskParams,
        custom: &JsonObject,
        ctx: &AppContext,
    ) -> CallToolResult {
        if params.name.trim().is_empty() {
            return error_result("Task name must not be empty");
        }
        let Some(template_id) = params.template_id.or(ctx.config.planfix.lead_template_id) else {
            return error_result("No lead task template: pass templateId or set PLANFIX_LEAD_TEMPLATE_ID");
        };

        let mut body = TaskBody {
            name: Some(params.name.trim().to_string()),
            description: params.description.clone(),
            template: Some(IdRef { id: template_id }),
            counterparty: params.client_id.map(ContactRef::new),
            assignees: params.manager_id.map(Assignees::user),
            custom_field_data: None,
        };

        if let (Some(field_id), Some(client_id)) =
            (ctx.config.planfix.client_field_id, params.client_id)
        {
            body.custom_field_data
                .get_or_insert_with(Vec::new)
                .push(CustomFieldDataEntry::directory_ref(field_id, client_id));
        }

        let fields = ctx.lead_task_fields();
        let outcome = extend_post_body(&mut body, custom, fields, None, false);
        if let Err(e) = resolve_directory_values(ctx, &mut body, fields, &outcome.written).await {
            return api_error_result("Directory entry creation", &e);
        }

        let payload = match serde_json::to_value(&body) {
            Ok(payload) => payload,
            Err(e) => return error_result(format!("Failed to build task payload: {}", e)),
        };
        let response = match ctx.api.request(PlanfixRequest::post("task/", payload)).await {
            Ok(response) => response,
            Err(e) => return api_error_result("Lead task creation", &e),
        };
        let Some(task_id) = response.get("id").and_then(Value::as_u64) else {
            return error_result("Planfix did not return the new task id");
        };

        info!("Created lead task {}", task_id);
        let result = CreateLeadTaskResult {
            task_id,
            url: ctx.config.planfix.entity_url("task", task_id),
            custom_fields: field_names(fields, &outcome.written),
        };
        structured_result(format!("Lead task {} created", task_id), &result)
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
            output_schema: Some(cached_schema_for_type::<CreateLeadTaskResult>()),
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
                let (params, custom): (CreateLeadTaskParams, _) =
                    parse_arguments(args, Some(schema.as_ref()))?;
                Ok::<_, McpError>(Self::execute(&params, &custom, &ctx).await)
            }
            .boxed()
        })
    }
}
