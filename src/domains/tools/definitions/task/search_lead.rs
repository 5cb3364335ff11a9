//! Lead task lookup.
//!
//! A lead task is a task created from the lead template. It is found by
//! client contact and/or lead task custom fields; the template filter is
//! always applied.

use futures::FutureExt;
use rmcp::{
    ErrorData as McpError,
    handler::server::tool::{ToolCallContext, ToolRoute, cached_schema_for_type},
    model::{CallToolResult, JsonObject, Tool},
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};

use super::{TaskInfo, list_tasks};
use crate::core::AppContext;
use crate::domains::custom_fields::{ExtendedSchema, FilterFragment, FilterTarget, build_filters};
use crate::domains::planfix::types::{ContactRef, filter_codes};
use crate::domains::tools::definitions::common::{
    api_error_result, base_schema, error_result, parse_arguments, structured_result,
};
#[cfg(feature = "http")]
use crate::domains::tools::{
    ToolError,
    definitions::common::{http_arguments, http_response},
};

#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SearchLeadTaskParams {
    /// Planfix contact id of the client.
    #[serde(default)]
    pub client_id: Option<u64>,

    /// Template id; defaults to the configured lead template.
    #[serde(default)]
    pub template_id: Option<u64>,
}

#[derive(Debug, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
struct SearchLeadTaskResult {
    found: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    task: Option<TaskInfo>,
    /// Number of matching lead tasks.
    total: usize,
}

pub struct SearchLeadTaskTool;

impl SearchLeadTaskTool {
    pub const NAME: &'static str = "planfix_search_lead_task";

    pub const DESCRIPTION: &'static str = "Find the lead task of a client. Searches tasks created from the lead template by client contact id and/or lead task custom fields and returns the first match.";

    fn schema(ctx: &AppContext) -> ExtendedSchema {
        ctx.lead_task_schema.extend(&base_schema::<SearchLeadTaskParams>())
    }

    #[instrument(skip_all, fields(client_id = ?params.client_id))]
    pub async fn execute(
        params: &SearchLeadTaskParams,
        custom: &JsonObject,
        ctx: &AppContext,
    ) -> CallToolResult {
        let Some(template_id) = params.template_id.or(ctx.config.planfix.lead_template_id) else {
            return error_result("No lead task template: pass templateId or set PLANFIX_LEAD_TEMPLATE_ID");
        };

        let mut filters = Vec::new();
        if let Some(client_id) = params.client_id {
            filters.push(FilterFragment::equal(
                filter_codes::TASK_COUNTERPARTY,
                ContactRef::new(client_id).id,
            ));
        }
        build_filters(&mut filters, custom, ctx.lead_task_fields(), FilterTarget::Task);
        if filters.is_empty() {
            return error_result("Provide clientId or at least one custom field to search by");
        }
        filters.push(FilterFragment::equal(filter_codes::TASK_TEMPLATE, template_id));

        info!("Searching lead tasks of template {}", template_id);
        match list_tasks(ctx, &filters).await {
            Ok(tasks) => {
                let total = tasks.len();
                let task = tasks.into_iter().next();
                let summary = match &task {
                    Some(task) => format!("Lead task found: {}", task.id),
                    None => "Lead task not found".to_string(),
                };
                let result = SearchLeadTaskResult {
                    found: task.is_some(),
                    task,
                    total,
                };
                structured_result(summary, &result)
            }
            Err(e) => api_error_result("Lead task search", &e),
        }
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
            output_schema: Some(cached_schema_for_type::<SearchLeadTaskResult>()),
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
                let (params, custom): (SearchLeadTaskParams, _) =
                    parse_arguments(args, Some(schema.as_ref()))?;
                Ok::<_, McpError>(Self::execute(&params, &custom, &ctx).await)
            }
            .boxed()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::context::testing::context_with;
    use crate::domains::custom_fields::{CustomField, CustomFieldsConfig, FieldType};
    use crate::domains::planfix::HttpMethod;
    use crate::domains::planfix::mock::MockApi;
    use serde_json::json;
    use tempfile::TempDir;

    fn fields() -> CustomFieldsConfig {
        CustomFieldsConfig {
            lead_task_fields: vec![CustomField::new(11, "leadSource", Some(FieldType::Enum))
                .with_values(["site", "call"])],
            contact_fields: vec![],
        }
    }

    #[tokio::test]
    async fn test_filters_by_client_and_configured_template() {
        let mock = Arc::new(MockApi::new());
        mock.on(
            HttpMethod::Post,
            "task/list",
            json!({"tasks": [{"id": 70, "name": "Lead"}, {"id": 71}]}),
        );
        let dir = TempDir::new().unwrap();
        let ctx = context_with(mock.clone(), fields(), &dir);

        let params = SearchLeadTaskParams {
            client_id: Some(5),
            template_id: None,
        };
        let result = SearchLeadTaskTool::execute(&params, &JsonObject::new(), &ctx).await;

        let structured = result.structured_content.unwrap();
        assert_eq!(structured["found"], true);
        assert_eq!(structured["task"]["id"], 70);
        assert_eq!(structured["total"], 2);
        assert_eq!(
            mock.last_body("task/list").unwrap()["filters"],
            json!([
                {"type": 108, "operator": "equal", "value": "contact:5"},
                {"type": 51, "operator": "equal", "value": 500}
            ])
        );
    }

    #[tokio::test]
    async fn test_custom_field_alone_is_enough() {
        let mock = Arc::new(MockApi::new());
        mock.on(HttpMethod::Post, "task/list", json!({"tasks": []}));
        let dir = TempDir::new().unwrap();
        let ctx = context_with(mock.clone(), fields(), &dir);

        let custom = json!({"leadSource": "call"}).as_object().cloned().unwrap();
        let params = SearchLeadTaskParams {
            client_id: None,
            template_id: Some(9),
        };
        let result = SearchLeadTaskTool::execute(&params, &custom, &ctx).await;

        assert_eq!(result.is_error, Some(false));
        assert_eq!(result.structured_content.unwrap()["found"], false);
        assert_eq!(
            mock.last_body("task/list").unwrap()["filters"],
            json!([
                {"type": 107, "field": 11, "operator": "equal", "value": "call"},
                {"type": 51, "operator": "equal", "value": 9}
            ])
        );
    }

    #[tokio::test]
    async fn test_template_alone_is_rejected() {
        let mock = Arc::new(MockApi::new());
        let dir = TempDir::new().unwrap();
        let ctx = context_with(mock.clone(), fields(), &dir);

        let result =
            SearchLeadTaskTool::execute(&SearchLeadTaskParams::default(), &JsonObject::new(), &ctx).await;
        assert_eq!(result.is_error, Some(true));
        assert_eq!(mock.calls("task/list"), 0);
    }
}
