//! Task search tool.
//!
//! Finds tasks by title and/or client contact. Lead task custom fields are
//! accepted as extra arguments and become task custom field filters.

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
pub struct SearchTaskParams {
    /// Exact task title.
    #[serde(default)]
    pub task_name: Option<String>,

    /// Planfix contact id of the client.
    #[serde(default)]
    pub client_id: Option<u64>,
}

#[derive(Debug, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
struct SearchTaskResult {
    found: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    task_id: Option<u64>,
    tasks: Vec<TaskInfo>,
}

pub struct SearchTaskTool;

impl SearchTaskTool {
    pub const NAME: &'static str = "planfix_search_task";

    pub const DESCRIPTION: &'static str = "Search Planfix tasks by title and/or client contact id. Lead task custom fields can be passed as extra arguments to narrow the search.";

    fn schema(ctx: &AppContext) -> ExtendedSchema {
        ctx.lead_task_schema.extend(&base_schema::<SearchTaskParams>())
    }

    #[instrument(skip_all, fields(task_name = ?params.task_name, client_id = ?params.client_id))]
    pub async fn execute(
        params: &SearchTaskParams,
        custom: &JsonObject,
        ctx: &AppContext,
    ) -> CallToolResult {
        let mut filters = Vec::new();
        if let Some(name) = params.task_name.as_deref().filter(|n| !n.trim().is_empty()) {
            filters.push(FilterFragment::equal(filter_codes::TASK_NAME, name.trim()));
        }
        if let Some(client_id) = params.client_id {
            filters.push(FilterFragment::equal(
                filter_codes::TASK_COUNTERPARTY,
                ContactRef::new(client_id).id,
            ));
        }
        build_filters(&mut filters, custom, ctx.lead_task_fields(), FilterTarget::Task);

        if filters.is_empty() {
            return error_result("Provide taskName, clientId or at least one custom field to search by");
        }

        info!("Searching tasks with {} filters", filters.len());
        match list_tasks(ctx, &filters).await {
            Ok(tasks) => {
                let summary = match tasks.first() {
                    Some(first) => format!("Found {} task(s), first: {}", tasks.len(), first.id),
                    None => "No tasks found".to_string(),
                };
                let result = SearchTaskResult {
                    found: !tasks.is_empty(),
                    task_id: tasks.first().map(|t| t.id),
                    tasks,
                };
                structured_result(summary, &result)
            }
            Err(e) => api_error_result("Task search", &e),
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
            output_schema: Some(cached_schema_for_type::<SearchTaskResult>()),
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
                let (params, custom): (SearchTaskParams, _) =
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
            lead_task_fields: vec![
                CustomField::new(11, "source", Some(FieldType::String)),
                CustomField::new(12, "odd", Some(FieldType::Other("date".into()))),
            ],
            contact_fields: vec![],
        }
    }

    fn custom(value: serde_json::Value) -> JsonObject {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn test_search_sends_builtin_and_custom_filters() {
        let mock = Arc::new(MockApi::new());
        mock.on(
            HttpMethod::Post,
            "task/list",
            json!({"tasks": [{"id": 7, "name": "Lead: John"}]}),
        );
        let dir = TempDir::new().unwrap();
        let ctx = context_with(mock.clone(), fields(), &dir);

        let params = SearchTaskParams {
            task_name: Some("Lead: John".into()),
            client_id: Some(42),
        };
        let result =
            SearchTaskTool::execute(&params, &custom(json!({"source": "site", "odd": "x"})), &ctx)
                .await;

        assert_eq!(result.is_error, Some(false));
        let structured = result.structured_content.unwrap();
        assert_eq!(structured["found"], true);
        assert_eq!(structured["taskId"], 7);
        assert_eq!(structured["tasks"][0]["url"], "https://acme.planfix.com/task/7");

        let body = mock.last_body("task/list").unwrap();
        assert_eq!(
            body["filters"],
            json!([
                {"type": 8, "operator": "equal", "value": "Lead: John"},
                {"type": 108, "operator": "equal", "value": "contact:42"},
                {"type": 107, "field": 11, "operator": "equal", "value": "site"}
            ])
        );
    }

    #[tokio::test]
    async fn test_search_without_criteria_is_an_error() {
        let mock = Arc::new(MockApi::new());
        let dir = TempDir::new().unwrap();
        let ctx = context_with(mock.clone(), fields(), &dir);

        let result = SearchTaskTool::execute(&SearchTaskParams::default(), &JsonObject::new(), &ctx).await;
        assert_eq!(result.is_error, Some(true));
        assert_eq!(mock.calls("task/list"), 0);
    }

    #[tokio::test]
    async fn test_search_no_match_is_not_an_error() {
        let mock = Arc::new(MockApi::new());
        mock.on(HttpMethod::Post, "task/list", json!({"tasks": []}));
        let dir = TempDir::new().unwrap();
        let ctx = context_with(mock, fields(), &dir);

        let params = SearchTaskParams {
            task_name: Some("Nope".into()),
            client_id: None,
        };
        let result = SearchTaskTool::execute(&params, &JsonObject::new(), &ctx).await;
        assert_eq!(result.is_error, Some(false));
        assert_eq!(result.structured_content.unwrap()["found"], false);
    }

    #[tokio::test]
    async fn test_search_api_failure_is_error_result() {
        let mock = Arc::new(MockApi::new());
        mock.fail(HttpMethod::Post, "task/list", 500, "down");
        let dir = TempDir::new().unwrap();
        let ctx = context_with(mock, fields(), &dir);

        let params = SearchTaskParams {
            task_name: Some("Lead".into()),
            client_id: None,
        };
        let result = SearchTaskTool::execute(&params, &JsonObject::new(), &ctx).await;
        assert_eq!(result.is_error, Some(true));
        assert!(result.structured_content.unwrap()["error"]
            .as_str()
            .unwrap()
            .contains("down"));
    }

    #[test]
    fn test_tool_schema_lists_custom_fields() {
        let dir = TempDir::new().unwrap();
        let ctx = context_with(Arc::new(MockApi::new()), fields(), &dir);
        let tool = SearchTaskTool::to_tool(&ctx);
        let properties = tool.input_schema["properties"].as_object().unwrap();
        assert!(properties.contains_key("taskName"));
        assert!(properties.contains_key("source"));
    }
}
