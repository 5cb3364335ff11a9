//! Directory lookup by name.

use futures::FutureExt;
use rmcp::{
    ErrorData as McpError,
    handler::server::tool::{ToolCallContext, ToolRoute, cached_schema_for_type},
    model::{CallToolResult, Tool},
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::instrument;

use crate::core::AppContext;
use crate::domains::tools::definitions::common::{error_result, parse_arguments, structured_result};
#[cfg(feature = "http")]
use crate::domains::tools::{
    ToolError,
    definitions::common::{http_arguments, http_response},
};

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct SearchDirectoryParams {
    /// Directory name, matched case-insensitively.
    pub name: String,
}

#[derive(Debug, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
struct SearchDirectoryResult {
    found: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    directory_id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
}

pub struct SearchDirectoryTool;

impl SearchDirectoryTool {
    pub const NAME: &'static str = "planfix_search_directory";

    pub const DESCRIPTION: &'static str = "Find a Planfix directory by name (case-insensitive). Returns the directory id used by planfix_search_directory_entry.";

    #[instrument(skip_all, fields(name = %params.name))]
    pub async fn execute(params: &SearchDirectoryParams, ctx: &AppContext) -> CallToolResult {
        if params.name.trim().is_empty() {
            return error_result("Directory name must not be empty");
        }

        let result = match ctx.directories.search_directory(&params.name).await {
            Some(directory) => SearchDirectoryResult {
                found: true,
                directory_id: Some(directory.id),
                name: Some(directory.name),
            },
            None => SearchDirectoryResult {
                found: false,
                directory_id: None,
                name: None,
            },
        };
        let summary = match result.directory_id {
            Some(id) => format!("Directory found: {}", id),
            None => format!("Directory {:?} not found", params.name),
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
            input_schema: cached_schema_for_type::<SearchDirectoryParams>(),
            annotations: None,
            output_schema: Some(cached_schema_for_type::<SearchDirectoryResult>()),
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
                let (params, _): (SearchDirectoryParams, _) = parse_arguments(args, None)?;
                Ok::<_, McpError>(Self::execute(&params, &ctx).await)
            }
            .boxed()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::context::testing::context_with;
    use crate::domains::custom_fields::CustomFieldsConfig;
    use crate::domains::planfix::HttpMethod;
    use crate::domains::planfix::mock::MockApi;
    use serde_json::json;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_directory_lookup_is_cached() {
        let mock = Arc::new(MockApi::new());
        mock.on(
            HttpMethod::Post,
            "directory/list",
            json!({"directories": [{"id": 7, "name": "Cities"}]}),
        );
        let dir = TempDir::new().unwrap();
        let ctx = context_with(mock.clone(), CustomFieldsConfig::default(), &dir);

        let params = SearchDirectoryParams {
            name: "cities".into(),
        };
        for _ in 0..2 {
            let structured = SearchDirectoryTool::execute(&params, &ctx)
                .await
                .structured_content
                .unwrap();
            assert_eq!(structured["directoryId"], 7);
        }
        assert_eq!(mock.calls("directory/list"), 1);
    }

    #[tokio::test]
    async fn test_lookup_failure_reads_as_not_found() {
        let mock = Arc::new(MockApi::new());
        mock.fail(HttpMethod::Post, "directory/list", 500, "down");
        let dir = TempDir::new().unwrap();
        let ctx = context_with(mock, CustomFieldsConfig::default(), &dir);

        let params = SearchDirectoryParams {
            name: "Cities".into(),
        };
        let result = SearchDirectoryTool::execute(&params, &ctx).await;
        assert_eq!(result.is_error, Some(false));
        assert_eq!(result.structured_content.unwrap()["found"], false);
    }
}
