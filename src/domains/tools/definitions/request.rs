//! Raw Planfix API passthrough for endpoints no dedicated tool covers.

use futures::FutureExt;
use rmcp::{
    ErrorData as McpError,
    handler::server::tool::{ToolCallContext, ToolRoute, cached_schema_for_type},
    model::{CallToolResult, Tool},
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::{info, instrument};

use crate::core::AppContext;
use crate::domains::planfix::{HttpMethod, PlanfixRequest};
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
pub struct PlanfixRequestParams {
    /// Path relative to the REST root, e.g. `task/list`.
    pub path: String,

    /// HTTP method, POST by default.
    #[serde(default)]
    pub method: HttpMethod,

    /// JSON body for POST requests.
    #[serde(default)]
    pub body: Option<Value>,

    /// Seconds to cache the response; ignored for DELETE.
    #[serde(default)]
    pub cache_time: Option<u64>,
}

#[derive(Debug, Serialize, JsonSchema)]
struct PlanfixRequestResult {
    response: Value,
}

pub struct PlanfixRequestTool;

impl PlanfixRequestTool {
    pub const NAME: &'static str = "planfix_request";

    pub const DESCRIPTION: &'static str = "Send a raw request to the Planfix REST API. Use only when no dedicated tool fits. Returns the parsed JSON response.";

    #[instrument(skip_all, fields(method = %params.method, path = %params.path))]
    pub async fn execute(params: &PlanfixRequestParams, ctx: &AppContext) -> CallToolResult {
        let path = params.path.trim().trim_start_matches('/');
        if path.is_empty() {
            return error_result("Request path must not be empty");
        }

        let mut request = PlanfixRequest::new(params.method, path);
        if let Some(body) = params.body.clone() {
            request = request.with_body(body);
        }
        if let Some(seconds) = params.cache_time.filter(|_| params.method != HttpMethod::Delete) {
            request = request.with_cache(seconds);
        }

        info!("Raw Planfix request");
        match ctx.api.request(request).await {
            Ok(response) => structured_result(
                format!("{} {} succeeded", params.method, path),
                &PlanfixRequestResult { response },
            ),
            Err(e) => api_error_result(&format!("{} {}", params.method, path), &e),
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
            input_schema: cached_schema_for_type::<PlanfixRequestParams>(),
            annotations: None,
            output_schema: None,
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
                let (params, _): (PlanfixRequestParams, _) = parse_arguments(args, None)?;
                Ok::<_, McpError>(Self::execute(&params, &ctx).await)
            }
            .boxed()
        })
    }
}
