//! Directory entry resolution.
//!
//! Resolves a label to an entry key: exact match first, then a trimmed
//! case-insensitive match over all entries. With `createIfMissing` an
//! unmatched label becomes a new entry.

use futures::FutureExt;
use rmcp::{
    ErrorData as McpError,
    handler::server::tool::{ToolCallContext, ToolRoute, cached_schema_for_type},
    model::{CallToolResult, Tool},
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};

use crate::core::AppContext;
use crate::domains::tools::definitions::common::{
    EntryMatch, api_error_result, error_result, parse_arguments, resolve_directory_entry,
    structured_result,
};
#[cfg(feature = "http")]
use crate::domains::tools::{
    ToolError,
    definitions::common::{http_arguments, http_response},
};

#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SearchDirectoryEntryParams {
    /// Directory id; takes precedence over `directoryName`.
    #[serde(default)]
    pub directory_id: Option<u64>,

    /// Directory name, used when no id is given.
    #[serde(default)]
    pub directory_name: Option<String>,

    /// Entry label to resolve.
    pub name: String,

    /// Create the entry when no match exists.
    #[serde(default)]
    pub create_if_missing: bool,
}

#[derive(Debug, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
struct SearchDirectoryEntryResult {
    found: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    directory_id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    entry_id: Option<u64>,
    /// How the entry was found: exact, case_insensitive or created.
    #[serde(skip_serializing_if = "Option::is_none")]
    matched_by: Option<EntryMatch>,
    created: bool,
}

impl SearchDirectoryEntryResult {
    fn not_found(directory_id: Option<u64>) -> Self {
        Self {
            found: false,
            directory_id,
            entry_id: None,
            matched_by: None,
            created: false,
        }
    }
}

pub struct SearchDirectoryEntryTool;

impl SearchDirectoryEntryTool {
    pub const NAME: &'static str = "planfix_search_directory_entry";

    pub const DESCRIPTION: &'static str = "Resolve a directory entry label to its id. Tries an exact match, then a case-insensitive match, and creates the entry when createIfMissing is true.";

    #[instrument(skip_all, fields(name = %params.name, create = params.create_if_missing))]
    pub async fn execute(params: &SearchDirectoryEntryParams, ctx: &AppContext) -> CallToolResult {
        if params.name.trim().is_empty() {
            return error_result("Entry name must not be empty");
        }

        let directory_id = match (params.directory_id, params.directory_name.as_deref()) {
            (Some(id), _) => id,
            (None, Some(name)) if !name.trim().is_empty() => {
                match ctx.directories.search_directory(name).await {
                    Some(directory) => directory.id,
                    None => {
                        return structured_result(
                            format!("Directory {:?} not found", name),
                            &SearchDirectoryEntryResult::not_found(None),
                        );
                    }
                }
            }
            _ => return error_result("Provide directoryId or directoryName"),
        };

        let Some(name_field) = ctx.directories.name_field_id(directory_id).await else {
            return structured_result(
                format!("Directory {} not found or has no fields", directory_id),
                &SearchDirectoryEntryResult::not_found(Some(directory_id)),
            );
        };

        let resolved = match resolve_directory_entry(
            &ctx.directories,
            directory_id,
            name_field,
            &params.name,
            params.create_if_missing,
        )
        .await
        {
            Ok(resolved) => resolved,
            Err(e) => return api_error_result("Directory entry creation", &e),
        };

        match resolved {
            Some(entry) => {
                info!("Entry {:?} resolved to {} ({:?})", params.name, entry.key, entry.matched);
                let result = SearchDirectoryEntryResult {
                    found: true,
                    directory_id: Some(directory_id),
                    entry_id: Some(entry.key),
                    matched_by: Some(entry.matched),
                    created: entry.matched == EntryMatch::Created,
                };
                structured_result(format!("Entry {} resolved", entry.key), &result)
            }
            None => structured_result(
                format!("Entry {:?} not found", params.name),
                &SearchDirectoryEntryResult::not_found(Some(directory_id)),
            ),
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
            input_schema: cached_schema_for_type::<SearchDirectoryEntryParams>(),
            annotations: None,
            output_schema: Some(cached_schema_for_type::<SearchDirectoryEntryResult>()),
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
                let (params, _): (SearchDirectoryEntryParams, _) = parse_arguments(args, None)?;
                Ok::<_, McpError>(Self::execute(&params, &ctx).await)
            }
            .boxed()
        })
    }
}
