//! Helpers shared by the Planfix tools: argument parsing, result building
//! and directory-backed value resolution.

use rmcp::{
    ErrorData as McpError,
    handler::server::tool::cached_schema_for_type,
    model::{CallToolResult, Content, JsonObject},
};
use schemars::JsonSchema;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::{debug, warn};

use crate::core::AppContext;
#[cfg(feature = "http")]
use crate::domains::tools::ToolError;
use crate::domains::custom_fields::{
    CustomField, CustomFieldValue, ExtendedSchema, HasCustomFieldData, ValidationError,
};
use crate::domains::planfix::directory::match_entry;
use crate::domains::planfix::{DirectoryResolver, PlanfixError, PlanfixResult};

// ============================================================================
// Results
// ============================================================================

/// Error result with a structured `{error}` payload.
pub fn error_result(message: impl Into<String>) -> CallToolResult {
    let message = message.into();
    warn!("{}", message);
    CallToolResult {
        content: vec![Content::text(message.clone())],
        structured_content: Some(json!({ "error": message })),
        is_error: Some(true),
        meta: None,
    }
}

/// Error result for a failed Planfix call.
pub fn api_error_result(action: &str, error: &PlanfixError) -> CallToolResult {
    error_result(format!("{} failed: {}", action, error))
}

/// Text summary plus structured JSON content.
pub fn structured_result<T: Serialize>(summary: impl Into<String>, data: &T) -> CallToolResult {
    match serde_json::to_value(data) {
        Ok(structured) => CallToolResult {
            content: vec![Content::text(summary.into())],
            structured_content: Some(structured),
            is_error: Some(false),
            meta: None,
        },
        Err(e) => error_result(format!("Failed to serialize result: {}", e)),
    }
}

/// Serialize a result for the HTTP transport.
#[cfg(feature = "http")]
pub fn http_response(result: CallToolResult) -> Result<Value, ToolError> {
    serde_json::to_value(&result).map_err(|e| ToolError::internal(e.to_string()))
}

// ============================================================================
// Arguments
// ============================================================================

fn validation_error(error: ValidationError) -> McpError {
    McpError::invalid_params(error.to_string(), Some(json!({ "argument": error.arg() })))
}

/// Deserialize the built-in parameters and validate custom field arguments.
///
/// Returns the parameters and the coerced custom arguments. Both failure
/// kinds surface as `invalid_params`.
pub fn parse_arguments<P: DeserializeOwned>(
    args: JsonObject,
    schema: Option<&ExtendedSchema>,
) -> Result<(P, JsonObject), McpError> {
    let custom = match schema {
        Some(schema) => schema.validate(&args).map_err(validation_error)?,
        None => JsonObject::new(),
    };
    let params = serde_json::from_value(Value::Object(args))
        .map_err(|e| McpError::invalid_params(e.to_string(), None))?;
    Ok((params, custom))
}

/// [`parse_arguments`] for an HTTP `tools/call`, whose arguments may be
/// any JSON value.
#[cfg(feature = "http")]
pub fn http_arguments<P: DeserializeOwned>(
    arguments: Value,
    schema: Option<&ExtendedSchema>,
) -> Result<(P, JsonObject), ToolError> {
    let args = match arguments {
        Value::Object(map) => map,
        Value::Null => JsonObject::new(),
        other => {
            return Err(ToolError::invalid_arguments(format!(
                "Tool arguments must be an object, got {}",
                other
            )));
        }
    };
    parse_arguments(args, schema).map_err(|e| ToolError::invalid_arguments(e.message))
}

/// Input schema of a parameter type as a plain object.
pub fn base_schema<P: JsonSchema + 'static>() -> JsonObject {
    cached_schema_for_type::<P>().as_ref().clone()
}

/// Keep only ASCII digits of a phone number.
pub fn normalize_phone(phone: &str) -> String {
    phone.chars().filter(char::is_ascii_digit).collect()
}

/// Argument names of the given field ids, for result payloads.
pub fn field_names(fields: &[CustomField], ids: &[u64]) -> Vec<String> {
    ids.iter()
        .filter_map(|id| fields.iter().find(|f| f.id == *id))
        .map(|f| f.arg_name.clone())
        .collect()
}

// ============================================================================
// Directory entries
// ============================================================================

/// How a directory entry was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum EntryMatch {
    Exact,
    CaseInsensitive,
    Created,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedEntry {
    pub key: u64,
    pub matched: EntryMatch,
}

/// Resolve a label to an entry key: exact match, then a trimmed
/// case-insensitive match over all entries, then (if `create`) a new entry.
///
/// `Ok(None)` means not found and not created.
pub async fn resolve_directory_entry(
    resolver: &DirectoryResolver,
    directory_id: u64,
    field_id: u64,
    label: &str,
    create: bool,
) -> PlanfixResult<Option<ResolvedEntry>> {
    if let Some(key) = resolver
        .search_entry_by_exact_name(directory_id, field_id, label)
        .await
    {
        return Ok(Some(ResolvedEntry {
            key,
            matched: EntryMatch::Exact,
        }));
    }

    let entries = resolver.search_all_entries(directory_id).await;
    if let Some(entry) = match_entry(&entries, label) {
        debug!(
            "[directory] {:?} matched {:?} case-insensitively",
            label, entry.name
        );
        return Ok(Some(ResolvedEntry {
            key: entry.key,
            matched: EntryMatch::CaseInsensitive,
        }));
    }

    if !create {
        return Ok(None);
    }

    let key = resolver
        .create_entry(directory_id, field_id, label.trim())
        .await?;
    Ok(Some(ResolvedEntry {
        key,
        matched: EntryMatch::Created,
    }))
}

/// Replace label values of directory-backed enum fields in `body` with
/// entry references, creating missing entries.
///
/// Only entries for `written` field ids are touched. Fields that the
/// object metadata does not link to a directory keep their literal value.
pub async fn resolve_directory_values<B>(
    ctx: &AppContext,
    body: &mut B,
    fields: &[CustomField],
    written: &[u64],
) -> PlanfixResult<()>
where
    B: HasCustomFieldData + Send + ?Sized,
{
    let Some(entries) = body.custom_field_data_mut().as_mut() else {
        return Ok(());
    };

    for entry in entries.iter_mut() {
        let field_id = entry.field.id;
        let is_enum = fields.iter().any(|f| f.id == field_id && f.is_enum());
        if !is_enum || !written.contains(&field_id) {
            continue;
        }
        let Some(label) = entry.value.as_str().map(str::to_string) else {
            continue;
        };
        let Some(directory_id) = ctx.objects.field_directory_id(field_id).await else {
            continue;
        };
        let Some(name_field) = ctx.directories.name_field_id(directory_id).await else {
            warn!(
                "[directory] Directory {} has no name field, sending {:?} as text",
                directory_id, label
            );
            continue;
        };

        if let Some(resolved) =
            resolve_directory_entry(&ctx.directories, directory_id, name_field, &label, true)
                .await?
        {
            entry.value = CustomFieldValue::DirectoryRef { id: resolved.key };
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::context::testing::context_with;
    use crate::domains::custom_fields::{
        CustomFieldBody, CustomFieldDataEntry, CustomFieldsConfig, FieldType, extend_schema,
    };
    use crate::domains::planfix::HttpMethod;
    use crate::domains::planfix::mock::MockApi;
    use std::sync::Arc;

    fn args(value: Value) -> JsonObject {
        value.as_object().cloned().unwrap()
    }

    #[derive(Debug, serde::Deserialize)]
    struct Params {
        name: String,
    }

    fn schema() -> ExtendedSchema {
        let base = args(json!({"type": "object", "properties": {"name": {"type": "string"}}}));
        extend_schema(
            &base,
            &[CustomField::new(2, "status", Some(FieldType::Enum)).with_values(["one", "two"])],
        )
    }

    #[test]
    fn test_parse_arguments_splits_custom_args() {
        let (params, custom): (Params, JsonObject) =
            parse_arguments(args(json!({"name": "x", "status": "one"})), Some(&schema())).unwrap();
        assert_eq!(params.name, "x");
        assert_eq!(custom, args(json!({"status": "one"})));
    }

    #[test]
    fn test_parse_arguments_rejects_bad_enum() {
        let err = parse_arguments::<Params>(args(json!({"name": "x", "status": "three"})), Some(&schema()))
            .unwrap_err();
        assert_eq!(err.code, rmcp::model::ErrorCode::INVALID_PARAMS);
        assert_eq!(err.data, Some(json!({"argument": "status"})));
    }

    #[test]
    fn test_parse_arguments_rejects_missing_base_param() {
        let err = parse_arguments::<Params>(args(json!({})), None).unwrap_err();
        assert_eq!(err.code, rmcp::model::ErrorCode::INVALID_PARAMS);
    }

    #[test]
    fn test_error_result_is_structured() {
        let result = error_result("boom");
        assert_eq!(result.is_error, Some(true));
        assert_eq!(result.structured_content, Some(json!({"error": "boom"})));
    }

    #[test]
    fn test_normalize_phone() {
        assert_eq!(normalize_phone("+7 (900) 000-11-22"), "79000001122");
    }

    fn directory_mock() -> Arc<MockApi> {
        let mock = Arc::new(MockApi::new());
        mock.on(
            HttpMethod::Get,
            "directory/7?fields=id%2Cname%2Cfields",
            json!({"directory": {"id": 7, "fields": [{"id": 70}]}}),
        );
        mock.on(
            HttpMethod::Post,
            "object/list",
            json!({"objects": [{"id": 1, "customFieldData": [{"field": {"id": 2, "directoryId": 7}}]}]}),
        );
        mock
    }

    #[tokio::test]
    async fn test_resolve_prefers_exact_then_case_insensitive() {
        let mock = directory_mock();
        mock.on(HttpMethod::Post, "directory/7/entry/list", json!({"directoryEntries": []}));
        mock.on(
            HttpMethod::Post,
            "directory/7/entry/list",
            json!({"directoryEntries": [{"key": 5, "customFieldData": [{"field": {"id": 70}, "value": "Moscow"}]}]}),
        );
        let dir = tempfile::TempDir::new().unwrap();
        let ctx = context_with(mock.clone(), CustomFieldsConfig::default(), &dir);

        let resolved = resolve_directory_entry(&ctx.directories, 7, 70, " moscow ", false)
            .await
            .unwrap();
        assert_eq!(
            resolved,
            Some(ResolvedEntry {
                key: 5,
                matched: EntryMatch::CaseInsensitive
            })
        );
        assert_eq!(mock.calls("directory/7/entry/"), 0);
    }

    #[tokio::test]
    async fn test_resolve_without_create_reports_not_found() {
        let mock = directory_mock();
        mock.on(HttpMethod::Post, "directory/7/entry/list", json!({"directoryEntries": []}));
        let dir = tempfile::TempDir::new().unwrap();
        let ctx = context_with(mock.clone(), CustomFieldsConfig::default(), &dir);

        let resolved = resolve_directory_entry(&ctx.directories, 7, 70, "Tver", false)
            .await
            .unwrap();
        assert_eq!(resolved, None);
    }

    #[tokio::test]
    async fn test_resolve_directory_values_creates_missing_entry() {
        let mock = directory_mock();
        mock.on(HttpMethod::Post, "directory/7/entry/list", json!({"directoryEntries": []}));
        mock.on(HttpMethod::Post, "directory/7/entry/", json!({"key": 42}));
        let fields = vec![CustomField::new(2, "status", Some(FieldType::Enum)).with_values(["one"])];
        let dir = tempfile::TempDir::new().unwrap();
        let ctx = context_with(mock.clone(), CustomFieldsConfig::default(), &dir);

        let mut body = CustomFieldBody {
            custom_field_data: Some(vec![
                CustomFieldDataEntry::scalar(2, json!("one")),
                CustomFieldDataEntry::scalar(9, json!("text")),
            ]),
        };
        resolve_directory_values(&ctx, &mut body, &fields, &[2]).await.unwrap();

        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            json!({"customFieldData": [
                {"field": {"id": 2}, "value": {"id": 42}},
                {"field": {"id": 9}, "value": "text"}
            ]})
        );
    }

    #[tokio::test]
    async fn test_resolve_directory_values_keeps_plain_enum() {
        let mock = Arc::new(MockApi::new());
        mock.on(HttpMethod::Post, "object/list", json!({"objects": []}));
        let fields = vec![CustomField::new(2, "status", Some(FieldType::Enum)).with_values(["one"])];
        let dir = tempfile::TempDir::new().unwrap();
        let ctx = context_with(mock.clone(), CustomFieldsConfig::default(), &dir);

        let mut body = CustomFieldBody {
            custom_field_data: Some(vec![CustomFieldDataEntry::scalar(2, json!("one"))]),
        };
        resolve_directory_values(&ctx, &mut body, &fields, &[2]).await.unwrap();

        assert_eq!(body.custom_field_data()[0].value.as_str(), Some("one"));
    }
}
