//! Contact search tool.
//!
//! Tries the identifying criteria one at a time, most specific first:
//! phone, email, telegram, then name. Contact custom fields narrow every
//! attempt. The first attempt that returns contacts wins.

use futures::FutureExt;
use rmcp::{
    ErrorData as McpError,
    handler::server::tool::{ToolCallContext, ToolRoute, cached_schema_for_type},
    model::{CallToolResult, JsonObject, Tool},
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, info, instrument};

use super::{ContactInfo, telegram_handle};
use crate::core::AppContext;
use crate::domains::custom_fields::{ExtendedSchema, FilterFragment, FilterTarget, build_filters};
use crate::domains::planfix::types::{ContactSummary, PAGE_SIZE, filter_codes, list_from};
use crate::domains::planfix::{PlanfixError, PlanfixRequest, PlanfixResult};
use crate::domains::tools::definitions::common::{
    api_error_result, base_schema, error_result, normalize_phone, parse_arguments,
    structured_result,
};
#[cfg(feature = "http")]
use crate::domains::tools::{
    ToolError,
    definitions::common::{http_arguments, http_response},
};

#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SearchContactParams {
    /// Contact full name.
    #[serde(default)]
    pub name: Option<String>,

    /// Phone number in any format.
    #[serde(default)]
    pub phone: Option<String>,

    #[serde(default)]
    pub email: Option<String>,

    /// Telegram username, with or without `@`.
    #[serde(default)]
    pub telegram: Option<String>,
}

impl SearchContactParams {
    /// Built-in criteria in the order they are tried.
    fn criteria(&self) -> Vec<(&'static str, FilterFragment)> {
        let mut criteria = Vec::new();
        if let Some(phone) = self.phone.as_deref().map(normalize_phone).filter(|p| !p.is_empty()) {
            criteria.push(("phone", FilterFragment::equal(filter_codes::CONTACT_PHONE, phone)));
        }
        if let Some(email) = non_empty(&self.email) {
            criteria.push(("email", FilterFragment::equal(filter_codes::CONTACT_EMAIL, email)));
        }
        if let Some(telegram) = non_empty(&self.telegram).map(telegram_handle) {
            criteria.push((
                "telegram",
                FilterFragment::equal(filter_codes::CONTACT_TELEGRAM, telegram),
            ));
        }
        if let Some(name) = non_empty(&self.name) {
            criteria.push(("name", FilterFragment::equal(filter_codes::CONTACT_NAME, name)));
        }
        criteria
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

#[derive(Debug, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
struct SearchContactResult {
    found: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    contact: Option<ContactInfo>,
    /// Criterion that produced the match.
    #[serde(skip_serializing_if = "Option::is_none")]
    matched_by: Option<String>,
    /// Number of contacts returned by the matching query.
    total: usize,
}

pub struct SearchContactTool;

impl SearchContactTool {
    pub const NAME: &'static str = "planfix_search_contact";

    pub const DESCRIPTION: &'static str = "Find a Planfix contact by phone, email, telegram or name (tried in that order). Contact custom fields can be passed as extra arguments to narrow the search.";

    fn schema(ctx: &AppContext) -> ExtendedSchema {
        ctx.contact_schema.extend(&base_schema::<SearchContactParams>())
    }

    async fn list_contacts(
        ctx: &AppContext,
        filters: &[FilterFragment],
    ) -> PlanfixResult<Vec<ContactSummary>> {
        let body = json!({
            "offset": 0,
            "pageSize": PAGE_SIZE,
            "filters": filters,
            "fields": "id,name,lastname,email",
        });
        let response = ctx.api.request(PlanfixRequest::post("contact/list", body)).await?;
        list_from(&response, "contacts")
            .map_err(|e| PlanfixError::invalid_response(format!("contact/list: {}", e)))
    }

    #[instrument(skip_all)]
    pub async fn execute(
        params: &SearchContactParams,
        custom: &JsonObject,
        ctx: &AppContext,
    ) -> CallToolResult {
        let mut custom_filters = Vec::new();
        build_filters(&mut custom_filters, custom, ctx.contact_fields(), FilterTarget::Contact);

        let mut attempts: Vec<(&str, Vec<FilterFragment>)> = params
            .criteria()
            .into_iter()
            .map(|(label, filter)| {
                let mut filters = vec![filter];
                filters.extend(custom_filters.iter().cloned());
                (label, filters)
            })
            .collect();
        if attempts.is_empty() && !custom_filters.is_empty() {
            attempts.push(("customFields", custom_filters));
        }
        if attempts.is_empty() {
            return error_result("Provide phone, email, telegram, name or a custom field to search by");
        }

        for (label, filters) in attempts {
            debug!("Searching contacts by {}", label);
            let contacts = match Self::list_contacts(ctx, &filters).await {
                Ok(contacts) => contacts,
                Err(e) => return api_error_result("Contact search", &e),
            };
            if let Some(first) = contacts.first().cloned() {
                info!("Contact {} found by {}", first.id, label);
                let result = SearchContactResult {
                    found: true,
                    total: contacts.len(),
                    contact: Some(ContactInfo::from_summary(first, ctx)),
                    matched_by: Some(label.to_string()),
                };
                return structured_result(format!("Contact found by {}", label), &result);
            }
        }

        let result = SearchContactResult {
            found: false,
            contact: None,
            matched_by: None,
            total: 0,
        };
        structured_result("Contact not found", &result)
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
            output_schema: Some(cached_schema_for_type::<SearchContactResult>()),
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
                let (params, custom): (SearchContactParams, _) =
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
    use tempfile::TempDir;

    fn fields() -> CustomFieldsConfig {
        CustomFieldsConfig {
            lead_task_fields: vec![],
            contact_fields: vec![CustomField::new(1, "city", Some(FieldType::String))],
        }
    }

    #[tokio::test]
    async fn test_falls_through_to_email_when_phone_misses() {
        let mock = Arc::new(MockApi::new());
        mock.on(HttpMethod::Post, "contact/list", json!({"contacts": []}));
        mock.on(
            HttpMethod::Post,
            "contact/list",
            json!({"contacts": [{"id": 12, "name": "John", "lastname": "Doe"}]}),
        );
        let dir = TempDir::new().unwrap();
        let ctx = context_with(mock.clone(), fields(), &dir);

        let params = SearchContactParams {
            phone: Some("+7 (900) 111-22-33".into()),
            email: Some("john@example.com".into()),
            name: Some("John Doe".into()),
            ..Default::default()
        };
        let result = SearchContactTool::execute(&params, &JsonObject::new(), &ctx).await;

        let structured = result.structured_content.unwrap();
        assert_eq!(structured["found"], true);
        assert_eq!(structured["matchedBy"], "email");
        assert_eq!(structured["contact"]["id"], 12);
        assert_eq!(structured["contact"]["url"], "https://acme.planfix.com/contact/12");

        let requests = mock.requests_to("contact/list");
        assert_eq!(requests.len(), 2);
        assert_eq!(
            requests[0].body.as_ref().unwrap()["filters"],
            json!([{"type": 4003, "operator": "equal", "value": "79001112233"}])
        );
        assert_eq!(
            requests[1].body.as_ref().unwrap()["filters"],
            json!([{"type": 4026, "operator": "equal", "value": "john@example.com"}])
        );
    }

    #[tokio::test]
    async fn test_custom_filters_apply_to_each_attempt() {
        let mock = Arc::new(MockApi::new());
        mock.on(HttpMethod::Post, "contact/list", json!({"contacts": []}));
        let dir = TempDir::new().unwrap();
        let ctx = context_with(mock.clone(), fields(), &dir);

        let params = SearchContactParams {
            telegram: Some("@johnny".into()),
            name: Some("John".into()),
            ..Default::default()
        };
        let custom = json!({"city": "Kazan"}).as_object().cloned().unwrap();
        let result = SearchContactTool::execute(&params, &custom, &ctx).await;

        assert_eq!(result.structured_content.unwrap()["found"], false);
        let requests = mock.requests_to("contact/list");
        assert_eq!(requests.len(), 2);
        assert_eq!(
            requests[0].body.as_ref().unwrap()["filters"],
            json!([
                {"type": 4230, "operator": "equal", "value": "johnny"},
                {"type": 4101, "field": 1, "operator": "equal", "value": "Kazan"}
            ])
        );
    }

    #[tokio::test]
    async fn test_custom_fields_alone() {
        let mock = Arc::new(MockApi::new());
        mock.on(HttpMethod::Post, "contact/list", json!({"contacts": [{"id": 4}]}));
        let dir = TempDir::new().unwrap();
        let ctx = context_with(mock.clone(), fields(), &dir);

        let custom = json!({"city": "Kazan"}).as_object().cloned().unwrap();
        let result =
            SearchContactTool::execute(&SearchContactParams::default(), &custom, &ctx).await;

        assert_eq!(result.structured_content.unwrap()["matchedBy"], "customFields");
    }

    #[tokio::test]
    async fn test_no_criteria_is_an_error() {
        let mock = Arc::new(MockApi::new());
        let dir = TempDir::new().unwrap();
        let ctx = context_with(mock, fields(), &dir);

        let params = SearchContactParams {
            phone: Some("no digits".into()),
            ..Default::default()
        };
        let result = SearchContactTool::execute(&params, &JsonObject::new(), &ctx).await;
        assert_eq!(result.is_error, Some(true));
    }
}
