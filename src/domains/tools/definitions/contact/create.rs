//! Contact creation tool.

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

use super::{ContactBody, mobile, telegram_handle};
use crate::core::AppContext;
use crate::domains::custom_fields::{ExtendedSchema, extend_post_body};
use crate::domains::planfix::{PlanfixRequest};
use crate::domains::tools::definitions::common::{
    api_error_result, base_schema, error_result, field_names, parse_arguments, structured_result,
};
#[cfg(feature = "http")]
use crate::domains::tools::{
    ToolError,
    definitions::common::{http_arguments, http_response},
};

#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateContactParams {
    /// First name.
    pub name: String,

    #[serde(default)]
    pub lastname: Option<String>,

    #[serde(default)]
    pub email: Option<String>,

    /// Phone number, stored as a mobile phone.
    #[serde(default)]
    pub phone: Option<String>,

    /// Telegram username, with or without `@`.
    #[serde(default)]
    pub telegram: Option<String>,
}

#[derive(Debug, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
struct CreateContactResult {
    contact_id: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    url: Option<String>,
    custom_fields: Vec<String>,
}

pub struct CreateContactTool;

impl CreateContactTool {
    pub const NAME: &'static str = "planfix_create_contact";

    pub const DESCRIPTION: &'static str = "Create a Planfix contact with name, lastname, email, phone and telegram. Contact custom fields can be passed as extra arguments; configured defaults apply to fields that are not passed.";

    fn schema(ctx: &AppContext) -> ExtendedSchema {
        ctx.contact_schema.extend(&base_schema::<CreateContactParams>())
    }

    #[instrument(skip_all, fields(name = %params.name))]
    pub async fn execute(
        params: &CreateContactParams,
        custom: &JsonObject,
        ctx: &AppContext,
    ) -> CallToolResult {
        if params.name.trim().is_empty() {
            return error_result("Contact name must not be empty");
        }

        let present = |value: &Option<String>| {
            value
                .as_deref()
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };
        let mut body = ContactBody {
            name: Some(params.name.trim().to_string()),
            lastname: present(&params.lastname),
            email: present(&params.email),
            phones: present(&params.phone).map(|phone| vec![mobile(&phone)]),
            telegram: present(&params.telegram).map(|t| telegram_handle(&t)),
            custom_field_data: None,
        };

        let fields = ctx.contact_fields();
        let outcome = extend_post_body(&mut body, custom, fields, None, false);

        let payload = match serde_json::to_value(&body) {
            Ok(payload) => payload,
            Err(e) => return error_result(format!("Failed to build contact payload: {}", e)),
        };
        let response = match ctx.api.request(PlanfixRequest::post("contact/", payload)).await {
            Ok(response) => response,
            Err(e) => return api_error_result("Contact creation", &e),
        };
        let Some(contact_id) = response.get("id").and_then(Value::as_u64) else {
            return error_result("Planfix did not return the new contact id");
        };

        info!("Created contact {}", contact_id);
        let result = CreateContactResult {
            contact_id,
            url: ctx.config.planfix.entity_url("contact", contact_id),
            custom_fields: field_names(fields, &outcome.written),
        };
        structured_result(format!("Contact {} created", contact_id), &result)
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
            output_schema: Some(cached_schema_for_type::<CreateContactResult>()),
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
                let (params, custom): (CreateContactParams, _) =
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
            lead_task_fields: vec![],
            contact_fields: vec![
                CustomField::new(1, "city", Some(FieldType::String)),
                CustomField::new(2, "segment", Some(FieldType::Enum))
                    .with_values(["b2b", "b2c"])
                    .with_default("b2c"),
            ],
        }
    }

    #[tokio::test]
    async fn test_create_contact_payload() {
        let mock = Arc::new(MockApi::new());
        mock.on(HttpMethod::Post, "contact/", json!({"result": "success", "id": 12}));
        let dir = TempDir::new().unwrap();
        let ctx = context_with(mock.clone(), fields(), &dir);

        let params = CreateContactParams {
            name: " John ".into(),
            lastname: Some("Doe".into()),
            email: Some("".into()),
            phone: Some("+7 900 111-22-33".into()),
            telegram: Some("@johnny".into()),
        };
        let custom = json!({"city": "Kazan"}).as_object().cloned().unwrap();
        let result = CreateContactTool::execute(&params, &custom, &ctx).await;

        let structured = result.structured_content.unwrap();
        assert_eq!(structured["contactId"], 12);
        assert_eq!(structured["customFields"], json!(["city", "segment"]));
        assert_eq!(
            mock.last_body("contact/").unwrap(),
            json!({
                "name": "John",
                "lastname": "Doe",
                "phones": [{"number": "+7 900 111-22-33", "type": 1}],
                "telegram": "johnny",
                "customFieldData": [
                    {"field": {"id": 1}, "value": "Kazan"},
                    {"field": {"id": 2}, "value": "b2c"}
                ]
            })
        );
    }

    #[tokio::test]
    async fn test_create_contact_failure() {
        let mock = Arc::new(MockApi::new());
        mock.fail(HttpMethod::Post, "contact/", 400, "bad email");
        let dir = TempDir::new().unwrap();
        let ctx = context_with(mock, fields(), &dir);

        let params = CreateContactParams {
            name: "John".into(),
            ..Default::default()
        };
        let result = CreateContactTool::execute(&params, &JsonObject::new(), &ctx).await;
        assert_eq!(result.is_error, Some(true));
    }
}
