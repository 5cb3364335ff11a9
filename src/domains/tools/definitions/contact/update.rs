//! Idempotent contact update.
//!
//! Compares each provided value with the contact's current one and sends
//! only what differs. A new phone is appended to the existing phone list,
//! never replacing it.

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

use super::{ContactBody, mobile};
use crate::core::AppContext;
use crate::domains::custom_fields::{ExtendedSchema, RecordSnapshot, extend_post_body};
use crate::domains::planfix::client::with_query;
use crate::domains::planfix::{PlanfixError, PlanfixRequest, PlanfixResult};
use crate::domains::tools::definitions::common::{
    api_error_result, base_schema, error_result, field_names, normalize_phone, parse_arguments,
    structured_result,
};
#[cfg(feature = "http")]
use crate::domains::tools::{
    ToolError,
    definitions::common::{http_arguments, http_response},
};

#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateContactParams {
    /// Id of the contact to update.
    pub contact_id: u64,

    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub lastname: Option<String>,

    #[serde(default)]
    pub email: Option<String>,

    /// Phone to add when the contact does not have it yet.
    #[serde(default)]
    pub phone: Option<String>,

    /// Write values even when the contact already holds them.
    #[serde(default)]
    pub force_update: bool,
}

#[derive(Debug, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
struct UpdateContactResult {
    contact_id: u64,
    found: bool,
    updated: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    written: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    unchanged: Vec<String>,
}

impl UpdateContactResult {
    fn not_found(contact_id: u64) -> Self {
        Self {
            contact_id,
            found: false,
            updated: false,
            written: Vec::new(),
            unchanged: Vec::new(),
        }
    }
}

/// Scalar attributes to send, plus what was written and what was skipped.
#[derive(Debug, Default)]
struct ScalarDiff {
    body: ContactBody,
    written: Vec<String>,
    unchanged: Vec<String>,
}

impl ScalarDiff {
    fn compute(params: &UpdateContactParams, current: &RecordSnapshot) -> Self {
        let mut diff = Self::default();
        let force = params.force_update;

        diff.body.name = diff.text("name", &params.name, &current.name, force, false);
        diff.body.lastname = diff.text("lastname", &params.lastname, &current.lastname, force, false);
        diff.body.email = diff.text("email", &params.email, &current.email, force, true);

        if let Some(phone) = params.phone.as_deref().map(str::trim).filter(|p| !p.is_empty()) {
            let digits = normalize_phone(phone);
            let known = current
                .phones
                .iter()
                .any(|p| !digits.is_empty() && normalize_phone(&p.number) == digits);
            if known && !force {
                diff.unchanged.push("phone".to_string());
            } else {
                let mut phones = current.phones.clone();
                if !known {
                    phones.push(mobile(phone));
                }
                diff.body.phones = Some(phones);
                diff.written.push("phone".to_string());
            }
        }
        diff
    }

    fn text(
        &mut self,
        label: &str,
        wanted: &Option<String>,
        current: &Option<String>,
        force: bool,
        case_insensitive: bool,
    ) -> Option<String> {
        let wanted = wanted.as_deref().map(str::trim).filter(|v| !v.is_empty())?;
        let current = current.as_deref().map(str::trim).unwrap_or_default();
        let same = if case_insensitive {
            wanted.eq_ignore_ascii_case(current)
        } else {
            wanted == current
        };
        if same && !force {
            self.unchanged.push(label.to_string());
            return None;
        }
        self.written.push(label.to_string());
        Some(wanted.to_string())
    }
}

pub struct UpdateContactTool;

impl UpdateContactTool {
    pub const NAME: &'static str = "planfix_update_contact";

    pub const DESCRIPTION: &'static str = "Update a Planfix contact. Only name, lastname, email and custom fields that differ from the current values are written; a new phone is added to the existing ones. Set forceUpdate to write equal values too.";

    fn schema(ctx: &AppContext) -> ExtendedSchema {
        ctx.contact_schema.extend(&base_schema::<UpdateContactParams>())
    }

    async fn fetch_contact(ctx: &AppContext, contact_id: u64) -> PlanfixResult<RecordSnapshot> {
        let mut fields = vec![
            "id".to_string(),
            "name".to_string(),
            "lastname".to_string(),
            "email".to_string(),
            "phones".to_string(),
        ];
        fields.extend(ctx.contact_fields().iter().map(|f| f.id.to_string()));
        let fields = fields.join(",");
        let path = with_query(&format!("contact/{}", contact_id), &[("fields", fields.as_str())]);

        let response = ctx.api.request(PlanfixRequest::get(path)).await?;
        let contact = response
            .get("contact")
            .cloned()
            .ok_or_else(|| PlanfixError::invalid_response("contact payload missing"))?;
        serde_json::from_value(contact).map_err(|e| PlanfixError::invalid_response(e.to_string()))
    }

    #[instrument(skip_all, fields(contact_id = params.contact_id, force = params.force_update))]
    pub async fn execute(
        params: &UpdateContactParams,
        custom: &JsonObject,
        ctx: &AppContext,
    ) -> CallToolResult {
        let contact_id = params.contact_id;
        let current = match Self::fetch_contact(ctx, contact_id).await {
            Ok(current) => current,
            Err(e) if e.is_not_found() => {
                return structured_result(
                    format!("Contact {} not found", contact_id),
                    &UpdateContactResult::not_found(contact_id),
                );
            }
            Err(e) => return api_error_result("Loading the contact", &e),
        };

        let ScalarDiff {
            mut body,
            mut written,
            mut unchanged,
        } = ScalarDiff::compute(params, &current);

        let fields = ctx.contact_fields();
        let outcome = extend_post_body(&mut body, custom, fields, Some(&current), params.force_update);
        written.extend(field_names(fields, &outcome.written));
        unchanged.extend(field_names(fields, &outcome.unchanged));

        if !body.has_scalars() && outcome.is_empty() {
            debug!("Contact {} already up to date", contact_id);
            let result = UpdateContactResult {
                contact_id,
                found: true,
                updated: false,
                written: Vec::new(),
                unchanged,
            };
            return structured_result(format!("Contact {} unchanged", contact_id), &result);
        }

        let payload = match serde_json::to_value(&body) {
            Ok(payload) => payload,
            Err(e) => return error_result(format!("Failed to build contact payload: {}", e)),
        };
        if let Err(e) = ctx
            .api
            .request(PlanfixRequest::post(format!("contact/{}", contact_id), payload))
            .await
        {
            return api_error_result("Contact update", &e);
        }

        info!("Updated contact {}: {}", contact_id, written.join(", "));
        let result = UpdateContactResult {
            contact_id,
            found: true,
            updated: true,
            written,
            unchanged,
        };
        structured_result(format!("Contact {} updated", contact_id), &result)
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
            output_schema: Some(cached_schema_for_type::<UpdateContactResult>()),
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
                let (params, custom): (UpdateContactParams, _) =
                    parse_arguments(args, Some(schema.as_ref()))?;
                Ok::<_, McpError>(Self::execute(&params, &custom, &ctx).await)
            }
            .boxed()
        })
    }
}
