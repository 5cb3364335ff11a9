//! Contact tools: search, create and idempotent update.

mod create;
mod search;
mod update;

pub use create::{CreateContactParams, CreateContactTool};
pub use search::{SearchContactParams, SearchContactTool};
pub use update::{UpdateContactParams, UpdateContactTool};

use schemars::JsonSchema;
use serde::Serialize;

use crate::core::AppContext;
use crate::domains::custom_fields::{CustomFieldDataEntry, HasCustomFieldData, PhoneEntry};
use crate::domains::planfix::types::ContactSummary;

/// Planfix phone type for mobile numbers.
const MOBILE_PHONE: u32 = 1;

/// Contact as reported by the contact tools.
#[derive(Debug, Clone, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ContactInfo {
    pub id: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lastname: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl ContactInfo {
    fn from_summary(contact: ContactSummary, ctx: &AppContext) -> Self {
        Self {
            url: ctx.config.planfix.entity_url("contact", contact.id),
            id: contact.id,
            name: contact.name,
            lastname: contact.lastname,
            email: contact.email,
        }
    }
}

/// Create/update payload of `contact/`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
struct ContactBody {
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    lastname: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    phones: Option<Vec<PhoneEntry>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    telegram: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    custom_field_data: Option<Vec<CustomFieldDataEntry>>,
}

impl ContactBody {
    /// Whether anything besides custom fields is set.
    fn has_scalars(&self) -> bool {
        self.name.is_some()
            || self.lastname.is_some()
            || self.email.is_some()
            || self.phones.is_some()
            || self.telegram.is_some()
    }
}

impl HasCustomFieldData for ContactBody {
    fn custom_field_data_mut(&mut self) -> &mut Option<Vec<CustomFieldDataEntry>> {
        &mut self.custom_field_data
    }

    fn custom_field_data(&self) -> &[CustomFieldDataEntry] {
        self.custom_field_data.as_deref().unwrap_or_default()
    }
}

fn mobile(number: &str) -> PhoneEntry {
    PhoneEntry {
        number: number.trim().to_string(),
        phone_type: Some(MOBILE_PHONE),
    }
}

/// Telegram handles are stored without the leading `@`.
fn telegram_handle(raw: &str) -> String {
    raw.trim().trim_start_matches('@').to_string()
}
