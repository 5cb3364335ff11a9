//! Planfix filter codes and response shapes shared by tools.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Filter type codes of the Planfix list endpoints.
pub mod filter_codes {
    /// Task title.
    pub const TASK_NAME: u32 = 8;
    /// Task created from template.
    pub const TASK_TEMPLATE: u32 = 51;
    /// Task counterparty (client contact).
    pub const TASK_COUNTERPARTY: u32 = 108;

    /// Contact full name.
    pub const CONTACT_NAME: u32 = 4001;
    /// Contact phone number.
    pub const CONTACT_PHONE: u32 = 4003;
    /// Contact email.
    pub const CONTACT_EMAIL: u32 = 4026;
    /// Contact telegram handle.
    pub const CONTACT_TELEGRAM: u32 = 4230;

    /// Employee email.
    pub const USER_EMAIL: u32 = 9026;

    /// Directory entry field value.
    pub const DIRECTORY_ENTRY_FIELD: u32 = 2701;
}

/// Default page size for list endpoints.
pub const PAGE_SIZE: u64 = 100;

/// Upper bound on pages fetched by any paginated listing.
pub const MAX_PAGES: u64 = 50;

/// `{id}` reference used throughout Planfix payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdRef {
    pub id: u64,
}

/// Contact reference; Planfix prefixes contact ids with `contact:` in some
/// payloads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactRef {
    pub id: String,
}

impl ContactRef {
    pub fn new(contact_id: u64) -> Self {
        Self {
            id: format!("contact:{}", contact_id),
        }
    }
}

/// Task summary as returned by `task/list` and `task/{id}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskSummary {
    pub id: u64,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignees: Option<Value>,
}

/// Contact summary as returned by `contact/list` and `contact/{id}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactSummary {
    pub id: u64,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub lastname: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

/// Employee summary as returned by `user/list`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    #[serde(deserialize_with = "deserialize_user_id")]
    pub id: u64,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub lastname: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

/// Planfix user ids come as `123` or `"user:123"`.
fn deserialize_user_id<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = Value::deserialize(deserializer)?;
    match &raw {
        Value::Number(n) => n.as_u64(),
        Value::String(text) => text.rsplit(':').next().and_then(|id| id.parse().ok()),
        _ => None,
    }
    .ok_or_else(|| serde::de::Error::custom(format!("invalid user id: {raw}")))
}

/// Report descriptor from `report/list`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportSummary {
    pub id: u64,
    #[serde(default)]
    pub name: Option<String>,
}

/// Pull a typed list out of `body[key]`; a missing key is an empty list.
pub fn list_from<T: serde::de::DeserializeOwned>(
    body: &Value,
    key: &str,
) -> Result<Vec<T>, serde_json::Error> {
    match body.get(key) {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(items) => serde_json::from_value(items.clone()),
    }
}
