//! Custom field data model.
//!
//! Field definitions come from YAML (see [`super::loader`]); payload entries
//! and record snapshots mirror the shapes Planfix uses inside
//! `customFieldData` arrays.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fmt;

// ============================================================================
// Field Definitions
// ============================================================================

/// Declared type of a custom field.
///
/// Unrecognized type names are preserved in [`FieldType::Other`] so they can
/// be reported when filter construction skips the field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum FieldType {
    String,
    Number,
    Boolean,
    Enum,
    Other(String),
}

impl From<String> for FieldType {
    fn from(value: String) -> Self {
        match value.trim().to_lowercase().as_str() {
            "string" => Self::String,
            "number" => Self::Number,
            "boolean" => Self::Boolean,
            "enum" => Self::Enum,
            _ => Self::Other(value),
        }
    }
}

impl From<FieldType> for String {
    fn from(value: FieldType) -> Self {
        value.to_string()
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String => f.write_str("string"),
            Self::Number => f.write_str("number"),
            Self::Boolean => f.write_str("boolean"),
            Self::Enum => f.write_str("enum"),
            Self::Other(name) => f.write_str(name),
        }
    }
}

/// A single custom field definition after env/file merging.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomField {
    /// Planfix field id.
    pub id: u64,

    /// Human-readable label, informational only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Argument key used by tools. Empty means the field is ignored.
    pub arg_name: String,

    /// Declared type, `None` when the definition omits it.
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub field_type: Option<FieldType>,

    /// Permitted values for `enum` fields.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub values: Vec<String>,

    /// Fallback used when the caller does not supply a value.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
}

impl CustomField {
    /// Create a field with the given id, argument name and type.
    pub fn new(id: u64, arg_name: impl Into<String>, field_type: Option<FieldType>) -> Self {
        Self {
            id,
            name: None,
            arg_name: arg_name.into(),
            field_type,
            values: Vec::new(),
            default: None,
        }
    }

    /// Set the permitted enum values.
    pub fn with_values<I, V>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<String>,
    {
        self.values = values.into_iter().map(Into::into).collect();
        self
    }

    /// Set the default value.
    pub fn with_default(mut self, default: impl Into<Value>) -> Self {
        self.default = Some(default.into());
        self
    }

    /// Whether the field can be addressed from tool arguments at all.
    pub fn is_addressable(&self) -> bool {
        !self.arg_name.trim().is_empty()
    }

    pub fn is_enum(&self) -> bool {
        matches!(self.field_type, Some(FieldType::Enum))
    }
}

/// The two independently merged field collections.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomFieldsConfig {
    pub lead_task_fields: Vec<CustomField>,
    pub contact_fields: Vec<CustomField>,
}

impl CustomFieldsConfig {
    pub fn is_empty(&self) -> bool {
        self.lead_task_fields.is_empty() && self.contact_fields.is_empty()
    }
}

/// Accepts `id: 123` as well as `id: "123"`.
pub(crate) fn deserialize_field_id<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Number(u64),
        Text(String),
    }

    match RawId::deserialize(deserializer)? {
        RawId::Number(id) => Ok(id),
        RawId::Text(text) => text
            .trim()
            .parse()
            .map_err(|_| serde::de::Error::custom(format!("invalid field id: {text:?}"))),
    }
}

// ============================================================================
// Payload Entries
// ============================================================================

/// Reference to a field by id, as Planfix expects it inside payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldRef {
    pub id: u64,
}

/// Value of a `customFieldData` entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CustomFieldValue {
    /// Reference to a directory entry.
    DirectoryRef { id: u64 },
    /// Literal value written as-is.
    Scalar(Value),
}

impl CustomFieldValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Scalar(Value::String(text)) => Some(text),
            _ => None,
        }
    }
}

/// One `{field: {id}, value}` entry of an outbound payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomFieldDataEntry {
    pub field: FieldRef,
    pub value: CustomFieldValue,
}

impl CustomFieldDataEntry {
    pub fn scalar(field_id: u64, value: Value) -> Self {
        Self {
            field: FieldRef { id: field_id },
            value: CustomFieldValue::Scalar(value),
        }
    }

    pub fn directory_ref(field_id: u64, entry_id: u64) -> Self {
        Self {
            field: FieldRef { id: field_id },
            value: CustomFieldValue::DirectoryRef { id: entry_id },
        }
    }
}

/// Any outbound payload that carries a `customFieldData` array.
pub trait HasCustomFieldData {
    /// The payload's entry list; `None` until the first entry is added.
    fn custom_field_data_mut(&mut self) -> &mut Option<Vec<CustomFieldDataEntry>>;

    fn custom_field_data(&self) -> &[CustomFieldDataEntry];
}

/// Payload consisting of custom field data only.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomFieldBody {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_field_data: Option<Vec<CustomFieldDataEntry>>,
}

impl HasCustomFieldData for CustomFieldBody {
    fn custom_field_data_mut(&mut self) -> &mut Option<Vec<CustomFieldDataEntry>> {
        &mut self.custom_field_data
    }

    fn custom_field_data(&self) -> &[CustomFieldDataEntry] {
        self.custom_field_data.as_deref().unwrap_or_default()
    }
}

// ============================================================================
// Remote Record Snapshot
// ============================================================================

/// Phone entry of a Planfix contact.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PhoneEntry {
    #[serde(default)]
    pub number: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub phone_type: Option<u32>,
}

/// Existing `customFieldData` entry of a fetched record.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SnapshotEntry {
    pub field: FieldRef,
    #[serde(default)]
    pub value: Value,
}

/// The parts of a fetched task or contact consulted before writing.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordSnapshot {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub lastname: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phones: Vec<PhoneEntry>,
    #[serde(default)]
    pub custom_field_data: Vec<SnapshotEntry>,
}

impl RecordSnapshot {
    /// Current value of a custom field, if the record carries one.
    pub fn custom_value(&self, field_id: u64) -> Option<&Value> {
        self.custom_field_data
            .iter()
            .find(|entry| entry.field.id == field_id)
            .map(|entry| &entry.value)
    }
}

/// Absence rule shared by filter and payload building: missing, `null` and
/// `""` count as "no value"; `0` and `false` do not.
pub fn is_present(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::String(text)) => !text.is_empty(),
        Some(_) => true,
    }
}
