//! Filter construction for custom fields.
//!
//! Planfix list endpoints take an array of filters, each naming a filter
//! type code, an optional field id, an operator and a value. Custom field
//! filters use a type code that depends on the entity being searched.

use rmcp::model::JsonObject;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use super::types::{CustomField, FieldType, is_present};

/// Entity whose list endpoint receives the filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterTarget {
    Task,
    Contact,
    User,
}

impl FilterTarget {
    /// Filter type code for custom fields of the given type on this entity.
    ///
    /// `None` for unknown or missing field types.
    pub fn custom_field_type_code(self, field_type: Option<&FieldType>) -> Option<u32> {
        let known = matches!(
            field_type,
            Some(FieldType::String | FieldType::Number | FieldType::Boolean | FieldType::Enum)
        );
        if !known {
            return None;
        }
        Some(match self {
            Self::Task => 107,
            Self::Contact => 4101,
            Self::User => 9111,
        })
    }
}

/// Comparison operator understood by Planfix filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterOperator {
    Equal,
    NotEqual,
    Have,
    NotHave,
    Gt,
    Lt,
}

/// One entry of a `filters` array.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterFragment {
    #[serde(rename = "type")]
    pub filter_type: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<u64>,
    pub operator: FilterOperator,
    pub value: Value,
}

impl FilterFragment {
    pub fn new(filter_type: u32, operator: FilterOperator, value: impl Into<Value>) -> Self {
        Self {
            filter_type,
            field: None,
            operator,
            value: value.into(),
        }
    }

    pub fn equal(filter_type: u32, value: impl Into<Value>) -> Self {
        Self::new(filter_type, FilterOperator::Equal, value)
    }

    pub fn with_field(mut self, field_id: u64) -> Self {
        self.field = Some(field_id);
        self
    }
}

/// A field left out because its type has no filter code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedField {
    pub id: u64,
    pub field_type: Option<String>,
}

/// What [`build_filters`] did besides appending.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterReport {
    /// Number of fragments appended.
    pub appended: usize,
    /// Fields skipped for an unknown or missing type.
    pub unknown_types: Vec<SkippedField>,
}

/// Append one filter per custom field with a value in `args`.
///
/// Existing entries in `filters` are left untouched. Fields without an
/// argument name are ignored; fields with an unknown type are logged and
/// reported; absent values (missing, `null`, `""`) produce nothing.
pub fn build_filters(
    filters: &mut Vec<FilterFragment>,
    args: &JsonObject,
    fields: &[CustomField],
    target: FilterTarget,
) -> FilterReport {
    let mut report = FilterReport::default();

    for field in fields.iter().filter(|f| f.is_addressable()) {
        let Some(code) = target.custom_field_type_code(field.field_type.as_ref()) else {
            let type_name = field.field_type.as_ref().map(|t| t.to_string());
            warn!(
                "[custom-fields] No {:?} filter for field {} with type {}",
                target,
                field.id,
                type_name.as_deref().unwrap_or("<unset>")
            );
            report.unknown_types.push(SkippedField {
                id: field.id,
                field_type: type_name,
            });
            continue;
        };

        let Some(value) = args.get(&field.arg_name).filter(|v| is_present(Some(*v))) else {
            continue;
        };

        filters.push(FilterFragment::equal(code, value.clone()).with_field(field.id));
        report.appended += 1;
    }

    report
}
