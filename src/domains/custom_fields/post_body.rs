//! Custom field payload building for create and update requests.
//!
//! On create every field with a value is written. On update the value is
//! compared with what the record already holds and unchanged fields are
//! skipped unless the caller forces the write.

use rmcp::model::JsonObject;
use serde_json::Value;
use std::collections::BTreeSet;
use tracing::debug;

use super::types::{
    CustomField, CustomFieldDataEntry, FieldType, HasCustomFieldData, RecordSnapshot, is_present,
};

/// Which fields were written and which were left alone as unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PostBodyOutcome {
    pub written: Vec<u64>,
    pub unchanged: Vec<u64>,
}

impl PostBodyOutcome {
    pub fn is_empty(&self) -> bool {
        self.written.is_empty()
    }
}

/// Append `customFieldData` entries for `fields` to `body`.
///
/// The candidate value of a field is `args[argName]` when present, else its
/// `default`, else the field is skipped. With `current` (update path) a
/// candidate equal to the stored value is skipped unless `force_update`.
/// Entries already in `body` are never touched.
pub fn extend_post_body<B>(
    body: &mut B,
    args: &JsonObject,
    fields: &[CustomField],
    current: Option<&RecordSnapshot>,
    force_update: bool,
) -> PostBodyOutcome
where
    B: HasCustomFieldData + ?Sized,
{
    let mut outcome = PostBodyOutcome::default();
    if fields.is_empty() {
        return outcome;
    }

    for field in fields.iter().filter(|f| f.is_addressable()) {
        let Some(candidate) = candidate_value(field, args) else {
            continue;
        };

        if let Some(record) = current {
            let unchanged = record
                .custom_value(field.id)
                .is_some_and(|existing| values_match(field, candidate, existing));
            if unchanged && !force_update {
                debug!(
                    "[custom-fields] Field {} ({}) unchanged, skipping",
                    field.id, field.arg_name
                );
                outcome.unchanged.push(field.id);
                continue;
            }
        }

        body.custom_field_data_mut()
            .get_or_insert_with(Vec::new)
            .push(CustomFieldDataEntry::scalar(field.id, candidate.clone()));
        outcome.written.push(field.id);
    }

    outcome
}

fn candidate_value<'a>(field: &'a CustomField, args: &'a JsonObject) -> Option<&'a Value> {
    args.get(&field.arg_name)
        .filter(|v| is_present(Some(*v)))
        .or(field.default.as_ref())
}

/// Compare a candidate with the value stored on the record.
pub fn values_match(field: &CustomField, candidate: &Value, existing: &Value) -> bool {
    let existing = normalize_existing(existing);
    let set_like = field.is_enum() || candidate.is_array() || existing.is_array();
    if set_like {
        value_set(candidate) == value_set(&existing)
    } else {
        scalars_match(field, candidate, &existing)
    }
}

/// Stored values may be `{id, value}` directory references or `{name}`
/// objects; compare against their label.
fn normalize_existing(value: &Value) -> Value {
    match value {
        Value::Object(object) => object
            .get("value")
            .or_else(|| object.get("name"))
            .map(normalize_existing)
            .unwrap_or_else(|| value.clone()),
        Value::Array(items) => Value::Array(items.iter().map(normalize_existing).collect()),
        other => other.clone(),
    }
}

fn canonical(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

fn value_set(value: &Value) -> BTreeSet<String> {
    match value {
        Value::Null => BTreeSet::new(),
        Value::Array(items) => items
            .iter()
            .filter(|item| !item.is_null())
            .map(|item| canonical(&normalize_existing(item)))
            .collect(),
        other => BTreeSet::from([canonical(other)]),
    }
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}

fn scalars_match(field: &CustomField, candidate: &Value, existing: &Value) -> bool {
    if candidate == existing {
        return true;
    }
    let numeric = matches!(field.field_type, Some(FieldType::Number))
        || candidate.is_number()
        || existing.is_number();
    if numeric {
        if let (Some(a), Some(b)) = (as_number(candidate), as_number(existing)) {
            return a == b;
        }
    }
    canonical(candidate) == canonical(existing)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domains::custom_fields::types::{CustomFieldBody, FieldRef, SnapshotEntry};
    use serde_json::json;

    fn args(value: Value) -> JsonObject {
        value.as_object().cloned().unwrap()
    }

    fn record(entries: &[(u64, Value)]) -> RecordSnapshot {
        RecordSnapshot {
            custom_field_data: entries
                .iter()
                .map(|(id, value)| SnapshotEntry {
                    field: FieldRef { id: *id },
                    value: value.clone(),
                })
                .collect(),
            ..Default::default()
        }
    }

    fn status_field() -> CustomField {
        CustomField::new(2, "status", Some(FieldType::Enum)).with_values(["one", "two"])
    }

    #[test]
    fn test_no_fields_is_noop() {
        let mut body = CustomFieldBody::default();
        let outcome = extend_post_body(&mut body, &args(json!({"x": 1})), &[], None, false);
        assert!(outcome.is_empty());
        assert_eq!(body.custom_field_data, None);
    }

    #[test]
    fn test_create_path_uses_default() {
        let fields = [CustomField::new(1, "name", Some(FieldType::String)).with_default("B")];
        let mut body = CustomFieldBody::default();
        extend_post_body(&mut body, &args(json!({})), &fields, None, false);

        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            json!({"customFieldData": [{"field": {"id": 1}, "value": "B"}]})
        );
    }

    #[test]
    fn test_empty_string_falls_back_to_default() {
        let fields = [CustomField::new(1, "name", Some(FieldType::String)).with_default("B")];
        let mut body = CustomFieldBody::default();
        extend_post_body(&mut body, &args(json!({"name": ""})), &fields, None, false);

        assert_eq!(body.custom_field_data()[0].value.as_str(), Some("B"));
    }

    #[test]
    fn test_no_value_no_default_is_skipped() {
        let fields = [CustomField::new(1, "name", Some(FieldType::String))];
        let mut body = CustomFieldBody::default();
        let outcome = extend_post_body(&mut body, &args(json!({"name": null})), &fields, None, false);

        assert!(outcome.is_empty());
        assert_eq!(body.custom_field_data, None);
    }

    #[test]
    fn test_update_skips_unchanged_enum() {
        let fields = [status_field()];
        let current = record(&[(2, json!(["one"]))]);
        let mut body = CustomFieldBody::default();
        let outcome = extend_post_body(
            &mut body,
            &args(json!({"status": "one"})),
            &fields,
            Some(&current),
            false,
        );

        assert_eq!(body.custom_field_data, None);
        assert_eq!(outcome.unchanged, vec![2]);
    }

    #[test]
    fn test_force_update_writes_unchanged_enum() {
        let fields = [status_field()];
        let current = record(&[(2, json!(["one"]))]);
        let mut body = CustomFieldBody::default();
        extend_post_body(
            &mut body,
            &args(json!({"status": "one"})),
            &fields,
            Some(&current),
            true,
        );

        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            json!({"customFieldData": [{"field": {"id": 2}, "value": "one"}]})
        );
    }

    #[test]
    fn test_update_writes_changed_value() {
        let fields = [status_field()];
        let current = record(&[(2, json!(["one"]))]);
        let mut body = CustomFieldBody::default();
        let outcome = extend_post_body(
            &mut body,
            &args(json!({"status": "two"})),
            &fields,
            Some(&current),
            false,
        );

        assert_eq!(outcome.written, vec![2]);
    }

    #[test]
    fn test_update_writes_field_missing_on_record() {
        let fields = [CustomField::new(9, "note", Some(FieldType::String))];
        let current = record(&[]);
        let mut body = CustomFieldBody::default();
        let outcome = extend_post_body(
            &mut body,
            &args(json!({"note": "hi"})),
            &fields,
            Some(&current),
            false,
        );

        assert_eq!(outcome.written, vec![9]);
    }

    #[test]
    fn test_existing_entries_are_preserved() {
        let fields = [CustomField::new(1, "a", Some(FieldType::String))];
        let mut body = CustomFieldBody {
            custom_field_data: Some(vec![CustomFieldDataEntry::scalar(99, json!("keep"))]),
        };
        extend_post_body(&mut body, &args(json!({"a": "x", "other": "y"})), &fields, None, false);

        let data = body.custom_field_data();
        assert_eq!(data.len(), 2);
        assert_eq!(data[0], CustomFieldDataEntry::scalar(99, json!("keep")));
        assert_eq!(data[1], CustomFieldDataEntry::scalar(1, json!("x")));
    }

    #[test]
    fn test_empty_arg_name_never_written() {
        let fields = [CustomField::new(1, "", Some(FieldType::String)).with_default("B")];
        let mut body = CustomFieldBody::default();
        let outcome = extend_post_body(&mut body, &args(json!({"": "x"})), &fields, None, false);

        assert!(outcome.is_empty());
        assert_eq!(body.custom_field_data, None);
    }

    #[test]
    fn test_set_comparison_ignores_order_and_duplicates() {
        let field = status_field();
        assert!(values_match(&field, &json!(["two", "one"]), &json!(["one", "two", "one"])));
        assert!(!values_match(&field, &json!(["one"]), &json!(["one", "two"])));
    }

    #[test]
    fn test_directory_value_compared_by_label() {
        let field = status_field();
        assert!(values_match(&field, &json!("one"), &json!({"id": 12, "value": "one"})));
        assert!(values_match(&field, &json!("one"), &json!([{"id": 12, "value": "one"}])));
    }

    #[test]
    fn test_scalar_comparison() {
        let number = CustomField::new(3, "budget", Some(FieldType::Number));
        assert!(values_match(&number, &json!(5), &json!("5")));
        assert!(values_match(&number, &json!(5), &json!(5.0)));
        assert!(!values_match(&number, &json!(5), &json!(6)));

        let text = CustomField::new(4, "code", Some(FieldType::String));
        assert!(values_match(&text, &json!("abc"), &json!("abc")));
        assert!(!values_match(&text, &json!("05"), &json!("5")));
    }
}
