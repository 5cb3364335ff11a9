//! Schema extension for custom fields.
//!
//! A [`FieldSchema`] is the per-collection map from argument name to
//! [`FieldKind`]. It is derived once when the configuration is loaded and
//! then layered onto each tool's base input schema, producing an
//! [`ExtendedSchema`] that both advertises the extra properties and
//! validates them.

use rmcp::model::JsonObject;
use serde_json::{Map, Number, Value, json};
use std::collections::BTreeMap;
use tracing::warn;

use super::error::ValidationError;
use super::types::{CustomField, FieldType};

/// Shape of a derived property.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldKind {
    String,
    Number,
    Enum(Vec<String>),
}

impl FieldKind {
    /// Kind for a field definition. Enums without values and unknown or
    /// missing types fall back to free-form strings.
    pub fn for_field(field: &CustomField) -> Self {
        match &field.field_type {
            Some(FieldType::Number) => Self::Number,
            Some(FieldType::Enum) if !field.values.is_empty() => Self::Enum(field.values.clone()),
            _ => Self::String,
        }
    }

    fn json_schema(&self, description: Option<&str>) -> Value {
        let mut schema = match self {
            Self::String => json!({ "type": "string" }),
            Self::Number => json!({ "type": "number" }),
            Self::Enum(values) => json!({ "type": "string", "enum": values }),
        };
        if let (Some(description), Some(object)) = (description, schema.as_object_mut()) {
            object.insert("description".to_string(), Value::String(description.to_string()));
        }
        schema
    }

    /// Check one present value, returning the coerced value.
    fn validate(&self, arg: &str, value: &Value) -> Result<Value, ValidationError> {
        match self {
            Self::Number => match value {
                Value::Number(_) => Ok(value.clone()),
                Value::String(text) if text.is_empty() => Ok(value.clone()),
                Value::String(text) => parse_number(text).ok_or_else(|| ValidationError::NotANumber {
                    arg: arg.to_string(),
                    got: value.to_string(),
                }),
                other => Err(ValidationError::NotANumber {
                    arg: arg.to_string(),
                    got: other.to_string(),
                }),
            },
            Self::String => match value {
                Value::String(_) => Ok(value.clone()),
                Value::Number(n) => Ok(Value::String(n.to_string())),
                Value::Bool(b) => Ok(Value::String(b.to_string())),
                other => Err(ValidationError::NotAString {
                    arg: arg.to_string(),
                    got: other.to_string(),
                }),
            },
            Self::Enum(values) => match value {
                Value::String(text) if values.iter().any(|v| v == text) => Ok(value.clone()),
                other => Err(ValidationError::NotAllowed {
                    arg: arg.to_string(),
                    allowed: values.clone(),
                    got: other.to_string(),
                }),
            },
        }
    }
}

fn parse_number(text: &str) -> Option<Value> {
    let trimmed = text.trim();
    if let Ok(int) = trimmed.parse::<i64>() {
        return Some(Value::Number(int.into()));
    }
    trimmed
        .parse::<f64>()
        .ok()
        .and_then(Number::from_f64)
        .map(Value::Number)
}

#[derive(Debug, Clone, PartialEq)]
struct FieldProperty {
    kind: FieldKind,
    description: Option<String>,
}

/// Argument name → kind map for one field collection.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldSchema {
    properties: BTreeMap<String, FieldProperty>,
}

impl FieldSchema {
    /// Derive the property map. Fields without an argument name are left out.
    pub fn from_fields(fields: &[CustomField]) -> Self {
        let mut properties = BTreeMap::new();
        for field in fields.iter().filter(|f| f.is_addressable()) {
            let property = FieldProperty {
                kind: FieldKind::for_field(field),
                description: field.name.clone(),
            };
            if properties.insert(field.arg_name.clone(), property).is_some() {
                warn!(
                    "[custom-fields] Duplicate argName '{}' (field {}), last definition wins",
                    field.arg_name, field.id
                );
            }
        }
        Self { properties }
    }

    pub fn len(&self) -> usize {
        self.properties.len()
    }

    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }

    pub fn kind(&self, arg_name: &str) -> Option<&FieldKind> {
        self.properties.get(arg_name).map(|p| &p.kind)
    }

    /// Layer the derived properties onto `base`.
    ///
    /// `base` is not modified. Properties already present in the base keep
    /// their definition and the colliding custom field is dropped.
    pub fn extend(&self, base: &JsonObject) -> ExtendedSchema {
        let mut schema = base.clone();
        let mut accepted = BTreeMap::new();

        let properties = schema
            .entry("properties")
            .or_insert_with(|| Value::Object(Map::new()));
        if !properties.is_object() {
            *properties = Value::Object(Map::new());
        }

        if let Value::Object(properties) = properties {
            for (arg_name, property) in &self.properties {
                if properties.contains_key(arg_name) {
                    warn!(
                        "[custom-fields] argName '{}' collides with a built-in argument, skipping",
                        arg_name
                    );
                    continue;
                }
                properties.insert(
                    arg_name.clone(),
                    property.kind.json_schema(property.description.as_deref()),
                );
                accepted.insert(arg_name.clone(), property.clone());
            }
        }

        schema
            .entry("type")
            .or_insert_with(|| Value::String("object".to_string()));

        ExtendedSchema {
            schema,
            custom: FieldSchema {
                properties: accepted,
            },
        }
    }
}

/// Base schema plus derived custom field properties.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtendedSchema {
    schema: JsonObject,
    custom: FieldSchema,
}

impl ExtendedSchema {
    /// The complete JSON schema advertised to clients.
    pub fn schema(&self) -> &JsonObject {
        &self.schema
    }

    /// Only the properties contributed by custom fields.
    pub fn custom(&self) -> &FieldSchema {
        &self.custom
    }

    /// Validate the custom arguments found in `args`.
    ///
    /// Returns the coerced custom arguments keyed by argument name; absent
    /// and `null` arguments are omitted. Built-in arguments are ignored here
    /// since they are checked by deserializing the tool's parameter type.
    pub fn validate(&self, args: &JsonObject) -> Result<JsonObject, ValidationError> {
        let mut validated = JsonObject::new();
        for (arg_name, property) in &self.custom.properties {
            match args.get(arg_name) {
                None | Some(Value::Null) => {}
                Some(value) => {
                    let value = property.kind.validate(arg_name, value)?;
                    validated.insert(arg_name.clone(), value);
                }
            }
        }
        Ok(validated)
    }
}

/// Extend `base` with properties for `fields`.
pub fn extend_schema(base: &JsonObject, fields: &[CustomField]) -> ExtendedSchema {
    FieldSchema::from_fields(fields).extend(base)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_schema() -> JsonObject {
        json!({
            "type": "object",
            "properties": {
                "name": { "type": "string" }
            },
            "required": ["name"]
        })
        .as_object()
        .cloned()
        .unwrap()
    }

    fn args(value: Value) -> JsonObject {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_field_kinds() {
        assert_eq!(
            FieldKind::for_field(&CustomField::new(1, "n", Some(FieldType::Number))),
            FieldKind::Number
        );
        assert_eq!(
            FieldKind::for_field(
                &CustomField::new(2, "s", Some(FieldType::Enum)).with_values(["one", "two"])
            ),
            FieldKind::Enum(vec!["one".to_string(), "two".to_string()])
        );
        assert_eq!(
            FieldKind::for_field(&CustomField::new(3, "e", Some(FieldType::Enum))),
            FieldKind::String
        );
        assert_eq!(
            FieldKind::for_field(&CustomField::new(4, "b", Some(FieldType::Boolean))),
            FieldKind::String
        );
        assert_eq!(
            FieldKind::for_field(&CustomField::new(5, "u", None)),
            FieldKind::String
        );
    }

    #[test]
    fn test_enum_accepts_listed_value_only() {
        let fields = [CustomField::new(2, "status", Some(FieldType::Enum)).with_values(["one", "two"])];
        let schema = extend_schema(&base_schema(), &fields);

        let ok = schema.validate(&args(json!({"status": "one"}))).unwrap();
        assert_eq!(ok.get("status"), Some(&json!("one")));

        let err = schema.validate(&args(json!({"status": "three"}))).unwrap_err();
        assert_eq!(err.arg(), "status");
        assert!(matches!(err, ValidationError::NotAllowed { .. }));
    }

    #[test]
    fn test_extend_adds_optional_properties_without_touching_base() {
        let base = base_schema();
        let fields = [
            CustomField::new(1, "budget", Some(FieldType::Number)),
            CustomField::new(2, "status", Some(FieldType::Enum)).with_values(["one"]),
        ];
        let extended = extend_schema(&base, &fields);
        let schema = extended.schema();

        let properties = schema["properties"].as_object().unwrap();
        assert_eq!(properties["name"], json!({"type": "string"}));
        assert_eq!(properties["budget"], json!({"type": "number"}));
        assert_eq!(properties["status"], json!({"type": "string", "enum": ["one"]}));
        assert_eq!(schema["required"], json!(["name"]));

        assert_eq!(base, base_schema());
    }

    #[test]
    fn test_empty_arg_name_never_becomes_a_property() {
        let fields = [
            CustomField::new(1, "", Some(FieldType::Enum)).with_values(["x"]),
            CustomField::new(2, "   ", Some(FieldType::Number)),
        ];
        let extended = extend_schema(&base_schema(), &fields);
        let properties = extended.schema()["properties"].as_object().unwrap();

        assert_eq!(properties.len(), 1);
        assert!(!properties.contains_key(""));
        assert!(extended.custom().is_empty());
    }

    #[test]
    fn test_extension_is_deterministic() {
        let fields = [CustomField::new(1, "budget", Some(FieldType::Number))];
        assert_eq!(
            extend_schema(&base_schema(), &fields),
            extend_schema(&base_schema(), &fields)
        );
    }

    #[test]
    fn test_base_property_wins_on_collision() {
        let fields = [CustomField::new(1, "name", Some(FieldType::Number))];
        let extended = extend_schema(&base_schema(), &fields);

        assert_eq!(extended.schema()["properties"]["name"], json!({"type": "string"}));
        assert!(extended.custom().kind("name").is_none());
    }

    #[test]
    fn test_number_coercion() {
        let fields = [CustomField::new(1, "budget", Some(FieldType::Number))];
        let schema = extend_schema(&base_schema(), &fields);

        let validated = schema.validate(&args(json!({"budget": "42"}))).unwrap();
        assert_eq!(validated["budget"], json!(42));

        let validated = schema.validate(&args(json!({"budget": 0}))).unwrap();
        assert_eq!(validated["budget"], json!(0));

        assert!(matches!(
            schema.validate(&args(json!({"budget": "lots"}))),
            Err(ValidationError::NotANumber { .. })
        ));
    }

    #[test]
    fn test_absent_and_null_are_skipped() {
        let fields = [CustomField::new(1, "tag", Some(FieldType::String))];
        let schema = extend_schema(&base_schema(), &fields);

        assert!(schema.validate(&args(json!({}))).unwrap().is_empty());
        assert!(schema.validate(&args(json!({"tag": null}))).unwrap().is_empty());
        assert!(matches!(
            schema.validate(&args(json!({"tag": ["a"]}))),
            Err(ValidationError::NotAString { .. })
        ));
    }

    #[test]
    fn test_description_from_field_name() {
        let mut field = CustomField::new(1, "source", Some(FieldType::String));
        field.name = Some("Lead source".to_string());
        let extended = extend_schema(&base_schema(), &[field]);

        assert_eq!(
            extended.schema()["properties"]["source"]["description"],
            json!("Lead source")
        );
    }
}
