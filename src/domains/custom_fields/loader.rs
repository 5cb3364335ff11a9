//! Custom field configuration loading.
//!
//! Field lists come from two places:
//! - YAML fragments in environment variables, one per collection
//! - an optional YAML file with `leadTaskFields` and `contactFields` keys
//!
//! Both are merged per collection, keyed by field id, with file properties
//! overriding environment properties one by one. Every failure degrades to
//! "no fields from that source".

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use super::error::FieldConfigError;
use super::types::{CustomField, CustomFieldsConfig, FieldType, deserialize_field_id};

/// YAML list of lead/task fields.
pub const LEAD_TASK_FIELDS_ENV: &str = "PLANFIX_LEAD_TASK_FIELDS";

/// YAML list of contact fields.
pub const CONTACT_FIELDS_ENV: &str = "PLANFIX_CONTACT_FIELDS";

/// Path of the custom field file.
pub const CONFIG_PATH_ENV: &str = "PLANFIX_CONFIG";

/// File used when neither the CLI nor the environment names one.
pub const DEFAULT_CONFIG_PATH: &str = "config.yml";

/// Where custom field definitions are read from.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FieldSources {
    /// Raw YAML list for lead/task fields.
    pub lead_task_yaml: Option<String>,

    /// Raw YAML list for contact fields.
    pub contact_yaml: Option<String>,

    /// Resolved path of the YAML file.
    pub file: Option<PathBuf>,
}

impl FieldSources {
    /// Read the environment, resolving the file path with the CLI override
    /// taking precedence over `PLANFIX_CONFIG` and the built-in default.
    pub fn from_env(cli_path: Option<PathBuf>) -> Self {
        Self {
            lead_task_yaml: std::env::var(LEAD_TASK_FIELDS_ENV).ok(),
            contact_yaml: std::env::var(CONTACT_FIELDS_ENV).ok(),
            file: Some(resolve_config_path(
                cli_path,
                std::env::var(CONFIG_PATH_ENV).ok(),
            )),
        }
    }
}

/// Resolution order: explicit override, then environment, then default.
pub fn resolve_config_path(cli_path: Option<PathBuf>, env_path: Option<String>) -> PathBuf {
    cli_path
        .or_else(|| {
            env_path
                .filter(|p| !p.trim().is_empty())
                .map(PathBuf::from)
        })
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

// ============================================================================
// Partial Definitions
// ============================================================================

/// A field definition as written in one source; unset properties stay
/// `None` so a later source only overrides what it actually specifies.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldDefinition {
    #[serde(deserialize_with = "deserialize_field_id")]
    pub id: u64,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub arg_name: Option<String>,
    #[serde(default, rename = "type")]
    pub field_type: Option<FieldType>,
    #[serde(default)]
    pub values: Option<Vec<String>>,
    #[serde(default)]
    pub default: Option<Value>,
}

impl FieldDefinition {
    /// Overlay `other` onto `self`, property by property.
    fn overlay(&mut self, other: FieldDefinition) {
        if other.name.is_some() {
            self.name = other.name;
        }
        if other.arg_name.is_some() {
            self.arg_name = other.arg_name;
        }
        if other.field_type.is_some() {
            self.field_type = other.field_type;
        }
        if other.values.is_some() {
            self.values = other.values;
        }
        if other.default.is_some() {
            self.default = other.default;
        }
    }

    fn into_field(self) -> CustomField {
        CustomField {
            id: self.id,
            name: self.name,
            arg_name: self.arg_name.unwrap_or_default(),
            field_type: self.field_type,
            values: self.values.unwrap_or_default(),
            default: self.default,
        }
    }
}

/// Shape of the YAML config file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldsFile {
    #[serde(default)]
    pub lead_task_fields: Vec<FieldDefinition>,
    #[serde(default)]
    pub contact_fields: Vec<FieldDefinition>,
}

/// Parse a YAML list of field definitions.
pub fn parse_field_list(yaml: &str, origin: &str) -> Result<Vec<FieldDefinition>, FieldConfigError> {
    if yaml.trim().is_empty() {
        return Ok(Vec::new());
    }
    let fields: Option<Vec<FieldDefinition>> =
        serde_yaml::from_str(yaml).map_err(|e| FieldConfigError::yaml(origin, e))?;
    Ok(fields.unwrap_or_default())
}

/// Parse the contents of a config file.
pub fn parse_fields_file(yaml: &str, origin: &str) -> Result<FieldsFile, FieldConfigError> {
    if yaml.trim().is_empty() {
        return Ok(FieldsFile::default());
    }
    let file: Option<FieldsFile> =
        serde_yaml::from_str(yaml).map_err(|e| FieldConfigError::yaml(origin, e))?;
    Ok(file.unwrap_or_default())
}

/// Read and parse a config file.
pub fn read_fields_file(path: &Path) -> Result<FieldsFile, FieldConfigError> {
    let display = path.display().to_string();
    let contents = std::fs::read_to_string(path).map_err(|source| {
        if source.kind() == std::io::ErrorKind::NotFound {
            FieldConfigError::Missing(display.clone())
        } else {
            FieldConfigError::Io {
                path: display.clone(),
                source,
            }
        }
    })?;
    parse_fields_file(&contents, &display)
}

/// Union-with-override merge keyed by field id.
///
/// Ids keep the position of their first appearance; `file` definitions are
/// overlaid onto `env` definitions with the same id.
pub fn merge_fields(env: Vec<FieldDefinition>, file: Vec<FieldDefinition>) -> Vec<CustomField> {
    let mut merged: Vec<FieldDefinition> = Vec::with_capacity(env.len() + file.len());
    let mut positions: HashMap<u64, usize> = HashMap::new();

    for definition in env.into_iter().chain(file) {
        match positions.get(&definition.id) {
            Some(&index) => merged[index].overlay(definition),
            None => {
                positions.insert(definition.id, merged.len());
                merged.push(definition);
            }
        }
    }

    merged.into_iter().map(FieldDefinition::into_field).collect()
}

// ============================================================================
// Loading
// ============================================================================

impl CustomFieldsConfig {
    /// Load and merge every configured source.
    ///
    /// Never fails: unreadable or malformed sources are logged and skipped.
    pub fn load(sources: &FieldSources) -> Self {
        let env_lead = recover(
            sources
                .lead_task_yaml
                .as_deref()
                .map(|yaml| parse_field_list(yaml, LEAD_TASK_FIELDS_ENV))
                .unwrap_or_else(|| Ok(Vec::new())),
        );
        let env_contact = recover(
            sources
                .contact_yaml
                .as_deref()
                .map(|yaml| parse_field_list(yaml, CONTACT_FIELDS_ENV))
                .unwrap_or_else(|| Ok(Vec::new())),
        );
        let file = sources
            .file
            .as_deref()
            .map(|path| recover(read_fields_file(path)))
            .unwrap_or_default();

        let config = Self {
            lead_task_fields: merge_fields(env_lead, file.lead_task_fields),
            contact_fields: merge_fields(env_contact, file.contact_fields),
        };

        info!(
            "[custom-fields] Loaded {} lead/task field(s), {} contact field(s)",
            config.lead_task_fields.len(),
            config.contact_fields.len()
        );

        config
    }
}

fn recover<T: Default>(result: Result<T, FieldConfigError>) -> T {
    match result {
        Ok(value) => value,
        Err(FieldConfigError::Missing(path)) => {
            debug!("[custom-fields] No custom field file at {}", path);
            T::default()
        }
        Err(e) => {
            warn!("[custom-fields] {}; using no fields from this source", e);
            T::default()
        }
    }
}
