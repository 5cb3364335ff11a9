//! Custom field error types.

use thiserror::Error;

/// Errors raised while reading a custom field source.
///
/// The loader recovers from every variant by treating the source as empty;
/// the type exists so the recovery is visible to callers and tests.
#[derive(Debug, Error)]
pub enum FieldConfigError {
    /// The config file does not exist.
    #[error("Custom field file not found: {0}")]
    Missing(String),

    /// The config file exists but could not be read.
    #[error("Failed to read custom field file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The YAML does not match the expected shape.
    #[error("Invalid custom field YAML in {origin}: {source}")]
    Yaml {
        origin: String,
        #[source]
        source: serde_yaml::Error,
    },
}

impl FieldConfigError {
    pub fn yaml(origin: impl Into<String>, source: serde_yaml::Error) -> Self {
        Self::Yaml {
            origin: origin.into(),
            source,
        }
    }
}

/// Rejection of a custom argument value by an extended schema.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("Argument '{arg}' must be a number, got {got}")]
    NotANumber { arg: String, got: String },

    #[error("Argument '{arg}' must be a string, got {got}")]
    NotAString { arg: String, got: String },

    #[error("Argument '{arg}' must be one of: {}; got {got}", .allowed.join(", "))]
    NotAllowed {
        arg: String,
        allowed: Vec<String>,
        got: String,
    },
}

impl ValidationError {
    /// Name of the offending argument.
    pub fn arg(&self) -> &str {
        match self {
            Self::NotANumber { arg, .. } | Self::NotAString { arg, .. } | Self::NotAllowed { arg, .. } => {
                arg
            }
        }
    }
}
