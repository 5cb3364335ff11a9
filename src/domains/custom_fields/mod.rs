//! Custom fields domain.
//!
//! Planfix tasks and contacts carry account-specific custom fields. This
//! module turns a declarative YAML description of those fields into:
//!
//! - extra optional tool arguments (`schema`)
//! - filters for list endpoints (`filters`)
//! - `customFieldData` entries for create/update payloads (`post_body`)
//!
//! The configuration is loaded once (`loader`) and shared read-only.

mod error;
pub mod filters;
pub mod loader;
pub mod post_body;
pub mod schema;
pub mod types;

pub use error::{FieldConfigError, ValidationError};
pub use filters::{FilterFragment, FilterOperator, FilterReport, FilterTarget, build_filters};
pub use loader::FieldSources;
pub use post_body::{PostBodyOutcome, extend_post_body};
pub use schema::{ExtendedSchema, FieldKind, FieldSchema, extend_schema};
pub use types::{
    CustomField, CustomFieldBody, CustomFieldDataEntry, CustomFieldValue, CustomFieldsConfig,
    FieldType, HasCustomFieldData, PhoneEntry, RecordSnapshot,
};
