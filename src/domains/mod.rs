//! Domains module containing business logic organized by bounded contexts.

pub mod custom_fields;
pub mod planfix;
pub mod tools;
