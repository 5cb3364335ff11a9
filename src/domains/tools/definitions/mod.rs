//! Tool definitions.
//!
//! Each tool lives in its own file. Task and contact tools carry the
//! configured custom fields as extra arguments.

pub mod common;
pub mod contact;
pub mod directory;
pub mod manager;
pub mod reports;
pub mod request;
pub mod task;

pub use contact::{CreateContactTool, SearchContactTool, UpdateContactTool};
pub use directory::{SearchDirectoryEntryTool, SearchDirectoryTool};
pub use manager::{SearchManagerParams, SearchManagerTool};
pub use reports::{ListReportsParams, ListReportsTool};
pub use request::{PlanfixRequestParams, PlanfixRequestTool};
pub use task::{
    AddCommentTool, CreateLeadTaskTool, SearchLeadTaskTool, SearchTaskTool, UpdateLeadTaskTool,
};
