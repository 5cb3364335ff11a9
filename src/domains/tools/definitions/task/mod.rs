//! Task tools: search, lead task lifecycle and comments.

mod comment;
mod create_lead;
mod search;
mod search_lead;
mod update_lead;

pub use comment::{AddCommentParams, AddCommentTool};
pub use create_lead::{CreateLeadTaskParams, CreateLeadTaskTool};
pub use search::{SearchTaskParams, SearchTaskTool};
pub use search_lead::{SearchLeadTaskParams, SearchLeadTaskTool};
pub use update_lead::{UpdateLeadTaskParams, UpdateLeadTaskTool};

use schemars::JsonSchema;
use serde::Serialize;
use serde_json::json;

use crate::core::AppContext;
use crate::domains::custom_fields::{CustomFieldDataEntry, FilterFragment, HasCustomFieldData};
use crate::domains::planfix::types::{ContactRef, IdRef, PAGE_SIZE, TaskSummary, list_from};
use crate::domains::planfix::{PlanfixError, PlanfixRequest, PlanfixResult};

/// Task as reported by the search tools.
#[derive(Debug, Clone, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TaskInfo {
    pub id: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl TaskInfo {
    fn from_summary(task: TaskSummary, ctx: &AppContext) -> Self {
        Self {
            url: ctx.config.planfix.entity_url("task", task.id),
            id: task.id,
            name: task.name,
        }
    }
}

/// Assignee list of a task payload.
#[derive(Debug, Clone, PartialEq, Serialize)]
struct Assignees {
    users: Vec<UserRef>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
struct UserRef {
    id: String,
}

impl Assignees {
    fn user(user_id: u64) -> Self {
        Self {
            users: vec![UserRef {
                id: format!("user:{}", user_id),
            }],
        }
    }
}

/// Create/update payload of `task/`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
struct TaskBody {
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    template: Option<IdRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    counterparty: Option<ContactRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    assignees: Option<Assignees>,
    #[serde(skip_serializing_if = "Option::is_none")]
    custom_field_data: Option<Vec<CustomFieldDataEntry>>,
}

impl HasCustomFieldData for TaskBody {
    fn custom_field_data_mut(&mut self) -> &mut Option<Vec<CustomFieldDataEntry>> {
        &mut self.custom_field_data
    }

    fn custom_field_data(&self) -> &[CustomFieldDataEntry] {
        self.custom_field_data.as_deref().unwrap_or_default()
    }
}

/// First page of `task/list` for the given filters.
async fn list_tasks(ctx: &AppContext, filters: &[FilterFragment]) -> PlanfixResult<Vec<TaskInfo>> {
    let body = json!({
        "offset": 0,
        "pageSize": PAGE_SIZE,
        "filters": filters,
        "fields": "id,name,status,assignees",
    });
    let response = ctx.api.request(PlanfixRequest::post("task/list", body)).await?;
    let tasks: Vec<TaskSummary> = list_from(&response, "tasks")
        .map_err(|e| PlanfixError::invalid_response(format!("task/list: {}", e)))?;
    Ok(tasks
        .into_iter()
        .map(|task| TaskInfo::from_summary(task, ctx))
        .collect())
}

/// Field ids to request alongside the task so custom values can be diffed.
fn task_fields_param(ctx: &AppContext) -> String {
    let mut fields = vec!["id".to_string(), "name".to_string()];
    fields.extend(ctx.lead_task_fields().iter().map(|f| f.id.to_string()));
    fields.join(",")
}
