use serde::{Deserialize, Serialize};

use std::fmt;
use std::str::FromStr;

use crate::sync::Entity;

/// The only statuses a task can hold.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    #[default]
    ToDo,
    InProgress,
    Done,
    Partial,
    Issue,
    Planned,
    OnHold,
    Cancelled,
}

impl TaskStatus {
    pub const ALL: [TaskStatus; 8] = [
        TaskStatus::ToDo,
        TaskStatus::InProgress,
        TaskStatus::Done,
        TaskStatus::Partial,
        TaskStatus::Issue,
        TaskStatus::Planned,
        TaskStatus::OnHold,
        TaskStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::ToDo => "TO_DO",
            TaskStatus::InProgress => "IN_PROGRESS",
            TaskStatus::Done => "DONE",
            TaskStatus::Partial => "PARTIAL",
            TaskStatus::Issue => "ISSUE",
            TaskStatus::Planned => "PLANNED",
            TaskStatus::OnHold => "ON_HOLD",
            TaskStatus::Cancelled => "CANCELLED",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<TaskStatus, String> {
        TaskStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| format!("Unknown task status: {}", s))
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Task {
    pub id: String,
    pub user_id: Option<String>,
    pub text: String,
    pub status: TaskStatus,
    pub project_scope_id: Option<String>,
    pub source_diary_action_item_id: Option<String>,
    pub notes: Option<String>,
    pub due_date: Option<String>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
}

impl Entity for Task {
    fn id(&self) -> &str {
        &self.id
    }
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct NewTask {
    pub user_id: String,
    pub text: String,
    pub status: TaskStatus,
    pub project_scope_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_diary_action_item_id: Option<String>,
}

/// A user-defined grouping for tasks. Scopes named after a client project
/// stand for that project.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ProjectScope {
    pub id: String,
    pub user_id: Option<String>,
    pub name: String,
    pub description: Option<String>,
    pub scope_type: Option<String>,
}

impl Entity for ProjectScope {
    fn id(&self) -> &str {
        &self.id
    }
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct NewProjectScope {
    pub user_id: String,
    pub name: String,
}

/// One entry of the scope dropdown.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ScopeOption {
    pub label: String,
    /// The scope id.
    pub value: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn statuses_use_their_wire_names() {
        for status in TaskStatus::ALL {
            assert_eq!(serde_json::to_value(status).unwrap(), json!(status.as_str()));
            assert_eq!(status.as_str().parse::<TaskStatus>(), Ok(status));
        }
        assert!("DOING".parse::<TaskStatus>().is_err());
        assert!(serde_json::from_value::<TaskStatus>(json!("to_do")).is_err());
    }
}
