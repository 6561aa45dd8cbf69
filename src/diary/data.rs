use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::gateway::GatewayError;
use crate::sync::Entity;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ActionItem {
    pub id: String,
    pub diary_entry_id: String,
    pub user_id: String,
    pub text: String,
    #[serde(default)]
    pub is_completed: bool,
    pub order_val: Option<i64>,
    pub sent_to_wip_at: Option<String>,
    /// The task created from this item. Once set the item cannot be sent
    /// again.
    pub wip_task_id: Option<String>,
    pub created_at: Option<String>,
}

impl ActionItem {
    pub fn is_sent(&self) -> bool {
        self.wip_task_id.is_some() || self.sent_to_wip_at.is_some()
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct DiaryEntry {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub summary: String,
    pub entry_timestamp: Option<String>,
    pub created_at: Option<String>,
    #[serde(default)]
    pub diary_action_items: Vec<ActionItem>,
}

impl Entity for DiaryEntry {
    fn id(&self) -> &str {
        &self.id
    }
}

impl DiaryEntry {
    pub fn item_mut(&mut self, item_id: &str) -> Option<&mut ActionItem> {
        self.diary_action_items.iter_mut().find(|i| i.id == item_id)
    }
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct NewDiaryEntry {
    pub user_id: String,
    pub title: String,
    pub summary: String,
    pub entry_timestamp: String,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct NewActionItem {
    pub diary_entry_id: String,
    pub user_id: String,
    pub text: String,
    pub is_completed: bool,
    pub order_val: i64,
    pub sent_to_wip_at: Option<String>,
    pub wip_task_id: Option<String>,
}

/// Body of `POST /api/v1/diary/entries`. Non-string action items are
/// ignored.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct CreateEntryRequest {
    pub title: String,
    pub summary: String,
    pub action_items: Vec<Value>,
}

impl CreateEntryRequest {
    pub fn action_item_texts(&self) -> Vec<String> {
        self.action_items
            .iter()
            .filter_map(Value::as_str)
            .map(String::from)
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum DiaryError {
    #[error("{0}")]
    Validation(String),
    /// The entry was saved; its action items were not.
    #[error("Failed to insert action items: {source}. Main entry ID: {entry_id}")]
    ActionItemsFailed {
        entry_id: String,
        source: GatewayError,
    },
    /// The task was created; the action item still looks unsent.
    #[error("Task created but failed to mark the action item as sent: {source}. Task ID: {task_id}")]
    MarkSentFailed {
        task_id: String,
        source: GatewayError,
    },
    #[error("Action item {0} has already been sent to tasks")]
    AlreadySent(String),
    #[error(transparent)]
    Gateway(#[from] GatewayError),
}
