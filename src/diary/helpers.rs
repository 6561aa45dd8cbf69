use serde_json::{json, Value};
use tracing::{error, info, warn};

use std::collections::HashMap;
use std::sync::Arc;

use crate::gateway::sqlite::timestamp;
use crate::gateway::{
    from_row, insert_record, patch, read_record, read_records, to_row, Filter, Gateway,
    GatewayError, GatewayResult, Table,
};
use crate::sync::{lock_store, snapshot, EntityStore, MutationError, OptimisticMutator, SharedStore};
use crate::tasks::data::{NewTask, Task, TaskStatus};
use crate::tasks::helpers::insert_task;

use super::data::*;

fn required(value: &str, message: &str) -> Result<String, DiaryError> {
    let value = value.trim();
    if value.is_empty() {
        Err(DiaryError::Validation(message.to_string()))
    } else {
        Ok(value.to_string())
    }
}

/// Saves an entry, then its non-blank action items in the given order.
/// If the items fail the entry stays saved and the error names it.
pub async fn create_entry(
    gateway: &dyn Gateway,
    title: &str,
    summary: &str,
    action_item_texts: &[String],
) -> Result<DiaryEntry, DiaryError> {
    let title = required(title, "Title is required")?;
    let summary = required(summary, "Summary is required")?;
    let user_id = gateway.user_id()?.to_string();

    let mut entry: DiaryEntry = insert_record(
        gateway,
        Table::DiaryEntries,
        &NewDiaryEntry {
            user_id: user_id.clone(),
            title,
            summary,
            entry_timestamp: timestamp(),
        },
    )
    .await?;

    let items = action_item_texts
        .iter()
        .map(|text| text.trim())
        .filter(|text| !text.is_empty())
        .enumerate()
        .map(|(order, text)| {
            to_row(&NewActionItem {
                diary_entry_id: entry.id.clone(),
                user_id: user_id.clone(),
                text: text.to_string(),
                is_completed: false,
                order_val: order as i64,
                sent_to_wip_at: None,
                wip_task_id: None,
            })
        })
        .collect::<GatewayResult<Vec<_>>>()?;

    if !items.is_empty() {
        let inserted = gateway
            .insert_many(Table::DiaryActionItems, items)
            .await
            .map_err(|source| {
                error!(entry_id = %entry.id, error = %source, "diary entry saved without its action items");
                DiaryError::ActionItemsFailed {
                    entry_id: entry.id.clone(),
                    source,
                }
            })?;

        entry.diary_action_items = inserted
            .into_iter()
            .map(from_row)
            .collect::<GatewayResult<_>>()?;
    }

    info!(entry_id = %entry.id, items = entry.diary_action_items.len(), "created diary entry");
    Ok(entry)
}

/// Turns an action item into a `TO_DO` task and marks the item as sent.
/// An item is sent at most once.
pub async fn send_action_item_to_tasks(
    gateway: &dyn Gateway,
    item_id: &str,
) -> Result<(ActionItem, Task), DiaryError> {
    let mut item: ActionItem =
        read_record(gateway, Table::DiaryActionItems, &Filter::new().eq("id", item_id))
            .await?
            .ok_or(GatewayError::NotFoundOrForbidden)?;
    if item.is_sent() {
        return Err(DiaryError::AlreadySent(item_id.to_string()));
    }

    let task = insert_task(
        gateway,
        &NewTask {
            user_id: gateway.user_id()?.to_string(),
            text: item.text.clone(),
            status: TaskStatus::ToDo,
            project_scope_id: None,
            source_diary_action_item_id: Some(item.id.clone()),
        },
    )
    .await?;

    let sent_at = timestamp();
    let stamped = gateway
        .update(
            Table::DiaryActionItems,
            item_id,
            patch([
                ("wip_task_id", json!(task.id)),
                ("sent_to_wip_at", json!(sent_at)),
            ]),
        )
        .await;
    if let Err(source) = stamped {
        warn!(item_id, task_id = %task.id, error = %source, "task created but item not marked as sent");
        return Err(DiaryError::MarkSentFailed {
            task_id: task.id,
            source,
        });
    }

    item.wip_task_id = Some(task.id.clone());
    item.sent_to_wip_at = Some(sent_at);
    info!(item_id, task_id = %task.id, "sent action item to tasks");
    Ok((item, task))
}

fn flip_completion(entry: &mut DiaryEntry, item_id: &str) -> bool {
    match entry.item_mut(item_id) {
        Some(item) => {
            item.is_completed = !item.is_completed;
            true
        }
        None => false,
    }
}

/// The diary page: the user's entries, newest first, each with its action
/// items in entry order.
pub struct Diary {
    gateway: Arc<dyn Gateway>,
    store: SharedStore<DiaryEntry>,
    mutator: OptimisticMutator<DiaryEntry>,
}

impl Diary {
    pub async fn load(gateway: Arc<dyn Gateway>) -> GatewayResult<Diary> {
        let owned = Filter::new().eq("user_id", gateway.user_id()?);

        let mut entries: Vec<DiaryEntry> = read_records(
            gateway.as_ref(),
            Table::DiaryEntries,
            &owned.clone().order_desc("entry_timestamp"),
        )
        .await?;
        let items: Vec<ActionItem> = read_records(
            gateway.as_ref(),
            Table::DiaryActionItems,
            &owned.order_asc("order_val"),
        )
        .await?;

        let mut by_entry: HashMap<String, Vec<ActionItem>> = HashMap::new();
        for item in items {
            by_entry
                .entry(item.diary_entry_id.clone())
                .or_default()
                .push(item);
        }
        for entry in entries.iter_mut() {
            entry.diary_action_items = by_entry.remove(&entry.id).unwrap_or_default();
        }

        let store = EntityStore::shared(entries);
        let mutator = OptimisticMutator::new(&store);
        Ok(Diary {
            gateway,
            store,
            mutator,
        })
    }

    pub fn entries(&self) -> Vec<DiaryEntry> {
        snapshot(&self.store)
    }

    pub fn store(&self) -> &SharedStore<DiaryEntry> {
        &self.store
    }

    fn entry_of(&self, item_id: &str) -> Option<String> {
        lock_store(&self.store)
            .records()
            .iter()
            .find(|entry| entry.diary_action_items.iter().any(|i| i.id == item_id))
            .map(|entry| entry.id.clone())
    }

    pub async fn add_entry(
        &self,
        title: &str,
        summary: &str,
        action_item_texts: &[String],
    ) -> Result<DiaryEntry, DiaryError> {
        let entry = create_entry(self.gateway.as_ref(), title, summary, action_item_texts).await?;
        lock_store(&self.store).prepend(entry.clone());
        Ok(entry)
    }

    pub async fn toggle_action_item(&self, item_id: &str) -> Result<(), MutationError> {
        let entry_id = self
            .entry_of(item_id)
            .ok_or_else(|| MutationError::Missing(item_id.to_string()))?;
        let gateway = self.gateway.clone();
        let target = item_id.to_string();

        self.mutator
            .mutate(
                &entry_id,
                |entry| flip_completion(entry, item_id),
                move |edited| async move {
                    let completed = edited
                        .diary_action_items
                        .iter()
                        .find(|item| item.id == target)
                        .map(|item| item.is_completed)
                        .ok_or(GatewayError::NotFoundOrForbidden)?;

                    gateway
                        .update(
                            Table::DiaryActionItems,
                            &target,
                            patch([("is_completed", Value::Bool(completed))]),
                        )
                        .await
                },
                |entry, flipped| {
                    if flipped {
                        flip_completion(entry, item_id);
                    }
                },
            )
            .await
    }

    /// Sends the item to the task list and records the link locally.
    pub async fn send_to_tasks(&self, item_id: &str) -> Result<Task, DiaryError> {
        let (sent, task) = send_action_item_to_tasks(self.gateway.as_ref(), item_id).await?;

        let mut store = lock_store(&self.store);
        if let Some(item) = store
            .get_mut(&sent.diary_entry_id)
            .and_then(|entry| entry.item_mut(item_id))
        {
            *item = sent;
        }
        Ok(task)
    }
}
