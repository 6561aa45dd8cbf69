use serde_json::json;
use tracing::info;

use std::collections::HashSet;
use std::sync::Arc;

use crate::gateway::sqlite::timestamp;
use crate::gateway::{
    insert_record, patch, read_records, Filter, Gateway, GatewayError, GatewayResult, Table,
};
use crate::projects::data::Project;
use crate::sync::{
    lock_store, snapshot, EntityStore, MutationError, OptimisticMutator, SharedStore,
};

use super::data::*;

/// Inserts a task owned by the session user.
pub async fn insert_task(gateway: &dyn Gateway, task: &NewTask) -> GatewayResult<Task> {
    let created: Task = insert_record(gateway, Table::Tasks, task).await?;
    info!(task_id = %created.id, status = %created.status, "created task");
    Ok(created)
}

/// Dropdown entries: scopes named after one of `project_names` come first
/// (labelled by the project), then every other scope. Each scope appears
/// once; the result is sorted by label.
pub fn scope_options(project_names: &[String], scopes: &[ProjectScope]) -> Vec<ScopeOption> {
    let mut options = vec![];
    let mut added = HashSet::new();

    for name in project_names {
        if let Some(scope) = scopes.iter().find(|s| &s.name == name) {
            if added.insert(scope.id.as_str()) {
                options.push(ScopeOption {
                    label: name.clone(),
                    value: scope.id.clone(),
                });
            }
        }
    }
    for scope in scopes {
        if added.insert(scope.id.as_str()) {
            options.push(ScopeOption {
                label: scope.name.clone(),
                value: scope.id.clone(),
            });
        }
    }

    options.sort_by_key(|option| option.label.to_lowercase());
    options
}

/// The scope preselected for new tasks: the current choice while it is
/// still offered, otherwise the first option.
pub fn default_scope(options: &[ScopeOption], current: Option<&str>) -> Option<String> {
    match current {
        Some(current) if options.iter().any(|o| o.value == current) => Some(current.to_string()),
        _ => options.first().map(|o| o.value.clone()),
    }
}

/// The work-in-progress view: the user's tasks, newest first, and the scopes
/// they can be filed under.
pub struct TaskBoard {
    gateway: Arc<dyn Gateway>,
    tasks: SharedStore<Task>,
    scopes: SharedStore<ProjectScope>,
    project_names: Vec<String>,
    mutator: OptimisticMutator<Task>,
}

impl TaskBoard {
    pub async fn load(gateway: Arc<dyn Gateway>) -> GatewayResult<TaskBoard> {
        let owner = gateway.user_id()?.to_string();
        let owned = Filter::new().eq("user_id", owner.as_str());

        let tasks: Vec<Task> = read_records(
            gateway.as_ref(),
            Table::Tasks,
            &owned.clone().order_desc("created_at"),
        )
        .await?;
        let scopes: Vec<ProjectScope> =
            read_records(gateway.as_ref(), Table::ProjectScopes, &owned.clone().order_asc("name"))
                .await?;
        let projects: Vec<Project> =
            read_records(gateway.as_ref(), Table::Clients, &owned.order_asc("name")).await?;

        let tasks = EntityStore::shared(tasks);
        let mutator = OptimisticMutator::new(&tasks);
        Ok(TaskBoard {
            gateway,
            tasks,
            scopes: EntityStore::shared(scopes),
            project_names: projects.into_iter().map(|p| p.name).collect(),
            mutator,
        })
    }

    pub fn store(&self) -> &SharedStore<Task> {
        &self.tasks
    }

    pub fn tasks(&self) -> Vec<Task> {
        snapshot(&self.tasks)
    }

    pub fn scopes(&self) -> Vec<ProjectScope> {
        snapshot(&self.scopes)
    }

    pub fn scope_options(&self) -> Vec<ScopeOption> {
        scope_options(&self.project_names, &self.scopes())
    }

    fn has_scope(&self, scope_id: &str) -> bool {
        lock_store(&self.scopes).contains(scope_id)
    }

    /// Creates a `TO_DO` task and puts it at the top of the list.
    pub async fn add_task(&self, text: &str, scope_id: Option<&str>) -> GatewayResult<Task> {
        let text = text.trim();
        if text.is_empty() {
            return Err(GatewayError::Validation("Task text is required.".to_string()));
        }
        if let Some(scope_id) = scope_id {
            if !self.has_scope(scope_id) {
                return Err(GatewayError::Validation(format!("Unknown scope {}", scope_id)));
            }
        }

        let task = insert_task(
            self.gateway.as_ref(),
            &NewTask {
                user_id: self.gateway.user_id()?.to_string(),
                text: text.to_string(),
                status: TaskStatus::ToDo,
                project_scope_id: scope_id.map(String::from),
                source_diary_action_item_id: None,
            },
        )
        .await?;

        lock_store(&self.tasks).prepend(task.clone());
        Ok(task)
    }

    pub async fn set_status(&self, id: &str, status: TaskStatus) -> Result<(), MutationError> {
        let gateway = self.gateway.clone();

        self.mutator
            .mutate_field(
                id,
                |task| &mut task.status,
                status,
                move |edited| async move {
                    gateway
                        .update(
                            Table::Tasks,
                            &edited.id,
                            patch([
                                ("status", json!(edited.status)),
                                ("updated_at", json!(timestamp())),
                            ]),
                        )
                        .await
                },
            )
            .await
    }

    /// Files the task under a loaded scope, or under none.
    pub async fn set_scope(&self, id: &str, scope_id: Option<&str>) -> Result<(), MutationError> {
        if let Some(scope_id) = scope_id {
            if !self.has_scope(scope_id) {
                return Err(MutationError::Invalid(format!("Unknown scope {}", scope_id)));
            }
        }
        let gateway = self.gateway.clone();

        self.mutator
            .mutate_field(
                id,
                |task| &mut task.project_scope_id,
                scope_id.map(String::from),
                move |edited| async move {
                    gateway
                        .update(
                            Table::Tasks,
                            &edited.id,
                            patch([
                                ("project_scope_id", json!(edited.project_scope_id)),
                                ("updated_at", json!(timestamp())),
                            ]),
                        )
                        .await
                },
            )
            .await
    }

    pub async fn delete_task(&self, id: &str) -> Result<(), MutationError> {
        let gateway = self.gateway.clone();
        let target = id.to_string();

        self.mutator
            .remove(id, move || async move {
                gateway.delete(Table::Tasks, &target).await
            })
            .await?;

        Ok(())
    }

    pub async fn create_scope(&self, name: &str) -> GatewayResult<ProjectScope> {
        let name = name.trim();
        if name.is_empty() {
            return Err(GatewayError::Validation("Scope name is required.".to_string()));
        }

        let scope: ProjectScope = insert_record(
            self.gateway.as_ref(),
            Table::ProjectScopes,
            &NewProjectScope {
                user_id: self.gateway.user_id()?.to_string(),
                name: name.to_string(),
            },
        )
        .await?;

        lock_store(&self.scopes).push(scope.clone());
        info!(scope_id = %scope.id, "created project scope");
        Ok(scope)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::testing::{flaky_session, FlakyGateway};
    use crate::gateway::{read_record, SqliteBackend};
    use crate::projects::data::NewProjectForm;
    use crate::projects::helpers::create_project;

    fn scope(id: &str, name: &str) -> ProjectScope {
        ProjectScope {
            id: id.to_string(),
            user_id: Some("alice".to_string()),
            name: name.to_string(),
            description: None,
            scope_type: None,
        }
    }

    #[test]
    fn project_scopes_are_listed_once() {
        let scopes = vec![scope("s1", "Shop"), scope("s2", "Research"), scope("s3", "Admin")];
        let projects = vec!["Shop".to_string(), "Shop".to_string(), "Unscoped".to_string()];

        let options = scope_options(&projects, &scopes);
        let values: Vec<&str> = options.iter().map(|o| o.value.as_str()).collect();

        assert_eq!(values, vec!["s3", "s2", "s1"]);
        assert_eq!(default_scope(&options, Some("s2")), Some("s2".to_string()));
        assert_eq!(default_scope(&options, Some("gone")), Some("s3".to_string()));
        assert_eq!(default_scope(&[], None), None);
    }

    async fn board() -> (Arc<SqliteBackend>, Arc<FlakyGateway>, TaskBoard) {
        let (backend, gateway) = flaky_session("alice");
        let board = TaskBoard::load(gateway.clone()).await.unwrap();
        (backend, gateway, board)
    }

    #[tokio::test]
    async fn new_tasks_are_trimmed_and_prepended() {
        let (_backend, _gateway, board) = board().await;

        board.add_task("first", None).await.unwrap();
        let second = board.add_task("  second  ", None).await.unwrap();

        assert_eq!(second.text, "second");
        assert_eq!(second.status, TaskStatus::ToDo);
        assert_eq!(board.tasks()[0].id, second.id);
        assert!(matches!(
            board.add_task("   ", None).await,
            Err(GatewayError::Validation(_))
        ));
        assert_eq!(board.tasks().len(), 2);
    }

    #[tokio::test]
    async fn status_change_is_persisted_or_rolled_back() {
        let (backend, gateway, board) = board().await;
        let kept = board.add_task("kept", None).await.unwrap();
        let flaky = board.add_task("flaky", None).await.unwrap();
        gateway.fail_updates_to(&flaky.id);

        board.set_status(&kept.id, TaskStatus::Done).await.unwrap();
        let result = board.set_status(&flaky.id, TaskStatus::Issue).await;

        assert!(matches!(result, Err(MutationError::Rejected(_))));
        let tasks = board.tasks();
        assert_eq!(tasks.iter().find(|t| t.id == flaky.id).unwrap().status, TaskStatus::ToDo);
        assert!(lock_store(board.store()).error_for(&flaky.id).is_some());

        let stored: Task = read_record(
            &backend.service(),
            Table::Tasks,
            &Filter::new().eq("id", kept.id.as_str()),
        )
        .await
        .unwrap()
        .unwrap();
        assert_eq!(stored.status, TaskStatus::Done);
        assert!(stored.updated_at.is_some());
    }

    #[tokio::test]
    async fn scopes_must_be_loaded_to_be_assigned() {
        let (_backend, _gateway, board) = board().await;
        let task = board.add_task("file me", None).await.unwrap();
        let research = board.create_scope(" Research ").await.unwrap();

        board.set_scope(&task.id, Some(&research.id)).await.unwrap();
        assert_eq!(board.tasks()[0].project_scope_id.as_deref(), Some(research.id.as_str()));

        assert!(matches!(
            board.set_scope(&task.id, Some("elsewhere")).await,
            Err(MutationError::Invalid(_))
        ));
        board.set_scope(&task.id, None).await.unwrap();
        assert_eq!(board.tasks()[0].project_scope_id, None);
    }

    #[tokio::test]
    async fn options_follow_the_users_projects() {
        let (_backend, gateway) = flaky_session("alice");
        create_project(
            gateway.as_ref(),
            &NewProjectForm {
                name: "Shop".to_string(),
                ..NewProjectForm::default()
            },
        )
        .await
        .unwrap();
        let board = TaskBoard::load(gateway.clone()).await.unwrap();
        board.create_scope("Shop").await.unwrap();
        board.create_scope("Admin").await.unwrap();

        let labels: Vec<String> = board.scope_options().into_iter().map(|o| o.label).collect();
        assert_eq!(labels, vec!["Admin", "Shop"]);
    }

    #[tokio::test]
    async fn failed_delete_restores_the_task() {
        let (_backend, gateway, board) = board().await;
        let task = board.add_task("stubborn", None).await.unwrap();
        gateway.fail_deletes_from(Table::Tasks);

        assert!(board.delete_task(&task.id).await.is_err());
        assert_eq!(board.tasks().len(), 1);
    }
}
