use serde_json::{json, Value};
use tracing::info;

use std::sync::Arc;

use crate::gateway::sqlite::timestamp;
use crate::gateway::{
    insert_record, patch, read_records, Filter, Gateway, GatewayError, GatewayResult, Table,
};
use crate::intake::data::{parse_budget, IntakeSubmission};
use crate::sync::{snapshot, EntityStore, MutationError, OptimisticMutator, SharedStore};

use super::data::*;

pub const PENDING_SETUP: &str = "pending_setup";

/// Lowercases, turns every run of whitespace, punctuation and hyphens into a
/// single hyphen, and trims hyphens from both ends.
pub fn project_slug(name: &str) -> String {
    let mut slug = String::new();
    let mut separated = false;

    for c in name.trim().to_lowercase().chars() {
        if c.is_ascii_alphanumeric() || c == '_' {
            if separated && !slug.is_empty() {
                slug.push('-');
            }
            separated = false;
            slug.push(c);
        } else {
            separated = true;
        }
    }

    slug
}

fn non_empty(value: &str) -> Option<String> {
    let value = value.trim();
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

fn link_list(value: &str) -> Option<LinkList> {
    let links: Vec<String> = value
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(String::from)
        .collect();

    if links.is_empty() {
        None
    } else {
        Some(LinkList { links })
    }
}

fn fill(target: &mut String, value: &str) {
    if !value.is_empty() {
        *target = value.to_string();
    }
}

impl NewProjectForm {
    /// Prefills the form from a staged signup. Only non-empty values are
    /// taken; the signup's `website` becomes `website_url`.
    pub fn merge_pending(&mut self, pending: &IntakeSubmission) {
        fill(&mut self.name, &pending.name);
        fill(&mut self.project_brief, &pending.project_brief);
        fill(&mut self.website_url, &pending.website);
        fill(&mut self.logo_url, &pending.logo_url);
        if let Some(budget) = &pending.requested_budget {
            self.requested_budget = budget.to_string();
        }
        if !pending.project_types.is_empty() {
            self.project_types = pending.project_types.clone();
        }
        fill(&mut self.socials, &pending.socials);
        fill(&mut self.github_links, &pending.github_links);
        fill(&mut self.inspiration_links, &pending.inspiration_links);
        fill(&mut self.how_heard, &pending.how_heard);
    }

    pub fn into_record(&self, owner: &str) -> GatewayResult<NewProjectRecord> {
        let name = non_empty(&self.name)
            .ok_or_else(|| GatewayError::Validation("Project name is required.".to_string()))?;
        let slug = project_slug(&name);
        if slug.is_empty() {
            return Err(GatewayError::Validation(
                "Project name must contain letters or numbers.".to_string(),
            ));
        }
        let requested_budget = parse_budget(&self.requested_budget)
            .map_err(|e| GatewayError::Validation(e.to_string()))?;

        Ok(NewProjectRecord {
            user_id: owner.to_string(),
            name,
            project_slug: slug,
            project_brief: non_empty(&self.project_brief),
            website_url: non_empty(&self.website_url),
            logo_url: non_empty(&self.logo_url),
            requested_budget,
            project_types: if self.project_types.is_empty() {
                None
            } else {
                Some(self.project_types.clone())
            },
            status: PENDING_SETUP.to_string(),
            social_links: link_list(&self.socials),
            github_repository: non_empty(&self.github_links),
            inspiration_links: link_list(&self.inspiration_links),
            how_heard: non_empty(&self.how_heard),
            updated_at: timestamp(),
        })
    }
}

/// Creates a project owned by the session user.
pub async fn create_project(gateway: &dyn Gateway, form: &NewProjectForm) -> GatewayResult<Project> {
    let record = form.into_record(gateway.user_id()?)?;

    match insert_record::<_, Project>(gateway, Table::Clients, &record).await {
        Ok(project) => {
            info!(project_id = %project.id, slug = %record.project_slug, "created project");
            Ok(project)
        }
        Err(GatewayError::Conflict(_)) => Err(GatewayError::Conflict(format!(
            "a project called \"{}\" already exists for your account",
            record.name
        ))),
        Err(e) => Err(e),
    }
}

/// The signed-in user's project dashboard.
pub struct ProjectBoard {
    gateway: Arc<dyn Gateway>,
    store: SharedStore<Project>,
    mutator: OptimisticMutator<Project>,
}

impl ProjectBoard {
    pub async fn load(gateway: Arc<dyn Gateway>) -> GatewayResult<ProjectBoard> {
        let owner = gateway.user_id()?.to_string();
        let projects = read_records(
            gateway.as_ref(),
            Table::Clients,
            &Filter::new().eq("user_id", owner).order_desc("created_at"),
        )
        .await?;

        let store = EntityStore::shared(projects);
        let mutator = OptimisticMutator::new(&store);
        Ok(ProjectBoard {
            gateway,
            store,
            mutator,
        })
    }

    pub fn store(&self) -> &SharedStore<Project> {
        &self.store
    }

    pub fn projects(&self) -> Vec<Project> {
        snapshot(&self.store)
    }

    /// Most urgent first by the slot-3 badge; ties keep their loaded order.
    pub fn sorted_by_priority(&self) -> Vec<Project> {
        let mut projects = self.projects();
        projects.sort_by_key(|p| p.badge3.rank());
        projects
    }

    pub async fn set_badge(
        &self,
        id: &str,
        slot: BadgeSlot,
        label: Option<&str>,
    ) -> Result<(), MutationError> {
        let value = slot
            .parse(label)
            .map_err(|e| MutationError::Invalid(e.to_string()))?;
        let gateway = self.gateway.clone();

        self.mutator
            .mutate(
                id,
                |project| project.replace_badge(slot, value),
                move |edited| async move {
                    gateway
                        .update(
                            Table::Clients,
                            &edited.id,
                            patch([
                                (slot.column(), value.to_json()),
                                ("updated_at", json!(timestamp())),
                            ]),
                        )
                        .await
                },
                |project, previous| {
                    if let Some(previous) = previous {
                        project.replace_badge(slot, previous);
                    }
                },
            )
            .await
    }

    pub async fn toggle_featured(&self, id: &str) -> Result<(), MutationError> {
        let gateway = self.gateway.clone();

        self.mutator
            .mutate(
                id,
                |project| project.is_featured = !project.is_featured,
                move |edited| async move {
                    gateway
                        .update(
                            Table::Clients,
                            &edited.id,
                            patch([("is_featured", Value::Bool(edited.is_featured))]),
                        )
                        .await
                },
                |project, ()| project.is_featured = !project.is_featured,
            )
            .await
    }

    /// Explicit owner action; the project disappears at once and comes back
    /// if the delete is refused.
    pub async fn delete_project(&self, id: &str) -> Result<(), MutationError> {
        let gateway = self.gateway.clone();
        let target = id.to_string();

        self.mutator
            .remove(id, move || async move {
                gateway.delete(Table::Clients, &target).await
            })
            .await?;

        info!(project_id = id, "deleted project");
        Ok(())
    }
}
