use serde_json::json;
use tracing::info;

use crate::auth::sign_in_redirect;
use crate::config::PortalConfig;
use crate::gateway::sqlite::timestamp;
use crate::gateway::{
    patch, read_record, to_row, Filter, Gateway, GatewayError, GatewayResult, Row, Table,
};
use crate::projects::data::{NewProjectForm, Project};
use crate::projects::helpers::create_project;

use super::data::*;
use super::notify::AgencyNotifier;
use super::staging::PendingProjectStore;

/// Where a new client lands after signing in.
pub const NEW_PROJECT_PATH: &str = "/projects/new";

fn optional(value: &str) -> Option<String> {
    if value.trim().is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

impl IntakeForm {
    /// Checks required fields and coerces the budget. Every other value is
    /// carried over exactly as entered.
    pub fn validate(&self) -> Result<IntakeSubmission, IntakeError> {
        if self.name.trim().is_empty() {
            return Err(IntakeError::field("name", "Name is required"));
        }
        if self.email.trim().is_empty() {
            return Err(IntakeError::field("email", "Email is required"));
        }
        if !self.email.contains('@') {
            return Err(IntakeError::field("email", "Enter a valid email address"));
        }
        if let Some(unknown) = self
            .project_types
            .iter()
            .find(|t| !is_known_project_type(t))
        {
            return Err(IntakeError::Field {
                field: "project_types",
                message: format!("Unknown project type: {}", unknown),
            });
        }

        Ok(IntakeSubmission {
            name: self.name.clone(),
            email: self.email.clone(),
            phone: self.phone.clone(),
            website: self.website.clone(),
            logo_url: self.logo_url.clone(),
            project_brief: self.project_brief.clone(),
            requested_budget: parse_budget(&self.requested_budget)?,
            how_heard: self.how_heard.clone(),
            socials: self.socials.clone(),
            github_links: self.github_links.clone(),
            inspiration_links: self.inspiration_links.clone(),
            project_types: self.project_types.clone(),
        })
    }
}

impl IntakeSubmission {
    pub fn to_client_request(&self) -> NewClientRequest {
        NewClientRequest {
            name: self.name.trim().to_string(),
            email: self.email.trim().to_string(),
            phone: optional(&self.phone),
            website: optional(&self.website),
            logo_url: optional(&self.logo_url),
            project_brief: optional(&self.project_brief),
            requested_budget: self.requested_budget.clone(),
            how_heard: optional(&self.how_heard),
            socials: optional(&self.socials),
            github_links: optional(&self.github_links),
            inspiration_links: optional(&self.inspiration_links),
            project_types: if self.project_types.is_empty() {
                None
            } else {
                Some(self.project_types.clone())
            },
            status: "pending".to_string(),
        }
    }
}

/// Records a signup for the agency to review.
pub async fn submit_client_request(
    gateway: &dyn Gateway,
    submission: &IntakeSubmission,
) -> GatewayResult<Row> {
    let row = gateway
        .insert(Table::ClientRequests, to_row(&submission.to_client_request())?)
        .await?;

    info!(email = %submission.email, "received client request");
    Ok(row)
}

/// Marks a request approved and makes sure a client exists for its email.
/// Meant for a service gateway.
pub async fn approve_client_request(
    gateway: &dyn Gateway,
    id: &str,
    review_notes: Option<String>,
) -> GatewayResult<ApproveResponse> {
    let request: ClientRequest =
        read_record(gateway, Table::ClientRequests, &Filter::new().eq("id", id))
            .await?
            .ok_or(GatewayError::NotFoundOrForbidden)?;

    gateway
        .update(
            Table::ClientRequests,
            id,
            patch([
                ("status", json!("approved")),
                ("review_notes", json!(review_notes)),
                ("reviewed_at", json!(timestamp())),
            ]),
        )
        .await?;

    let existing = gateway
        .read_one(
            Table::Clients,
            &Filter::new().eq("email", request.email.as_str()),
        )
        .await?;

    let client_created = existing.is_none();
    if client_created {
        gateway
            .insert(
                Table::Clients,
                to_row(&json!({
                    "name": request.name,
                    "email": request.email,
                    "website": request.website,
                    "phone": request.phone,
                    "logo_url": request.logo_url,
                }))?,
            )
            .await?;
    }

    info!(request_id = id, client_created, "approved client request");
    Ok(ApproveResponse {
        success: true,
        client_created,
    })
}

/// Validates the signup, stages it for project creation, tells the agency,
/// and returns the sign-in redirect.
pub fn begin_signup(
    form: &IntakeForm,
    staging: &PendingProjectStore,
    notifier: &AgencyNotifier,
    identity_url: &str,
    origin: &str,
) -> Result<String, IntakeError> {
    let submission = form.validate()?;
    staging.save(&submission)?;
    notifier.notify(submission);

    Ok(sign_in_redirect(identity_url, origin, "google", NEW_PROJECT_PATH)?)
}

/// After sign-in: turns the staged signup into the user's first project.
/// The staging record is cleared only once the project exists.
pub async fn finish_signup(
    gateway: &dyn Gateway,
    staging: &PendingProjectStore,
) -> Result<Option<Project>, IntakeError> {
    let Some(pending) = staging.load()? else {
        return Ok(None);
    };

    let mut form = NewProjectForm::default();
    form.merge_pending(&pending);

    let project = create_project(gateway, &form).await?;
    staging.clear()?;

    Ok(Some(project))
}

/// The signup path as configured: where the staged record lives, where the
/// agency hears about it, and where the user signs in.
#[derive(Debug, Clone)]
pub struct SignupFlow {
    pub staging: PendingProjectStore,
    pub notifier: AgencyNotifier,
    identity_url: String,
    origin: String,
}

impl SignupFlow {
    pub fn from_config(config: &PortalConfig) -> Result<SignupFlow, IntakeError> {
        let staging_dir = config.staging_dir().ok_or_else(|| {
            IntakeError::Staging("no local data directory for the signup record".to_string())
        })?;

        Ok(SignupFlow {
            staging: PendingProjectStore::new(&staging_dir),
            notifier: AgencyNotifier::new(config.agency_notify_url.clone()),
            identity_url: config.identity_url.clone(),
            origin: config.public_base_url.clone(),
        })
    }

    pub fn begin(&self, form: &IntakeForm) -> Result<String, IntakeError> {
        begin_signup(
            form,
            &self.staging,
            &self.notifier,
            &self.identity_url,
            &self.origin,
        )
    }

    pub async fn finish(&self, gateway: &dyn Gateway) -> Result<Option<Project>, IntakeError> {
        finish_signup(gateway, &self.staging).await
    }
}
