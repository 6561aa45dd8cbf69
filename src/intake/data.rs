use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};
use thiserror::Error;

use crate::gateway::GatewayError;

pub const MAIN_PROJECT_TYPES: [&str; 20] = [
    "Website",
    "Mobile App",
    "E-Commerce Store",
    "SaaS Platform",
    "API Development",
    "Brand Design",
    "UI/UX",
    "Video",
    "Motion Graphics",
    "3D Design",
    "AI/ML",
    "Blockchain",
    "Web3",
    "Marketing",
    "Social Media",
    "SEO",
    "Content",
    "Email Marketing",
    "Consulting",
    "DevOps",
];

pub const ADDITIONAL_PROJECT_TYPES: [&str; 48] = [
    "Progressive Web App",
    "Native Mobile App",
    "Cross-Platform App",
    "Marketplace Platform",
    "Subscription Platform",
    "Custom CMS",
    "Database Design",
    "System Integration",
    "Legacy System Modernization",
    "Design System",
    "Interactive Design",
    "Animation",
    "Illustration",
    "Logo Design",
    "Typography",
    "Icon Design",
    "Print Design",
    "Packaging Design",
    "Environmental Design",
    "Machine Learning",
    "Natural Language Processing",
    "Computer Vision",
    "Smart Contracts",
    "DeFi",
    "NFT Platform",
    "DAO Tools",
    "Data Science",
    "Predictive Analytics",
    "IoT Platform",
    "Growth Strategy",
    "Content Strategy",
    "Influencer Marketing",
    "PPC Advertising",
    "Marketing Automation",
    "Lead Generation",
    "Conversion Optimization",
    "Analytics Setup",
    "Performance Marketing",
    "Security",
    "Code Review",
    "Performance Optimization",
    "Security Audit",
    "Cloud Architecture",
    "Infrastructure Setup",
    "CI/CD Pipeline",
    "Technical Documentation",
    "Team Training",
    "Project Management",
];

pub fn is_known_project_type(project_type: &str) -> bool {
    MAIN_PROJECT_TYPES.contains(&project_type) || ADDITIONAL_PROJECT_TYPES.contains(&project_type)
}

/// The signup form exactly as entered.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct IntakeForm {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub website: String,
    pub logo_url: String,
    pub project_brief: String,
    #[serde(deserialize_with = "budget_input")]
    pub requested_budget: String,
    pub how_heard: String,
    pub socials: String,
    pub github_links: String,
    pub inspiration_links: String,
    pub project_types: Vec<String>,
}

/// A validated signup: what gets staged, sent to the agency and stored as a
/// client request. Identical to the form except for the numeric budget.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct IntakeSubmission {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub website: String,
    pub logo_url: String,
    pub project_brief: String,
    pub requested_budget: Option<Number>,
    pub how_heard: String,
    pub socials: String,
    pub github_links: String,
    pub inspiration_links: String,
    pub project_types: Vec<String>,
}

/// The `client_requests` row for a submission.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct NewClientRequest {
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub website: Option<String>,
    pub logo_url: Option<String>,
    pub project_brief: Option<String>,
    pub requested_budget: Option<Number>,
    pub how_heard: Option<String>,
    pub socials: Option<String>,
    pub github_links: Option<String>,
    pub inspiration_links: Option<String>,
    pub project_types: Option<Vec<String>>,
    pub status: String,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct ClientRequest {
    pub id: String,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub website: Option<String>,
    pub logo_url: Option<String>,
    pub status: Option<String>,
    pub review_notes: Option<String>,
    pub reviewed_at: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct ApproveRequest {
    pub review_notes: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ApproveResponse {
    pub success: bool,
    pub client_created: bool,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum IntakeError {
    #[error("{message}")]
    Field {
        field: &'static str,
        message: String,
    },
    #[error("Could not initiate project setup: {0}")]
    Staging(String),
    #[error(transparent)]
    Gateway(#[from] GatewayError),
}

impl IntakeError {
    pub fn field(field: &'static str, message: &str) -> IntakeError {
        IntakeError::Field {
            field,
            message: message.to_string(),
        }
    }

    pub fn user_message(&self) -> String {
        match self {
            IntakeError::Gateway(e) => e.user_message(),
            other => other.to_string(),
        }
    }
}

/// Empty input means no budget; anything else must be a number.
pub fn parse_budget(input: &str) -> Result<Option<Number>, IntakeError> {
    let input = input.trim();
    if input.is_empty() {
        return Ok(None);
    }

    if let Ok(whole) = input.parse::<i64>() {
        return Ok(Some(Number::from(whole)));
    }
    input
        .parse::<f64>()
        .ok()
        .and_then(Number::from_f64)
        .map(Some)
        .ok_or_else(|| IntakeError::field("requested_budget", "Requested budget must be a number"))
}

/// Budget fields arrive as typed text, as a number, or as null.
fn budget_input<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(String::new()),
        Some(Value::String(text)) => Ok(text),
        Some(Value::Number(number)) => Ok(number.to_string()),
        Some(other) => Err(de::Error::custom(format!(
            "expected a budget, got {}",
            other
        ))),
    }
}
