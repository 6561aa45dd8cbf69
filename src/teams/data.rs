use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::gateway::GatewayError;

/// A team card's colours, stored on the team as JSON.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ColorScheme {
    pub bg_color: String,
    pub text_color: String,
    pub border_color: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

const COLOR_SCHEMES: [(&str, &str, &str, &str); 8] = [
    ("Sky Blue", "bg-sky-700", "text-sky-100", "border-sky-500"),
    ("Emerald Green", "bg-emerald-700", "text-emerald-100", "border-emerald-500"),
    ("Amber Yellow", "bg-amber-700", "text-amber-100", "border-amber-500"),
    ("Rose Red", "bg-rose-700", "text-rose-100", "border-rose-500"),
    ("Indigo Blue", "bg-indigo-700", "text-indigo-100", "border-indigo-500"),
    ("Pink", "bg-pink-700", "text-pink-100", "border-pink-500"),
    ("Teal", "bg-teal-700", "text-teal-100", "border-teal-500"),
    ("Purple", "bg-purple-700", "text-purple-100", "border-purple-500"),
];

impl ColorScheme {
    pub fn predefined() -> Vec<ColorScheme> {
        COLOR_SCHEMES
            .iter()
            .map(|(name, bg, text, border)| ColorScheme {
                bg_color: bg.to_string(),
                text_color: text.to_string(),
                border_color: border.to_string(),
                name: Some(name.to_string()),
            })
            .collect()
    }

    pub fn named(name: &str) -> Option<ColorScheme> {
        ColorScheme::predefined()
            .into_iter()
            .find(|scheme| scheme.name.as_deref() == Some(name))
    }
}

impl Default for ColorScheme {
    fn default() -> ColorScheme {
        ColorScheme {
            bg_color: COLOR_SCHEMES[0].1.to_string(),
            text_color: COLOR_SCHEMES[0].2.to_string(),
            border_color: COLOR_SCHEMES[0].3.to_string(),
            name: Some(COLOR_SCHEMES[0].0.to_string()),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TeamIcon {
    #[serde(rename = "FaDatabase")]
    Database,
    #[serde(rename = "FaPalette")]
    Palette,
    #[serde(rename = "FaBolt")]
    Bolt,
    #[serde(rename = "FaCloud")]
    Cloud,
    #[serde(rename = "FaLightbulb")]
    Lightbulb,
    #[serde(rename = "FaBrain")]
    Brain,
    #[default]
    #[serde(rename = "FaUsers")]
    Users,
    #[serde(rename = "FaQuestionCircle")]
    QuestionCircle,
}

impl TeamIcon {
    pub const ALL: [TeamIcon; 8] = [
        TeamIcon::Database,
        TeamIcon::Palette,
        TeamIcon::Bolt,
        TeamIcon::Cloud,
        TeamIcon::Lightbulb,
        TeamIcon::Brain,
        TeamIcon::Users,
        TeamIcon::QuestionCircle,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            TeamIcon::Database => "FaDatabase",
            TeamIcon::Palette => "FaPalette",
            TeamIcon::Bolt => "FaBolt",
            TeamIcon::Cloud => "FaCloud",
            TeamIcon::Lightbulb => "FaLightbulb",
            TeamIcon::Brain => "FaBrain",
            TeamIcon::Users => "FaUsers",
            TeamIcon::QuestionCircle => "FaQuestionCircle",
        }
    }

    /// Missing or unrecognised icon names show as a question mark.
    pub fn from_name(name: Option<&str>) -> TeamIcon {
        name.and_then(|name| TeamIcon::ALL.into_iter().find(|icon| icon.name() == name))
            .unwrap_or(TeamIcon::QuestionCircle)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum TeamRole {
    Owner,
    Admin,
    #[default]
    Member,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Team {
    pub id: String,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub icon_name: Option<String>,
    pub color_scheme: Option<ColorScheme>,
    pub created_by: Option<String>,
    pub created_at: Option<String>,
}

impl Team {
    pub fn icon(&self) -> TeamIcon {
        TeamIcon::from_name(self.icon_name.as_deref())
    }
}

/// What the user fills in to create a team.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct TeamForm {
    pub name: String,
    pub description: String,
    pub icon: TeamIcon,
    pub color_scheme: ColorScheme,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct NewTeam {
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub icon_name: String,
    pub color_scheme: ColorScheme,
    pub created_by: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Membership {
    pub id: String,
    pub team_id: String,
    pub user_id: String,
    pub role: TeamRole,
    pub joined_at: Option<String>,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct NewMembership {
    pub team_id: String,
    pub user_id: String,
    pub role: TeamRole,
    pub joined_at: String,
}

/// A member as shown on the team page.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TeamMember {
    pub id: String,
    pub display_name: String,
    pub avatar_url: String,
    pub role: TeamRole,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum TeamError {
    #[error("{0}")]
    Validation(String),
    #[error("Team created, but failed to add you as a member: {source}. The team creation has been rolled back.")]
    MembershipRolledBack { source: GatewayError },
    /// The compensating delete failed too; the team exists without an owner
    /// membership.
    #[error("Team created, but failed to add you as a member: {source}. Removing the team also failed.")]
    MembershipFailed {
        team_id: String,
        source: GatewayError,
    },
    #[error(transparent)]
    Gateway(#[from] GatewayError),
}

impl TeamError {
    pub fn user_message(&self) -> String {
        match self {
            TeamError::Gateway(e) => e.user_message(),
            other => other.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn schemes_serialize_like_the_stored_json() {
        let sky = ColorScheme::named("Sky Blue").unwrap();

        assert_eq!(
            serde_json::to_value(&sky).unwrap(),
            json!({
                "bgColor": "bg-sky-700",
                "textColor": "text-sky-100",
                "borderColor": "border-sky-500",
                "name": "Sky Blue",
            })
        );
        assert_eq!(ColorScheme::predefined().len(), 8);
        assert_eq!(ColorScheme::default(), sky);
        assert_eq!(ColorScheme::named("Neon"), None);
    }

    #[test]
    fn icons_fall_back_to_question_mark() {
        assert_eq!(TeamIcon::from_name(Some("FaBrain")), TeamIcon::Brain);
        assert_eq!(TeamIcon::from_name(Some("FaRocket")), TeamIcon::QuestionCircle);
        assert_eq!(TeamIcon::from_name(None), TeamIcon::QuestionCircle);
        assert_eq!(serde_json::to_value(TeamIcon::Cloud).unwrap(), json!("FaCloud"));
    }
}
