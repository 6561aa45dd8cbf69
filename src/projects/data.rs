use serde::de::Deserializer;
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};
use thiserror::Error;
use tracing::warn;

use std::fmt;
use std::str::FromStr;

use crate::sync::Entity;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("\"{0}\" is not a badge for this slot")]
pub struct UnknownBadge(pub String);

/// A closed badge vocabulary. `Uncategorized` is stored as null.
macro_rules! badge_vocabulary {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $label:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
        pub enum $name {
            #[default]
            Uncategorized,
            $($variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn label(&self) -> Option<&'static str> {
                match self {
                    $name::Uncategorized => None,
                    $($name::$variant => Some($label)),+
                }
            }
        }

        impl FromStr for $name {
            type Err = UnknownBadge;

            fn from_str(s: &str) -> Result<$name, UnknownBadge> {
                match s {
                    "" => Ok($name::Uncategorized),
                    $($label => Ok($name::$variant),)+
                    other => Err(UnknownBadge(other.to_string())),
                }
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                match self.label() {
                    Some(label) => serializer.serialize_str(label),
                    None => serializer.serialize_none(),
                }
            }
        }

        /// Stored labels outside the vocabulary read as `Uncategorized`, so one
        /// stray value cannot hide a whole dashboard. Writes go through `FromStr`.
        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<$name, D::Error> {
                match Option::<String>::deserialize(deserializer)? {
                    Some(label) => Ok(label.parse().unwrap_or_else(|e: UnknownBadge| {
                        warn!(badge = %e.0, slot = stringify!($name), "unknown stored badge");
                        $name::Uncategorized
                    })),
                    None => Ok($name::Uncategorized),
                }
            }
        }
    };
}

badge_vocabulary! {
    /// Slot 1: where the project is in its lifecycle.
    StatusBadge {
        PendingSetup => "Pending_setup",
        Planning => "Planning",
        InDevelopment => "In Development",
        Live => "Live",
        Maintenance => "Maintenance",
        OnHold => "On Hold",
        Archived => "Archived",
        NeedsReview => "Needs Review",
        Completed => "Completed",
        RequiresUpdate => "Requires Update",
    }
}

badge_vocabulary! {
    /// Slots 2, 4 and 5.
    CategoryBadge {
        Saas => "SaaS",
        MobileApp => "Mobile App",
        Website => "Website",
        ECommerce => "E-commerce",
        AiMl => "AI/ML",
        Consulting => "Consulting",
        InternalTool => "Internal Tool",
        Web3Blockchain => "Web3/Blockchain",
        CreativeServices => "Creative Services",
        Platform => "Platform",
        Service => "Service",
    }
}

badge_vocabulary! {
    /// Slot 3.
    PriorityBadge {
        High => "High Priority",
        Medium => "Medium Priority",
        Low => "Low Priority",
        NeedsFeedback => "Needs Feedback",
        ClientApproved => "Client Approved",
        Phase1 => "Phase 1",
        Phase2 => "Phase 2",
        Experimental => "Experimental",
        ShowcaseReady => "Showcase Ready",
        Internal => "Internal",
    }
}

impl StatusBadge {
    /// What the status dropdown shows; an unset status reads as pending setup.
    pub fn display_label(&self) -> &'static str {
        self.label().unwrap_or("Pending_setup")
    }
}

impl PriorityBadge {
    /// Sort key for the dashboard, most urgent first.
    pub fn rank(&self) -> u8 {
        match self {
            PriorityBadge::High => 0,
            PriorityBadge::Medium => 1,
            PriorityBadge::Low => 2,
            PriorityBadge::NeedsFeedback => 3,
            _ => 4,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BadgeSlot {
    One,
    Two,
    Three,
    Four,
    Five,
}

impl BadgeSlot {
    pub const ALL: [BadgeSlot; 5] = [
        BadgeSlot::One,
        BadgeSlot::Two,
        BadgeSlot::Three,
        BadgeSlot::Four,
        BadgeSlot::Five,
    ];

    pub fn column(&self) -> &'static str {
        match self {
            BadgeSlot::One => "badge1",
            BadgeSlot::Two => "badge2",
            BadgeSlot::Three => "badge3",
            BadgeSlot::Four => "badge4",
            BadgeSlot::Five => "badge5",
        }
    }

    /// Validates a dropdown value against this slot's vocabulary. `None` and
    /// the empty string both clear the badge.
    pub fn parse(&self, label: Option<&str>) -> Result<BadgeValue, UnknownBadge> {
        let label = label.unwrap_or_default();
        Ok(match self {
            BadgeSlot::One => BadgeValue::Status(label.parse()?),
            BadgeSlot::Three => BadgeValue::Priority(label.parse()?),
            BadgeSlot::Two | BadgeSlot::Four | BadgeSlot::Five => {
                BadgeValue::Category(label.parse()?)
            }
        })
    }
}

impl fmt::Display for BadgeSlot {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.column())
    }
}

/// The value held by one badge slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BadgeValue {
    Status(StatusBadge),
    Category(CategoryBadge),
    Priority(PriorityBadge),
}

impl BadgeValue {
    pub fn label(&self) -> Option<&'static str> {
        match self {
            BadgeValue::Status(badge) => badge.label(),
            BadgeValue::Category(badge) => badge.label(),
            BadgeValue::Priority(badge) => badge.label(),
        }
    }

    pub fn to_json(&self) -> Value {
        match self.label() {
            Some(label) => Value::String(label.to_string()),
            None => Value::Null,
        }
    }
}

/// A client project: one `clients` row, owned by `user_id`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Project {
    pub id: String,
    pub user_id: Option<String>,
    pub name: String,
    pub project_slug: Option<String>,
    pub project_brief: Option<String>,
    pub status: Option<String>,
    #[serde(default)]
    pub badge1: StatusBadge,
    #[serde(default)]
    pub badge2: CategoryBadge,
    #[serde(default)]
    pub badge3: PriorityBadge,
    #[serde(default)]
    pub badge4: CategoryBadge,
    #[serde(default)]
    pub badge5: CategoryBadge,
    #[serde(default)]
    pub is_featured: bool,
    pub website_url: Option<String>,
    pub logo_url: Option<String>,
    pub requested_budget: Option<f64>,
    pub project_types: Option<Vec<String>>,
    pub created_at: Option<String>,
}

impl Entity for Project {
    fn id(&self) -> &str {
        &self.id
    }
}

impl Project {
    pub fn badge(&self, slot: BadgeSlot) -> BadgeValue {
        match slot {
            BadgeSlot::One => BadgeValue::Status(self.badge1),
            BadgeSlot::Two => BadgeValue::Category(self.badge2),
            BadgeSlot::Three => BadgeValue::Priority(self.badge3),
            BadgeSlot::Four => BadgeValue::Category(self.badge4),
            BadgeSlot::Five => BadgeValue::Category(self.badge5),
        }
    }

    /// Puts `value` into `slot` and returns what was there. A value from the
    /// wrong vocabulary leaves the project untouched and yields `None`.
    pub fn replace_badge(&mut self, slot: BadgeSlot, value: BadgeValue) -> Option<BadgeValue> {
        let previous = self.badge(slot);
        match (slot, value) {
            (BadgeSlot::One, BadgeValue::Status(badge)) => self.badge1 = badge,
            (BadgeSlot::Two, BadgeValue::Category(badge)) => self.badge2 = badge,
            (BadgeSlot::Three, BadgeValue::Priority(badge)) => self.badge3 = badge,
            (BadgeSlot::Four, BadgeValue::Category(badge)) => self.badge4 = badge,
            (BadgeSlot::Five, BadgeValue::Category(badge)) => self.badge5 = badge,
            _ => return None,
        }
        Some(previous)
    }
}

/// The new-project form, as typed.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct NewProjectForm {
    pub name: String,
    pub project_brief: String,
    pub website_url: String,
    pub logo_url: String,
    pub requested_budget: String,
    pub project_types: Vec<String>,
    pub socials: String,
    pub github_links: String,
    pub inspiration_links: String,
    pub how_heard: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct LinkList {
    pub links: Vec<String>,
}

/// The `clients` row written for a new project.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct NewProjectRecord {
    pub user_id: String,
    pub name: String,
    pub project_slug: String,
    pub project_brief: Option<String>,
    pub website_url: Option<String>,
    pub logo_url: Option<String>,
    pub requested_budget: Option<Number>,
    pub project_types: Option<Vec<String>>,
    pub status: String,
    pub social_links: Option<LinkList>,
    pub github_repository: Option<String>,
    pub inspiration_links: Option<LinkList>,
    pub how_heard: Option<String>,
    pub updated_at: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn badges_round_trip_through_labels_and_null() {
        assert_eq!(
            serde_json::to_value(PriorityBadge::High).unwrap(),
            json!("High Priority")
        );
        assert_eq!(serde_json::to_value(CategoryBadge::Uncategorized).unwrap(), Value::Null);
        assert_eq!(
            serde_json::from_value::<CategoryBadge>(json!("Web3/Blockchain")).unwrap(),
            CategoryBadge::Web3Blockchain
        );
        assert_eq!(
            serde_json::from_value::<StatusBadge>(Value::Null).unwrap(),
            StatusBadge::Uncategorized
        );
        assert_eq!(
            serde_json::from_value::<StatusBadge>(json!("Someday")).unwrap(),
            StatusBadge::Uncategorized
        );
        assert!("Someday".parse::<StatusBadge>().is_err());
    }

    #[test]
    fn slots_accept_only_their_vocabulary() {
        assert_eq!(
            BadgeSlot::One.parse(Some("Live")),
            Ok(BadgeValue::Status(StatusBadge::Live))
        );
        assert_eq!(
            BadgeSlot::Four.parse(Some("SaaS")),
            Ok(BadgeValue::Category(CategoryBadge::Saas))
        );
        assert_eq!(
            BadgeSlot::Three.parse(None),
            Ok(BadgeValue::Priority(PriorityBadge::Uncategorized))
        );
        assert_eq!(
            BadgeSlot::Three.parse(Some("SaaS")),
            Err(UnknownBadge("SaaS".to_string()))
        );
    }

    #[test]
    fn uncategorized_status_displays_as_pending_setup() {
        assert_eq!(StatusBadge::Uncategorized.display_label(), "Pending_setup");
        assert_eq!(StatusBadge::Live.display_label(), "Live");
    }

    #[test]
    fn priority_ranks() {
        assert_eq!(PriorityBadge::High.rank(), 0);
        assert_eq!(PriorityBadge::NeedsFeedback.rank(), 3);
        assert_eq!(PriorityBadge::Phase1.rank(), 4);
        assert_eq!(PriorityBadge::Uncategorized.rank(), 4);
    }

    #[test]
    fn project_rows_load_with_missing_badges() {
        let project: Project = serde_json::from_value(json!({
            "id": "p1",
            "user_id": "alice",
            "name": "Shop",
            "project_slug": "shop",
            "badge2": "E-commerce",
            "requested_budget": 5000
        }))
        .unwrap();

        assert_eq!(project.badge1, StatusBadge::Uncategorized);
        assert_eq!(project.badge2, CategoryBadge::ECommerce);
        assert_eq!(project.requested_budget, Some(5000.0));
        assert!(!project.is_featured);
    }

    #[test]
    fn stray_stored_badges_load_as_uncategorized() {
        let project: Project = serde_json::from_value(json!({
            "id": "p1",
            "name": "Shop",
            "badge1": "Someday",
            "badge3": "Urgent!!",
            "badge4": "SaaS"
        }))
        .unwrap();

        assert_eq!(project.badge1, StatusBadge::Uncategorized);
        assert_eq!(project.badge3, PriorityBadge::Uncategorized);
        assert_eq!(project.badge4, CategoryBadge::Saas);
        assert_eq!(BadgeSlot::One.parse(Some("Someday")), Err(UnknownBadge("Someday".to_string())));
    }

    #[test]
    fn replace_badge_refuses_other_vocabularies() {
        let mut project: Project =
            serde_json::from_value(json!({ "id": "p1", "name": "Shop" })).unwrap();

        assert_eq!(
            project.replace_badge(BadgeSlot::Two, BadgeValue::Category(CategoryBadge::Website)),
            Some(BadgeValue::Category(CategoryBadge::Uncategorized))
        );
        assert_eq!(
            project.replace_badge(BadgeSlot::Two, BadgeValue::Priority(PriorityBadge::High)),
            None
        );
        assert_eq!(project.badge2, CategoryBadge::Website);
    }
}
