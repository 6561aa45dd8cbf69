use serde::{Deserialize, Serialize};

use std::collections::HashMap;

use crate::gateway::{read_records, Filter, Gateway, GatewayResult, Table};

pub const UNKNOWN_USER: &str = "Unknown User";

/// Public profile of a user. Readable by everyone; ids equal user ids.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct Profile {
    pub id: String,
    pub display_name: Option<String>,
    pub full_name: Option<String>,
    pub username: Option<String>,
    pub avatar_url: Option<String>,
    pub bio: Option<String>,
    pub website_url: Option<String>,
}

impl Profile {
    /// The first non-empty of display name, full name and username.
    pub fn shown_name(&self) -> &str {
        [&self.display_name, &self.full_name, &self.username]
            .into_iter()
            .flatten()
            .map(|name| name.trim())
            .find(|name| !name.is_empty())
            .unwrap_or(UNKNOWN_USER)
    }
}

/// Profiles for `user_ids`, keyed by id. Users without a profile are absent.
pub async fn profiles_for(
    gateway: &dyn Gateway,
    user_ids: &[&str],
) -> GatewayResult<HashMap<String, Profile>> {
    if user_ids.is_empty() {
        return Ok(HashMap::new());
    }
    let alternatives = user_ids
        .iter()
        .map(|id| Filter::new().eq("id", *id))
        .collect();

    let profiles: Vec<Profile> =
        read_records(gateway, Table::Profiles, &Filter::new().or(alternatives)).await?;

    Ok(profiles.into_iter().map(|p| (p.id.clone(), p)).collect())
}
