use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::gateway::{from_row, read_record, Filter, Gateway, GatewayError, GatewayResult, Row, Table};
use crate::profiles::{Profile, UNKNOWN_USER};
use crate::sync::{Entity, FeedRecord};

/// A team chat message with its sender's public name and avatar.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct TeamMessage {
    pub id: String,
    pub team_id: String,
    pub user_id: String,
    pub content: String,
    pub created_at: Option<String>,
    #[serde(default)]
    pub sender_name: String,
    #[serde(default)]
    pub sender_avatar_url: Option<String>,
}

impl Entity for TeamMessage {
    fn id(&self) -> &str {
        &self.id
    }
}

#[async_trait]
impl FeedRecord for TeamMessage {
    async fn resolve(gateway: &dyn Gateway, row: Row) -> GatewayResult<TeamMessage> {
        let mut message: TeamMessage = from_row(row)?;
        let sender: Option<Profile> = read_record(
            gateway,
            Table::Profiles,
            &Filter::new().eq("id", message.user_id.as_str()),
        )
        .await?;

        message.sender_name = sender
            .as_ref()
            .map_or(UNKNOWN_USER, |p| p.shown_name())
            .to_string();
        message.sender_avatar_url = sender.and_then(|p| p.avatar_url);
        Ok(message)
    }
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct NewTeamMessage {
    pub team_id: String,
    pub user_id: String,
    pub content: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct DirectMessage {
    pub id: String,
    pub sender_id: String,
    pub receiver_id: String,
    pub content: String,
    #[serde(default)]
    pub is_read: bool,
    pub created_at: Option<String>,
}

impl Entity for DirectMessage {
    fn id(&self) -> &str {
        &self.id
    }
}

#[async_trait]
impl FeedRecord for DirectMessage {
    async fn resolve(_gateway: &dyn Gateway, row: Row) -> GatewayResult<DirectMessage> {
        from_row(row)
    }
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct NewDirectMessage {
    pub sender_id: String,
    pub receiver_id: String,
    pub content: String,
    pub is_read: bool,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ChatError {
    #[error("Message cannot be empty")]
    Empty,
    #[error(transparent)]
    Gateway(#[from] GatewayError),
}
