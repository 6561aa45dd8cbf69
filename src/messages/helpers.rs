use serde_json::Value;
use tracing::{debug, info};

use std::sync::Arc;

use crate::gateway::{
    insert_record, patch, read_records, to_row, ChangeKind, Filter, Gateway, GatewayResult,
    Table,
};
use crate::sync::{Appender, FeedRecord, RealtimeFeed};

use super::data::*;

fn message_body(body: &str) -> Result<&str, ChatError> {
    let body = body.trim();
    if body.is_empty() {
        Err(ChatError::Empty)
    } else {
        Ok(body)
    }
}

/// Posts to a team chat and shows the message in the chat behind
/// `appender`, if that chat is still open.
pub async fn send_team_message(
    gateway: &dyn Gateway,
    team_id: &str,
    body: &str,
    appender: &Appender<TeamMessage>,
) -> Result<TeamMessage, ChatError> {
    let body = message_body(body)?;
    let message = NewTeamMessage {
        team_id: team_id.to_string(),
        user_id: gateway.user_id()?.to_string(),
        content: body.to_string(),
    };

    let row = gateway
        .insert(Table::TeamMessages, to_row(&message)?)
        .await?;
    let sent = TeamMessage::resolve(gateway, row).await?;

    if appender.is_attached() {
        appender.append(sent.clone());
    } else {
        debug!(team_id, "chat closed before the send completed");
    }
    Ok(sent)
}

/// One team's chat, oldest message first.
pub struct TeamChat {
    team_id: String,
    feed: RealtimeFeed<TeamMessage>,
}

impl TeamChat {
    pub async fn open(gateway: Arc<dyn Gateway>, team_id: &str) -> GatewayResult<TeamChat> {
        let feed = RealtimeFeed::open(
            gateway,
            Table::TeamMessages,
            Filter::new().eq("team_id", team_id).order_asc("created_at"),
        )
        .await?;

        Ok(TeamChat {
            team_id: team_id.to_string(),
            feed,
        })
    }

    pub fn messages(&self) -> Vec<TeamMessage> {
        self.feed.records()
    }

    pub fn appender(&self) -> Appender<TeamMessage> {
        self.feed.appender()
    }

    pub async fn send(&self, body: &str) -> Result<TeamMessage, ChatError> {
        send_team_message(
            self.feed.gateway().as_ref(),
            &self.team_id,
            body,
            &self.feed.appender(),
        )
        .await
    }

    pub async fn next_change(&mut self) -> GatewayResult<Option<ChangeKind>> {
        self.feed.next_change().await
    }

    pub async fn drain(&mut self) -> GatewayResult<usize> {
        self.feed.drain().await
    }
}

fn between(me: &str, other: &str) -> Filter {
    Filter::new()
        .or(vec![
            Filter::new().eq("sender_id", me).eq("receiver_id", other),
            Filter::new().eq("sender_id", other).eq("receiver_id", me),
        ])
        .order_asc("created_at")
}

pub async fn send_direct_message(
    gateway: &dyn Gateway,
    receiver_id: &str,
    body: &str,
) -> Result<DirectMessage, ChatError> {
    let body = message_body(body)?;
    let message = NewDirectMessage {
        sender_id: gateway.user_id()?.to_string(),
        receiver_id: receiver_id.to_string(),
        content: body.to_string(),
        is_read: false,
    };

    let sent: DirectMessage = insert_record(gateway, Table::DirectMessages, &message).await?;
    info!(message_id = %sent.id, "sent direct message");
    Ok(sent)
}

/// Both directions of the thread with `other`, oldest first.
pub async fn conversation(gateway: &dyn Gateway, other: &str) -> GatewayResult<Vec<DirectMessage>> {
    let me = gateway.user_id()?;
    read_records(gateway, Table::DirectMessages, &between(me, other)).await
}

/// A live view of the thread with `other`.
pub async fn open_conversation(
    gateway: Arc<dyn Gateway>,
    other: &str,
) -> GatewayResult<RealtimeFeed<DirectMessage>> {
    let filter = between(gateway.user_id()?, other);
    RealtimeFeed::open(gateway, Table::DirectMessages, filter).await
}

pub async fn mark_read(gateway: &dyn Gateway, message_id: &str) -> GatewayResult<()> {
    gateway
        .update(
            Table::DirectMessages,
            message_id,
            patch([("is_read", Value::Bool(true))]),
        )
        .await
}

/// Marks every unread message from `other` to the session user as read.
pub async fn mark_conversation_read(gateway: &dyn Gateway, other: &str) -> GatewayResult<usize> {
    let unread: Vec<DirectMessage> = read_records(
        gateway,
        Table::DirectMessages,
        &Filter::new()
            .eq("sender_id", other)
            .eq("receiver_id", gateway.user_id()?)
            .eq("is_read", false),
    )
    .await?;

    for message in unread.iter() {
        mark_read(gateway, &message.id).await?;
    }
    Ok(unread.len())
}

/// Messages addressed to the session user, with a live unread count.
pub struct Inbox {
    feed: RealtimeFeed<DirectMessage>,
}

impl Inbox {
    pub async fn open(gateway: Arc<dyn Gateway>) -> GatewayResult<Inbox> {
        let me = gateway.user_id()?.to_string();
        let received = Filter::new().eq("receiver_id", me.as_str());

        let mut feed = RealtimeFeed::open(
            gateway,
            Table::DirectMessages,
            received.clone().order_asc("created_at"),
        )
        .await?;
        feed.track_count(received.eq("is_read", false)).await?;

        Ok(Inbox { feed })
    }

    pub fn messages(&self) -> Vec<DirectMessage> {
        self.feed.records()
    }

    pub fn unread(&self) -> usize {
        self.feed.count().unwrap_or_default()
    }

    pub async fn next_change(&mut self) -> GatewayResult<Option<ChangeKind>> {
        self.feed.next_change().await
    }

    pub async fn drain(&mut self) -> GatewayResult<usize> {
        self.feed.drain().await
    }
}
