use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use super::data::{Change, ChangeKind, Filter, Row, Session, Table};
use super::error::{GatewayError, GatewayResult};
use super::event_bus::{EventBus, Subscription, Visibility};
use super::policy::{can_insert, can_read, can_update, can_write, Principal};
use super::Gateway;
use crate::data::{create_schema, DBConnection};

pub fn timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// The in-process backend: row documents in SQLite, row policies, sessions and
/// the realtime change feed. Gateways are cheap per-session views onto it.
pub struct SqliteBackend {
    db_connection: DBConnection,
    bus: Arc<EventBus>,
}

impl SqliteBackend {
    pub fn open(path: &Path) -> GatewayResult<Arc<SqliteBackend>> {
        SqliteBackend::from_connection(Connection::open(path)?)
    }

    pub fn in_memory() -> GatewayResult<Arc<SqliteBackend>> {
        SqliteBackend::from_connection(Connection::open_in_memory()?)
    }

    pub fn from_connection(connection: Connection) -> GatewayResult<Arc<SqliteBackend>> {
        create_schema(&connection)?;

        Ok(Arc::new(SqliteBackend {
            db_connection: Arc::new(Mutex::new(connection)),
            bus: EventBus::new(),
        }))
    }

    fn lock(&self) -> GatewayResult<MutexGuard<'_, Connection>> {
        Ok(self.db_connection.lock()?)
    }

    pub fn gateway(self: &Arc<Self>, session: Session) -> SqliteGateway {
        SqliteGateway {
            backend: self.clone(),
            principal: Principal::User(session.user_id.clone()),
            session: Some(session),
            offline: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn anonymous(self: &Arc<Self>) -> SqliteGateway {
        SqliteGateway {
            backend: self.clone(),
            principal: Principal::Anonymous,
            session: None,
            offline: Arc::new(AtomicBool::new(false)),
        }
    }

    /// A gateway that bypasses row policies, for trusted server-side work.
    pub fn service(self: &Arc<Self>) -> SqliteGateway {
        SqliteGateway {
            backend: self.clone(),
            principal: Principal::Service,
            session: None,
            offline: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn issue_session(&self, user_id: &str) -> GatewayResult<Session> {
        let token = Uuid::new_v4().simple().to_string();
        self.lock()?.execute(
            "INSERT INTO sessions VALUES (?1, ?2, ?3)",
            params![token, user_id, timestamp()],
        )?;

        Ok(Session {
            user_id: user_id.to_string(),
            access_token: token,
        })
    }

    pub fn authenticate(&self, token: &str) -> GatewayResult<Session> {
        let user_id = self
            .lock()?
            .query_row(
                "SELECT user_id FROM sessions WHERE token = (?1)",
                params![token],
                |row| row.get::<usize, String>(0),
            )
            .optional()?
            .ok_or(GatewayError::Unauthenticated)?;

        Ok(Session {
            user_id,
            access_token: token.to_string(),
        })
    }

    pub fn subscriber_count(&self) -> usize {
        self.bus.subscriber_count()
    }
}

fn load_rows(db_connection: &Connection, table: Table) -> GatewayResult<Vec<Row>> {
    let mut statement =
        db_connection.prepare("SELECT data FROM rows WHERE tbl = (?1) ORDER BY seq")?;
    let mut rows = statement.query(params![table.name()])?;

    let mut documents = vec![];
    while let Some(row) = rows.next()? {
        let data: String = row.get(0)?;
        documents.push(serde_json::from_str::<Row>(&data)?);
    }

    Ok(documents)
}

fn load_row(db_connection: &Connection, table: Table, id: &str) -> GatewayResult<Option<Row>> {
    let data = db_connection
        .query_row(
            "SELECT data FROM rows WHERE tbl = (?1) AND id = (?2)",
            params![table.name(), id],
            |row| row.get::<usize, String>(0),
        )
        .optional()?;

    match data {
        Some(data) => Ok(Some(serde_json::from_str(&data)?)),
        None => Ok(None),
    }
}

fn insert_row(
    db_connection: &Connection,
    principal: &Principal,
    table: Table,
    mut record: Row,
) -> GatewayResult<Row> {
    let id = match record.get("id").and_then(Value::as_str) {
        Some(id) => id.to_string(),
        None => Uuid::new_v4().to_string(),
    };
    record.insert("id".to_string(), Value::String(id.clone()));
    if record.get("created_at").map_or(true, Value::is_null) {
        record.insert("created_at".to_string(), Value::String(timestamp()));
    }

    if !can_insert(db_connection, principal, table, &record)? {
        return Err(GatewayError::NotFoundOrForbidden);
    }

    db_connection.execute(
        "INSERT INTO rows (tbl, id, data) VALUES (?1, ?2, ?3)",
        params![table.name(), id, serde_json::to_string(&record)?],
    )?;

    Ok(record)
}

/// Loads a row the principal may both see and modify.
fn writable_row(
    db_connection: &Connection,
    principal: &Principal,
    table: Table,
    id: &str,
) -> GatewayResult<Row> {
    let row = load_row(db_connection, table, id)?.ok_or(GatewayError::NotFoundOrForbidden)?;

    if can_read(db_connection, principal, table, &row)?
        && can_write(db_connection, principal, table, &row)?
    {
        Ok(row)
    } else {
        Err(GatewayError::NotFoundOrForbidden)
    }
}

#[derive(Clone)]
pub struct SqliteGateway {
    backend: Arc<SqliteBackend>,
    principal: Principal,
    session: Option<Session>,
    offline: Arc<AtomicBool>,
}

impl SqliteGateway {
    /// Simulates losing the connection: every call fails with a network error.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    fn connection(&self) -> GatewayResult<MutexGuard<'_, Connection>> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(GatewayError::Network("backend unreachable".to_string()));
        }
        self.backend.lock()
    }

    fn publish(&self, table: Table, kind: ChangeKind, row: Row) {
        debug!(table = %table, kind = ?kind, "publishing change");
        self.backend.bus.publish(Change { table, kind, row });
    }
}

#[async_trait]
impl Gateway for SqliteGateway {
    fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    async fn read(&self, table: Table, filter: &Filter) -> GatewayResult<Vec<Row>> {
        let db_connection = self.connection()?;

        let mut visible = vec![];
        for row in load_rows(&db_connection, table)? {
            if filter.matches(&row) && can_read(&db_connection, &self.principal, table, &row)? {
                visible.push(row);
            }
        }

        Ok(filter.arrange(visible))
    }

    async fn insert(&self, table: Table, record: Row) -> GatewayResult<Row> {
        let inserted = {
            let db_connection = self.connection()?;
            insert_row(&db_connection, &self.principal, table, record)?
        };

        self.publish(table, ChangeKind::Insert, inserted.clone());
        Ok(inserted)
    }

    async fn insert_many(&self, table: Table, records: Vec<Row>) -> GatewayResult<Vec<Row>> {
        let inserted = {
            let mut db_connection = self.connection()?;
            let transaction = db_connection.transaction()?;

            let mut inserted = vec![];
            for record in records {
                inserted.push(insert_row(&transaction, &self.principal, table, record)?);
            }

            transaction.commit()?;
            inserted
        };

        for row in inserted.iter() {
            self.publish(table, ChangeKind::Insert, row.clone());
        }
        Ok(inserted)
    }

    async fn update(&self, table: Table, id: &str, patch: Row) -> GatewayResult<()> {
        let updated = {
            let db_connection = self.connection()?;
            let mut row = writable_row(&db_connection, &self.principal, table, id)?;

            for (column, value) in patch {
                if column != "id" {
                    row.insert(column, value);
                }
            }

            // A patch may not hand the row to someone else or raise a role.
            if !can_update(&db_connection, &self.principal, table, &row)? {
                return Err(GatewayError::NotFoundOrForbidden);
            }

            db_connection.execute(
                "UPDATE rows SET data = (?1) WHERE tbl = (?2) AND id = (?3)",
                params![serde_json::to_string(&row)?, table.name(), id],
            )?;
            row
        };

        self.publish(table, ChangeKind::Update, updated);
        Ok(())
    }

    async fn delete(&self, table: Table, id: &str) -> GatewayResult<()> {
        let deleted = {
            let db_connection = self.connection()?;
            let row = writable_row(&db_connection, &self.principal, table, id)?;

            db_connection.execute(
                "DELETE FROM rows WHERE tbl = (?1) AND id = (?2)",
                params![table.name(), id],
            )?;
            row
        };

        self.publish(table, ChangeKind::Delete, deleted);
        Ok(())
    }

    async fn count(&self, table: Table, filter: &Filter) -> GatewayResult<usize> {
        Ok(self.read(table, filter).await?.len())
    }

    async fn subscribe(&self, table: Table, filter: Filter) -> GatewayResult<Subscription> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(GatewayError::Network("backend unreachable".to_string()));
        }
        if self.principal == Principal::Anonymous {
            return Err(GatewayError::Unauthenticated);
        }

        let backend = Arc::downgrade(&self.backend);
        let principal = self.principal.clone();
        let visible: Visibility = Arc::new(move |change: &Change| {
            let Some(backend) = backend.upgrade() else {
                return false;
            };
            let Ok(db_connection) = backend.lock() else {
                return false;
            };
            can_read(&db_connection, &principal, change.table, &change.row).unwrap_or(false)
        });

        Ok(self.backend.bus.connect(table, filter, visible))
    }

    fn active_subscriptions(&self) -> usize {
        self.backend.subscriber_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::{from_row, patch};
    use serde_json::json;

    fn record(value: Value) -> Row {
        match value {
            Value::Object(map) => map,
            _ => Row::new(),
        }
    }

    fn session_gateway(backend: &Arc<SqliteBackend>, user: &str) -> SqliteGateway {
        let session = backend.issue_session(user).unwrap();
        backend.gateway(session)
    }

    #[tokio::test]
    async fn owners_see_only_their_rows() {
        let backend = SqliteBackend::in_memory().unwrap();
        let alice = session_gateway(&backend, "alice");
        let bob = session_gateway(&backend, "bob");

        let task = alice
            .insert(Table::Tasks, record(json!({ "user_id": "alice", "text": "write brief" })))
            .await
            .unwrap();
        assert!(task["id"].as_str().is_some());
        assert!(task["created_at"].as_str().is_some());

        assert_eq!(alice.read(Table::Tasks, &Filter::new()).await.unwrap().len(), 1);
        assert!(bob.read(Table::Tasks, &Filter::new()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn foreign_writes_look_like_missing_rows() {
        let backend = SqliteBackend::in_memory().unwrap();
        let alice = session_gateway(&backend, "alice");
        let bob = session_gateway(&backend, "bob");

        let task = alice
            .insert(Table::Tasks, record(json!({ "user_id": "alice", "text": "x" })))
            .await
            .unwrap();
        let id = task["id"].as_str().unwrap();

        let update = bob
            .update(Table::Tasks, id, patch([("text", json!("hijacked"))]))
            .await;
        assert_eq!(update, Err(GatewayError::NotFoundOrForbidden));
        assert_eq!(
            bob.delete(Table::Tasks, "no-such-id").await,
            Err(GatewayError::NotFoundOrForbidden)
        );

        let insert_for_alice = bob
            .insert(Table::Tasks, record(json!({ "user_id": "alice", "text": "y" })))
            .await;
        assert_eq!(insert_for_alice, Err(GatewayError::NotFoundOrForbidden));

        let handover = alice
            .update(Table::Tasks, id, patch([("user_id", json!("bob"))]))
            .await;
        assert_eq!(handover, Err(GatewayError::NotFoundOrForbidden));
    }

    #[tokio::test]
    async fn duplicate_team_slug_is_a_conflict() {
        let backend = SqliteBackend::in_memory().unwrap();
        let alice = session_gateway(&backend, "alice");

        let team = record(json!({ "created_by": "alice", "name": "Core", "slug": "core" }));
        alice.insert(Table::Teams, team.clone()).await.unwrap();

        match alice.insert(Table::Teams, team).await {
            Err(GatewayError::Conflict(_)) => {}
            other => panic!("expected conflict, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn insert_many_is_all_or_nothing() {
        let backend = SqliteBackend::in_memory().unwrap();
        let alice = session_gateway(&backend, "alice");

        let result = alice
            .insert_many(
                Table::Tasks,
                vec![
                    record(json!({ "user_id": "alice", "text": "ok" })),
                    record(json!({ "user_id": "mallory", "text": "not yours" })),
                ],
            )
            .await;

        assert!(result.is_err());
        assert_eq!(alice.count(Table::Tasks, &Filter::new()).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn team_rows_are_visible_to_members_only() {
        let backend = SqliteBackend::in_memory().unwrap();
        let alice = session_gateway(&backend, "alice");
        let bob = session_gateway(&backend, "bob");

        let team = alice
            .insert(Table::Teams, record(json!({ "created_by": "alice", "name": "Core", "slug": "core" })))
            .await
            .unwrap();
        let team_id = team["id"].as_str().unwrap().to_string();
        alice
            .insert(
                Table::UserTeamMemberships,
                record(json!({ "team_id": team_id, "user_id": "alice", "role": "owner" })),
            )
            .await
            .unwrap();

        let claim = bob
            .insert(
                Table::UserTeamMemberships,
                record(json!({ "team_id": team_id, "user_id": "bob", "role": "owner" })),
            )
            .await;
        assert_eq!(claim, Err(GatewayError::NotFoundOrForbidden));

        alice
            .insert(
                Table::TeamMessages,
                record(json!({ "team_id": team_id, "user_id": "alice", "content": "hi" })),
            )
            .await
            .unwrap();
        assert!(bob.read(Table::TeamMessages, &Filter::new()).await.unwrap().is_empty());

        bob.insert(
            Table::UserTeamMemberships,
            record(json!({ "team_id": team_id, "user_id": "bob", "role": "member" })),
        )
        .await
        .unwrap();
        assert_eq!(bob.read(Table::TeamMessages, &Filter::new()).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn only_the_team_creator_hands_out_roles() {
        let backend = SqliteBackend::in_memory().unwrap();
        let alice = session_gateway(&backend, "alice");
        let bob = session_gateway(&backend, "bob");

        let team = alice
            .insert(Table::Teams, record(json!({ "created_by": "alice", "name": "Core", "slug": "core" })))
            .await
            .unwrap();
        let team_id = team["id"].as_str().unwrap().to_string();

        let self_promoted = bob
            .insert(
                Table::UserTeamMemberships,
                record(json!({ "team_id": team_id, "user_id": "bob", "role": "admin" })),
            )
            .await;
        assert_eq!(self_promoted, Err(GatewayError::NotFoundOrForbidden));

        let membership = bob
            .insert(
                Table::UserTeamMemberships,
                record(json!({ "team_id": team_id, "user_id": "bob", "role": "member" })),
            )
            .await
            .unwrap();
        let membership_id = membership["id"].as_str().unwrap().to_string();

        let raised = bob
            .update(Table::UserTeamMemberships, &membership_id, patch([("role", json!("owner"))]))
            .await;
        assert_eq!(raised, Err(GatewayError::NotFoundOrForbidden));

        alice
            .insert(
                Table::UserTeamMemberships,
                record(json!({ "team_id": team_id, "user_id": "alice", "role": "admin" })),
            )
            .await
            .unwrap();
        alice
            .update(Table::UserTeamMemberships, &membership_id, patch([("role", json!("admin"))]))
            .await
            .unwrap();

        let rows = backend
            .service()
            .read(Table::UserTeamMemberships, &Filter::new().eq("user_id", "bob"))
            .await
            .unwrap();
        assert_eq!(rows[0]["role"], json!("admin"));
    }

    #[tokio::test]
    async fn anonymous_callers_may_only_submit_intake() {
        let backend = SqliteBackend::in_memory().unwrap();
        let anonymous = backend.anonymous();

        anonymous
            .insert(Table::ClientRequests, record(json!({ "name": "Jane", "email": "jane@x.com" })))
            .await
            .unwrap();
        assert!(anonymous
            .read(Table::ClientRequests, &Filter::new())
            .await
            .unwrap()
            .is_empty());
        assert_eq!(
            backend
                .service()
                .count(Table::ClientRequests, &Filter::new())
                .await
                .unwrap(),
            1
        );
        assert_eq!(
            anonymous.user_id().err(),
            Some(GatewayError::Unauthenticated)
        );
    }

    #[tokio::test]
    async fn subscriptions_receive_visible_changes_and_release_on_drop() {
        let backend = SqliteBackend::in_memory().unwrap();
        let alice = session_gateway(&backend, "alice");
        let bob = session_gateway(&backend, "bob");

        let mut alice_feed = alice.subscribe(Table::Tasks, Filter::new()).await.unwrap();
        let mut bob_feed = bob.subscribe(Table::Tasks, Filter::new()).await.unwrap();
        assert_eq!(alice.active_subscriptions(), 2);

        alice
            .insert(Table::Tasks, record(json!({ "user_id": "alice", "text": "mine" })))
            .await
            .unwrap();

        let change = alice_feed.recv().await.unwrap();
        assert_eq!(change.kind, ChangeKind::Insert);
        assert_eq!(from_row::<Value>(change.row).unwrap()["text"], json!("mine"));
        assert!(bob_feed.try_recv().is_none());

        drop(alice_feed);
        drop(bob_feed);
        assert_eq!(alice.active_subscriptions(), 0);
    }

    #[tokio::test]
    async fn offline_gateway_reports_network_errors() {
        let backend = SqliteBackend::in_memory().unwrap();
        let alice = session_gateway(&backend, "alice");
        alice.set_offline(true);

        match alice.read(Table::Tasks, &Filter::new()).await {
            Err(GatewayError::Network(_)) => {}
            other => panic!("expected network error, got {:?}", other),
        }
    }

    #[test]
    fn sessions_round_trip_through_tokens() {
        let backend = SqliteBackend::in_memory().unwrap();
        let session = backend.issue_session("alice").unwrap();

        assert_eq!(backend.authenticate(&session.access_token).unwrap(), session);
        assert_eq!(
            backend.authenticate("forged"),
            Err(GatewayError::Unauthenticated)
        );
    }
}
