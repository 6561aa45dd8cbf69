use async_trait::async_trait;
use tokio::sync::oneshot;

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use super::{
    Filter, Gateway, GatewayError, GatewayResult, Row, Session, SqliteBackend, SqliteGateway,
    Subscription, Table,
};

/// Wraps a real gateway and fails selected writes on demand.
pub(crate) struct FlakyGateway {
    inner: SqliteGateway,
    failing_updates: Mutex<HashSet<String>>,
    failing_inserts: Mutex<HashSet<Table>>,
    failing_deletes: Mutex<HashSet<Table>>,
    held_inserts: Mutex<HashMap<Table, (oneshot::Sender<()>, oneshot::Receiver<()>)>>,
}

impl FlakyGateway {
    pub(crate) fn new(inner: SqliteGateway) -> FlakyGateway {
        FlakyGateway {
            inner,
            failing_updates: Mutex::new(HashSet::new()),
            failing_inserts: Mutex::new(HashSet::new()),
            failing_deletes: Mutex::new(HashSet::new()),
            held_inserts: Mutex::new(HashMap::new()),
        }
    }

    pub(crate) fn fail_updates_to(&self, id: &str) {
        self.failing_updates.lock().unwrap().insert(id.to_string());
    }

    pub(crate) fn fail_inserts_into(&self, table: Table) {
        self.failing_inserts.lock().unwrap().insert(table);
    }

    pub(crate) fn fail_deletes_from(&self, table: Table) {
        self.failing_deletes.lock().unwrap().insert(table);
    }

    /// Parks the next insert into `table` before it reaches the backend. The
    /// first receiver fires once the insert is parked; sending on the returned
    /// sender lets it through.
    pub(crate) fn hold_inserts_into(
        &self,
        table: Table,
    ) -> (oneshot::Receiver<()>, oneshot::Sender<()>) {
        let (entered_tx, entered_rx) = oneshot::channel();
        let (release_tx, release_rx) = oneshot::channel();
        self.held_inserts
            .lock()
            .unwrap()
            .insert(table, (entered_tx, release_rx));

        (entered_rx, release_tx)
    }

    fn injected() -> GatewayError {
        GatewayError::Network("injected failure".to_string())
    }
}

#[async_trait]
impl Gateway for FlakyGateway {
    fn session(&self) -> Option<&Session> {
        self.inner.session()
    }

    async fn read(&self, table: Table, filter: &Filter) -> GatewayResult<Vec<Row>> {
        self.inner.read(table, filter).await
    }

    async fn insert(&self, table: Table, record: Row) -> GatewayResult<Row> {
        if self.failing_inserts.lock().unwrap().contains(&table) {
            return Err(FlakyGateway::injected());
        }
        let held = self.held_inserts.lock().unwrap().remove(&table);
        if let Some((entered, release)) = held {
            let _ = entered.send(());
            let _ = release.await;
        }
        self.inner.insert(table, record).await
    }

    async fn insert_many(&self, table: Table, records: Vec<Row>) -> GatewayResult<Vec<Row>> {
        if self.failing_inserts.lock().unwrap().contains(&table) {
            return Err(FlakyGateway::injected());
        }
        self.inner.insert_many(table, records).await
    }

    async fn update(&self, table: Table, id: &str, patch: Row) -> GatewayResult<()> {
        if self.failing_updates.lock().unwrap().contains(id) {
            return Err(FlakyGateway::injected());
        }
        self.inner.update(table, id, patch).await
    }

    async fn delete(&self, table: Table, id: &str) -> GatewayResult<()> {
        if self.failing_deletes.lock().unwrap().contains(&table) {
            return Err(FlakyGateway::injected());
        }
        self.inner.delete(table, id).await
    }

    async fn count(&self, table: Table, filter: &Filter) -> GatewayResult<usize> {
        self.inner.count(table, filter).await
    }

    async fn subscribe(&self, table: Table, filter: Filter) -> GatewayResult<Subscription> {
        self.inner.subscribe(table, filter).await
    }

    fn active_subscriptions(&self) -> usize {
        self.inner.active_subscriptions()
    }
}

/// A backend plus a signed-in flaky gateway for `user`.
pub(crate) fn flaky_session(user: &str) -> (Arc<SqliteBackend>, Arc<FlakyGateway>) {
    let backend = SqliteBackend::in_memory().unwrap();
    let session = backend.issue_session(user).unwrap();
    let gateway = Arc::new(FlakyGateway::new(backend.gateway(session)));
    (backend, gateway)
}
