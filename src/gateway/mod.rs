//! Table-oriented access to the backend: reads, writes and realtime
//! subscriptions, all issued as the session the gateway was built for.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

pub mod data;
pub mod error;
pub mod event_bus;
pub mod policy;
pub mod sqlite;

#[cfg(test)]
pub(crate) mod testing;

pub use data::{Change, ChangeKind, Filter, Row, RowId, Session, Table};
pub use error::{GatewayError, GatewayResult};
pub use event_bus::Subscription;
pub use sqlite::{SqliteBackend, SqliteGateway};

#[async_trait]
pub trait Gateway: Send + Sync {
    fn session(&self) -> Option<&Session>;

    async fn read(&self, table: Table, filter: &Filter) -> GatewayResult<Vec<Row>>;

    async fn insert(&self, table: Table, record: Row) -> GatewayResult<Row>;

    /// Inserts all records or none of them.
    async fn insert_many(&self, table: Table, records: Vec<Row>) -> GatewayResult<Vec<Row>>;

    async fn update(&self, table: Table, id: &str, patch: Row) -> GatewayResult<()>;

    async fn delete(&self, table: Table, id: &str) -> GatewayResult<()>;

    async fn count(&self, table: Table, filter: &Filter) -> GatewayResult<usize>;

    async fn subscribe(&self, table: Table, filter: Filter) -> GatewayResult<Subscription>;

    /// Standing subscriptions on the backend this gateway talks to.
    fn active_subscriptions(&self) -> usize;

    async fn read_one(&self, table: Table, filter: &Filter) -> GatewayResult<Option<Row>> {
        let mut rows = self.read(table, &filter.clone().limit(1)).await?;
        Ok(rows.pop())
    }

    fn user_id(&self) -> GatewayResult<&str> {
        self.session()
            .map(|s| s.user_id.as_str())
            .ok_or(GatewayError::Unauthenticated)
    }
}

pub fn to_row<T: Serialize>(record: &T) -> GatewayResult<Row> {
    match serde_json::to_value(record)? {
        Value::Object(map) => Ok(map),
        other => Err(GatewayError::Validation(format!(
            "expected a record, got {}",
            other
        ))),
    }
}

pub fn from_row<T: DeserializeOwned>(row: Row) -> GatewayResult<T> {
    Ok(serde_json::from_value(Value::Object(row))?)
}

/// Builds a patch from column/value pairs.
pub fn patch<const N: usize>(fields: [(&str, Value); N]) -> Row {
    fields
        .into_iter()
        .map(|(column, value)| (column.to_string(), value))
        .collect()
}

pub async fn read_records<T: DeserializeOwned>(
    gateway: &dyn Gateway,
    table: Table,
    filter: &Filter,
) -> GatewayResult<Vec<T>> {
    gateway
        .read(table, filter)
        .await?
        .into_iter()
        .map(from_row)
        .collect()
}

pub async fn read_record<T: DeserializeOwned>(
    gateway: &dyn Gateway,
    table: Table,
    filter: &Filter,
) -> GatewayResult<Option<T>> {
    gateway.read_one(table, filter).await?.map(from_row).transpose()
}

pub async fn insert_record<N: Serialize + Sync, T: DeserializeOwned>(
    gateway: &dyn Gateway,
    table: Table,
    record: &N,
) -> GatewayResult<T> {
    from_row(gateway.insert(table, to_row(record)?).await?)
}
