use async_trait::async_trait;
use tracing::debug;

use std::sync::{Arc, Mutex, Weak};

use super::store::{lock_store, snapshot, Entity, EntityStore, SharedStore};
use crate::gateway::{Change, ChangeKind, Filter, Gateway, GatewayResult, Row, Subscription, Table};

/// A record a realtime feed can build from a raw row, looking up whatever
/// foreign data it displays (a sender's profile, say).
#[async_trait]
pub trait FeedRecord: Entity + Sized {
    async fn resolve(gateway: &dyn Gateway, row: Row) -> GatewayResult<Self>;
}

/// A list kept in sync with one table: seeded by a full read, then extended
/// by insert notifications in the order the change feed delivers them.
///
/// Delivery order is not corrected; a transport that reorders inserts shows
/// them reordered.
///
/// The feed owns its subscription, so dropping the feed releases it.
pub struct RealtimeFeed<T> {
    gateway: Arc<dyn Gateway>,
    table: Table,
    store: SharedStore<T>,
    subscription: Subscription,
    count_filter: Option<Filter>,
    count: Option<usize>,
}

impl<T: FeedRecord> RealtimeFeed<T> {
    pub async fn open(
        gateway: Arc<dyn Gateway>,
        table: Table,
        filter: Filter,
    ) -> GatewayResult<RealtimeFeed<T>> {
        // Subscribe before seeding so rows inserted during the read are not lost.
        let subscription = gateway.subscribe(table, filter.clone()).await?;

        let mut records = vec![];
        for row in gateway.read(table, &filter).await? {
            records.push(T::resolve(gateway.as_ref(), row).await?);
        }

        Ok(RealtimeFeed {
            gateway,
            table,
            store: EntityStore::shared(records),
            subscription,
            count_filter: None,
            count: None,
        })
    }

    /// Keeps an aggregate count of rows matching `filter`, re-queried after
    /// every notification rather than patched in place.
    pub async fn track_count(&mut self, filter: Filter) -> GatewayResult<usize> {
        let count = self.gateway.count(self.table, &filter).await?;
        self.count_filter = Some(filter);
        self.count = Some(count);
        Ok(count)
    }

    pub fn count(&self) -> Option<usize> {
        self.count
    }

    pub fn store(&self) -> &SharedStore<T> {
        &self.store
    }

    pub fn records(&self) -> Vec<T> {
        snapshot(&self.store)
    }

    pub fn gateway(&self) -> &Arc<dyn Gateway> {
        &self.gateway
    }

    pub fn appender(&self) -> Appender<T> {
        Appender {
            store: Arc::downgrade(&self.store),
        }
    }

    /// Waits for the next notification and applies it. `None` once the change
    /// feed has closed.
    pub async fn next_change(&mut self) -> GatewayResult<Option<ChangeKind>> {
        match self.subscription.recv().await {
            Some(change) => self.apply(change).await.map(Some),
            None => Ok(None),
        }
    }

    /// Applies every notification already delivered, without waiting.
    pub async fn drain(&mut self) -> GatewayResult<usize> {
        let mut applied = 0;
        while let Some(change) = self.subscription.try_recv() {
            self.apply(change).await?;
            applied += 1;
        }
        Ok(applied)
    }

    async fn apply(&mut self, change: Change) -> GatewayResult<ChangeKind> {
        if change.kind == ChangeKind::Insert {
            let record = T::resolve(self.gateway.as_ref(), change.row).await?;
            if !append(&self.store, record) {
                debug!(table = %self.table, "insert already present, skipping");
            }
        }

        if let Some(filter) = &self.count_filter {
            self.count = Some(self.gateway.count(self.table, filter).await?);
        }

        Ok(change.kind)
    }

    /// Ends the feed, releasing its subscription.
    pub fn close(self) {}
}

/// A weak handle for appending to a feed's list from outside the feed, such
/// as after a local send. Appends are ignored once the feed is gone.
pub struct Appender<T> {
    store: Weak<Mutex<EntityStore<T>>>,
}

impl<T> Clone for Appender<T> {
    fn clone(&self) -> Self {
        Appender {
            store: self.store.clone(),
        }
    }
}

impl<T: Entity> Appender<T> {
    /// True if the record was added; false if it was already listed or the
    /// feed has closed.
    pub fn append(&self, record: T) -> bool {
        match self.store.upgrade() {
            Some(store) => append(&store, record),
            None => false,
        }
    }

    pub fn is_attached(&self) -> bool {
        self.store.strong_count() > 0
    }
}

fn append<T: Entity>(store: &SharedStore<T>, record: T) -> bool {
    let mut store = lock_store(store);
    if store.contains(record.id()) {
        return false;
    }
    store.push(record);
    true
}
