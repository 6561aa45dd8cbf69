use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError};
use tracing::{debug, warn};

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};

use super::data::{Change, Filter, Table};

pub type SubscriberId = u64;
pub type Visibility = Arc<dyn Fn(&Change) -> bool + Send + Sync>;

const CHANNEL_CAPACITY: usize = 256;

/// Fans every committed change out to the connected subscriptions.
pub struct EventBus {
    sender: broadcast::Sender<Change>,
    subscribers: Mutex<HashSet<SubscriberId>>,
    next_id: AtomicU64,
}

impl EventBus {
    pub fn new() -> Arc<EventBus> {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);

        Arc::new(EventBus {
            sender,
            subscribers: Mutex::new(HashSet::new()),
            next_id: AtomicU64::new(1),
        })
    }

    pub fn publish(&self, change: Change) {
        // No receivers is not an error: nobody is watching this table.
        let _ = self.sender.send(change);
    }

    pub fn connect(self: &Arc<Self>, table: Table, filter: Filter, visible: Visibility) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id);
        debug!(subscriber = id, table = %table, "realtime subscriber connected");

        Subscription {
            id,
            table,
            filter,
            visible,
            receiver: self.sender.subscribe(),
            bus: Arc::downgrade(self),
        }
    }

    fn disconnected(&self, id: SubscriberId) {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id);
        debug!(subscriber = id, "realtime subscriber disconnected");
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

/// A standing subscription to one table, narrowed by a filter and by what the
/// subscribing session may read. Dropping it disconnects from the bus.
pub struct Subscription {
    id: SubscriberId,
    table: Table,
    filter: Filter,
    visible: Visibility,
    receiver: broadcast::Receiver<Change>,
    bus: Weak<EventBus>,
}

impl Subscription {
    pub fn table(&self) -> Table {
        self.table
    }

    fn wants(&self, change: &Change) -> bool {
        change.table == self.table && self.filter.matches(&change.row) && (self.visible)(change)
    }

    /// Waits for the next relevant change. `None` once the backend has shut down.
    pub async fn recv(&mut self) -> Option<Change> {
        loop {
            match self.receiver.recv().await {
                Ok(change) => {
                    if self.wants(&change) {
                        return Some(change);
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(table = %self.table, skipped, "realtime subscription lagged");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Returns an already delivered change without waiting.
    pub fn try_recv(&mut self) -> Option<Change> {
        loop {
            match self.receiver.try_recv() {
                Ok(change) => {
                    if self.wants(&change) {
                        return Some(change);
                    }
                }
                Err(TryRecvError::Lagged(skipped)) => {
                    warn!(table = %self.table, skipped, "realtime subscription lagged");
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => return None,
            }
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(bus) = self.bus.upgrade() {
            bus.disconnected(self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::data::{ChangeKind, Row};
    use serde_json::json;

    fn change(table: Table, team: &str) -> Change {
        let mut row = Row::new();
        row.insert("team_id".to_string(), json!(team));
        Change {
            table,
            kind: ChangeKind::Insert,
            row,
        }
    }

    #[test]
    fn dropping_a_subscription_disconnects_it() {
        let bus = EventBus::new();
        let everything: Visibility = Arc::new(|_| true);

        let first = bus.connect(Table::TeamMessages, Filter::new(), everything.clone());
        let second = bus.connect(Table::Teams, Filter::new(), everything);
        assert_eq!(bus.subscriber_count(), 2);

        drop(first);
        assert_eq!(bus.subscriber_count(), 1);
        drop(second);
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn delivers_only_matching_changes() {
        let bus = EventBus::new();
        let mut subscription = bus.connect(
            Table::TeamMessages,
            Filter::new().eq("team_id", "a"),
            Arc::new(|_| true),
        );

        bus.publish(change(Table::TeamMessages, "b"));
        bus.publish(change(Table::Teams, "a"));
        bus.publish(change(Table::TeamMessages, "a"));

        let delivered = subscription.try_recv().map(|c| c.row["team_id"].clone());
        assert_eq!(delivered, Some(json!("a")));
        assert!(subscription.try_recv().is_none());
    }
}
