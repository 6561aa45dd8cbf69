//! Client-side state kept in step with the backend: per-view record stores,
//! optimistic edits with rollback, and realtime-fed lists.

pub mod optimistic;
pub mod realtime;
pub mod store;

pub use optimistic::{MutationError, OptimisticMutator};
pub use realtime::{Appender, FeedRecord, RealtimeFeed};
pub use store::{lock_store, snapshot, Entity, EntityStore, SharedStore};
