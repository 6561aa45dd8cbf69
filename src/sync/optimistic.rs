use thiserror::Error;
use tracing::{debug, warn};

use std::future::Future;
use std::sync::{Arc, Mutex, Weak};

use super::store::{lock_store, Entity, EntityStore, SharedStore};
use crate::gateway::{GatewayError, GatewayResult};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MutationError {
    #[error("record {0} is already being saved")]
    Busy(String),
    #[error("record {0} is not loaded")]
    Missing(String),
    #[error("{0}")]
    Invalid(String),
    #[error(transparent)]
    Rejected(#[from] GatewayError),
    #[error("the view was closed")]
    Detached,
}

impl MutationError {
    pub fn user_message(&self) -> String {
        match self {
            MutationError::Rejected(e) => e.user_message(),
            other => other.to_string(),
        }
    }
}

/// Applies edits to a view's store immediately, writes them through, and
/// undoes them if the write fails.
///
/// The mutator only holds a weak reference to the store: once the owning
/// view is gone, results of writes still in flight are discarded.
pub struct OptimisticMutator<T> {
    store: Weak<Mutex<EntityStore<T>>>,
}

impl<T> Clone for OptimisticMutator<T> {
    fn clone(&self) -> Self {
        OptimisticMutator {
            store: self.store.clone(),
        }
    }
}

impl<T: Entity> OptimisticMutator<T> {
    pub fn new(store: &SharedStore<T>) -> OptimisticMutator<T> {
        OptimisticMutator {
            store: Arc::downgrade(store),
        }
    }

    /// `apply` edits the record and returns what `rollback` needs to undo it;
    /// `commit` receives the edited record and performs the remote write.
    ///
    /// While the write is in flight the record is marked updating and further
    /// edits to it are refused with `Busy`. Other records are unaffected.
    pub async fn mutate<U, A, C, Fut, R>(
        &self,
        id: &str,
        apply: A,
        commit: C,
        rollback: R,
    ) -> Result<(), MutationError>
    where
        A: FnOnce(&mut T) -> U,
        C: FnOnce(T) -> Fut,
        Fut: Future<Output = GatewayResult<()>>,
        R: FnOnce(&mut T, U),
    {
        let (undo, edited) = {
            let shared = self.store.upgrade().ok_or(MutationError::Detached)?;
            let mut store = lock_store(&shared);

            if store.is_updating(id) {
                return Err(MutationError::Busy(id.to_string()));
            }
            let record = store
                .get_mut(id)
                .ok_or_else(|| MutationError::Missing(id.to_string()))?;
            let undo = apply(record);
            let edited = record.clone();

            store.begin_update(id);
            store.clear_error(id);
            (undo, edited)
        };

        let result = commit(edited).await;

        let Some(shared) = self.store.upgrade() else {
            debug!(record = id, "view closed before the write completed");
            return result.map_err(MutationError::from);
        };
        let mut store = lock_store(&shared);
        store.finish_update(id);

        match result {
            Ok(()) => Ok(()),
            Err(e) => {
                if let Some(record) = store.get_mut(id) {
                    rollback(record, undo);
                }
                store.set_error(id, e.user_message());
                warn!(record = id, error = %e, "optimistic update rolled back");
                Err(e.into())
            }
        }
    }

    /// Single-field edit: `lens` selects the field, the previous value is
    /// restored if the write fails.
    pub async fn mutate_field<V, L, C, Fut>(
        &self,
        id: &str,
        lens: L,
        value: V,
        commit: C,
    ) -> Result<(), MutationError>
    where
        L: Fn(&mut T) -> &mut V,
        C: FnOnce(T) -> Fut,
        Fut: Future<Output = GatewayResult<()>>,
    {
        let lens = &lens;
        self.mutate(
            id,
            move |record| std::mem::replace(lens(record), value),
            commit,
            move |record, previous| *lens(record) = previous,
        )
        .await
    }

    /// Removes the record at once; puts it back at its old position if the
    /// delete fails.
    pub async fn remove<C, Fut>(&self, id: &str, commit: C) -> Result<T, MutationError>
    where
        C: FnOnce() -> Fut,
        Fut: Future<Output = GatewayResult<()>>,
    {
        let (index, record) = {
            let shared = self.store.upgrade().ok_or(MutationError::Detached)?;
            let mut store = lock_store(&shared);

            if store.is_updating(id) {
                return Err(MutationError::Busy(id.to_string()));
            }
            let removed = store
                .remove(id)
                .ok_or_else(|| MutationError::Missing(id.to_string()))?;

            store.begin_update(id);
            store.clear_error(id);
            removed
        };

        let result = commit().await;

        let Some(shared) = self.store.upgrade() else {
            debug!(record = id, "view closed before the delete completed");
            return result.map(|()| record).map_err(MutationError::from);
        };
        let mut store = lock_store(&shared);
        store.finish_update(id);

        match result {
            Ok(()) => Ok(record),
            Err(e) => {
                store.insert_at(index, record);
                store.set_error(id, e.user_message());
                warn!(record = id, error = %e, "optimistic delete rolled back");
                Err(e.into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::store::snapshot;
    use tokio::sync::oneshot;

    #[derive(Debug, Clone, PartialEq)]
    struct Card {
        id: String,
        label: String,
    }

    impl Entity for Card {
        fn id(&self) -> &str {
            &self.id
        }
    }

    fn card(id: &str, label: &str) -> Card {
        Card {
            id: id.to_string(),
            label: label.to_string(),
        }
    }

    fn offline() -> GatewayError {
        GatewayError::Network("offline".to_string())
    }

    #[tokio::test]
    async fn successful_write_keeps_the_new_value() {
        let store = EntityStore::shared(vec![card("a", "old")]);
        let mutator = OptimisticMutator::new(&store);

        let result = mutator
            .mutate_field(
                "a",
                |c: &mut Card| &mut c.label,
                "new".to_string(),
                |edited| async move {
                    assert_eq!(edited.label, "new");
                    Ok(())
                },
            )
            .await;

        assert_eq!(result, Ok(()));
        assert_eq!(snapshot(&store), vec![card("a", "new")]);
        assert!(!lock_store(&store).is_updating("a"));
    }

    #[tokio::test]
    async fn failed_write_restores_the_previous_value() {
        let store = EntityStore::shared(vec![card("a", "old")]);
        let mutator = OptimisticMutator::new(&store);

        let result = mutator
            .mutate_field(
                "a",
                |c: &mut Card| &mut c.label,
                "new".to_string(),
                |_| async { Err(offline()) },
            )
            .await;

        assert_eq!(result, Err(MutationError::Rejected(offline())));
        assert_eq!(snapshot(&store), vec![card("a", "old")]);

        let store = lock_store(&store);
        assert!(!store.is_updating("a"));
        assert_eq!(store.error_for("a"), Some(offline().user_message().as_str()));
    }

    #[tokio::test]
    async fn a_failure_on_one_record_leaves_others_alone() {
        let store = EntityStore::shared(vec![card("a", "a0"), card("b", "b0")]);
        let mutator = OptimisticMutator::new(&store);

        mutator
            .mutate_field("b", |c: &mut Card| &mut c.label, "b1".to_string(), |_| async {
                Ok(())
            })
            .await
            .unwrap();
        let failed = mutator
            .mutate_field("a", |c: &mut Card| &mut c.label, "a1".to_string(), |_| async {
                Err(offline())
            })
            .await;

        assert!(failed.is_err());
        assert_eq!(snapshot(&store), vec![card("a", "a0"), card("b", "b1")]);
        assert_eq!(lock_store(&store).error_for("b"), None);
    }

    #[tokio::test]
    async fn edits_to_a_record_in_flight_are_refused() {
        let store = EntityStore::shared(vec![card("a", "old"), card("b", "other")]);
        let mutator = OptimisticMutator::new(&store);
        let (release, released) = oneshot::channel::<GatewayResult<()>>();

        let first = {
            let mutator = mutator.clone();
            tokio::spawn(async move {
                mutator
                    .mutate_field("a", |c: &mut Card| &mut c.label, "first".to_string(), |_| async move {
                        released.await.unwrap_or(Err(offline()))
                    })
                    .await
            })
        };
        for _ in 0..16 {
            if lock_store(&store).is_updating("a") {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert!(lock_store(&store).is_updating("a"));

        let second = mutator
            .mutate_field("a", |c: &mut Card| &mut c.label, "second".to_string(), |_| async {
                Ok(())
            })
            .await;
        assert_eq!(second, Err(MutationError::Busy("a".to_string())));

        let other = mutator
            .mutate_field("b", |c: &mut Card| &mut c.label, "edited".to_string(), |_| async {
                Ok(())
            })
            .await;
        assert_eq!(other, Ok(()));

        release.send(Ok(())).unwrap();
        assert_eq!(first.await.unwrap(), Ok(()));
        assert_eq!(snapshot(&store), vec![card("a", "first"), card("b", "edited")]);
    }

    #[tokio::test]
    async fn failed_delete_puts_the_record_back_in_place() {
        let store = EntityStore::shared(vec![card("a", "1"), card("b", "2"), card("c", "3")]);
        let mutator = OptimisticMutator::new(&store);

        let result = mutator.remove("b", || async { Err(offline()) }).await;

        assert!(result.is_err());
        assert_eq!(
            snapshot(&store),
            vec![card("a", "1"), card("b", "2"), card("c", "3")]
        );

        let removed = mutator.remove("b", || async { Ok(()) }).await;
        assert_eq!(removed, Ok(card("b", "2")));
        assert_eq!(snapshot(&store), vec![card("a", "1"), card("c", "3")]);
    }

    #[tokio::test]
    async fn results_after_the_view_closed_are_discarded() {
        let store = EntityStore::shared(vec![card("a", "old")]);
        let mutator = OptimisticMutator::new(&store);
        let (release, released) = oneshot::channel::<GatewayResult<()>>();

        let pending = {
            let mutator = mutator.clone();
            tokio::spawn(async move {
                mutator
                    .mutate_field("a", |c: &mut Card| &mut c.label, "new".to_string(), |_| async move {
                        released.await.unwrap_or(Err(offline()))
                    })
                    .await
            })
        };
        for _ in 0..16 {
            if lock_store(&store).is_updating("a") {
                break;
            }
            tokio::task::yield_now().await;
        }

        drop(store);
        release.send(Err(offline())).unwrap();

        assert_eq!(
            pending.await.unwrap(),
            Err(MutationError::Rejected(offline()))
        );
        assert_eq!(
            mutator
                .mutate_field("a", |c: &mut Card| &mut c.label, "x".to_string(), |_| async {
                    Ok(())
                })
                .await,
            Err(MutationError::Detached)
        );
    }

    #[tokio::test]
    async fn unknown_records_are_reported_missing() {
        let store = EntityStore::shared(vec![card("a", "1")]);
        let mutator = OptimisticMutator::new(&store);

        let result = mutator
            .mutate_field("zzz", |c: &mut Card| &mut c.label, "x".to_string(), |_| async {
                Ok(())
            })
            .await;
        assert_eq!(result, Err(MutationError::Missing("zzz".to_string())));
    }
}
