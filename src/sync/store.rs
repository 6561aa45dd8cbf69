use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// A record a view keeps in memory and edits by id.
pub trait Entity: Clone + Send + 'static {
    fn id(&self) -> &str;
}

/// The records one view displays, in display order, plus the per-record
/// "updating" markers and error messages of in-flight edits.
#[derive(Debug, Clone)]
pub struct EntityStore<T> {
    records: Vec<T>,
    updating: HashSet<String>,
    errors: HashMap<String, String>,
}

pub type SharedStore<T> = Arc<Mutex<EntityStore<T>>>;

impl<T> Default for EntityStore<T> {
    fn default() -> Self {
        EntityStore {
            records: vec![],
            updating: HashSet::new(),
            errors: HashMap::new(),
        }
    }
}

impl<T: Entity> EntityStore<T> {
    pub fn new(records: Vec<T>) -> EntityStore<T> {
        EntityStore {
            records,
            ..EntityStore::default()
        }
    }

    pub fn shared(records: Vec<T>) -> SharedStore<T> {
        Arc::new(Mutex::new(EntityStore::new(records)))
    }

    pub fn records(&self) -> &[T] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn position(&self, id: &str) -> Option<usize> {
        self.records.iter().position(|r| r.id() == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.position(id).is_some()
    }

    pub fn get(&self, id: &str) -> Option<&T> {
        self.records.iter().find(|r| r.id() == id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut T> {
        self.records.iter_mut().find(|r| r.id() == id)
    }

    pub fn replace_all(&mut self, records: Vec<T>) {
        self.records = records;
    }

    pub fn push(&mut self, record: T) {
        self.records.push(record);
    }

    pub fn prepend(&mut self, record: T) {
        self.records.insert(0, record);
    }

    pub fn insert_at(&mut self, index: usize, record: T) {
        let index = index.min(self.records.len());
        self.records.insert(index, record);
    }

    pub fn remove(&mut self, id: &str) -> Option<(usize, T)> {
        let index = self.position(id)?;
        Some((index, self.records.remove(index)))
    }

    pub fn is_updating(&self, id: &str) -> bool {
        self.updating.contains(id)
    }

    /// Marks `id` as having a write in flight. False if one already is.
    pub(crate) fn begin_update(&mut self, id: &str) -> bool {
        self.updating.insert(id.to_string())
    }

    pub(crate) fn finish_update(&mut self, id: &str) {
        self.updating.remove(id);
    }

    pub fn error_for(&self, id: &str) -> Option<&str> {
        self.errors.get(id).map(String::as_str)
    }

    pub(crate) fn set_error(&mut self, id: &str, message: String) {
        self.errors.insert(id.to_string(), message);
    }

    pub fn clear_error(&mut self, id: &str) {
        self.errors.remove(id);
    }
}

/// Locks a view's store, ignoring poisoning.
pub fn lock_store<T>(store: &Mutex<EntityStore<T>>) -> MutexGuard<'_, EntityStore<T>> {
    store.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Copies the current records out of a shared store.
pub fn snapshot<T: Entity>(store: &SharedStore<T>) -> Vec<T> {
    lock_store(store).records().to_vec()
}
