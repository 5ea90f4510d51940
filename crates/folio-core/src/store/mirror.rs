use std::collections::HashMap;

use crate::models::Record;

/// Where a mirrored row stands relative to the remote store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncState {
    #[default]
    Synced,
    /// An update for this row is in flight
    PendingWrite,
    /// A delete for this row is in flight
    PendingDelete,
}

/// Local copy of one remote table, in the order the remote returned it.
#[derive(Debug, Clone, PartialEq)]
pub struct Mirror<T: Record> {
    rows: Vec<T>,
    pending: HashMap<String, SyncState>,
    loaded: bool,
}

impl<T: Record> Default for Mirror<T> {
    fn default() -> Self {
        Self {
            rows: Vec::new(),
            pending: HashMap::new(),
            loaded: false,
        }
    }
}

impl<T: Record> Mirror<T> {
    pub fn new() -> Self {
        Self::default()
    }

    // ===== Getters =====

    pub fn rows(&self) -> &[T] {
        &self.rows
    }

    pub fn get(&self, id: &str) -> Option<&T> {
        self.rows.iter().find(|r| r.id() == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    pub fn state(&self, id: &str) -> SyncState {
        self.pending.get(id).copied().unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Whether a full fetch has ever been installed.
    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    // ===== Mutations =====

    /// Install a fresh fetch, discarding whatever was there.
    pub fn replace(&mut self, rows: Vec<T>) {
        self.rows = rows;
        self.loaded = true;
    }

    pub(crate) fn begin(&mut self, id: &str, state: SyncState) {
        self.pending.insert(id.to_string(), state);
    }

    /// Back to `Synced`, whatever the outcome of the write was.
    pub(crate) fn settle(&mut self, id: &str) {
        self.pending.remove(id);
    }

    pub(crate) fn merge(&mut self, id: &str, patch: &T::Patch) {
        if let Some(row) = self.rows.iter_mut().find(|r| r.id() == id) {
            row.merge(patch);
        }
    }

    pub(crate) fn remove(&mut self, id: &str) {
        self.rows.retain(|r| r.id() != id);
    }

    pub fn clear(&mut self) {
        self.rows.clear();
        self.pending.clear();
        self.loaded = false;
    }
}
