//! Staged, all-or-nothing writes.

use crate::error::{StoreError, StoreResult};
use crate::store::VersionStore;

/// A set of writes that is applied to the store as one unit.
///
/// Nothing is visible to readers until [`Batch::commit`] succeeds. Dropping
/// a batch without committing discards it.
#[derive(Debug)]
#[must_use = "a batch does nothing until it is committed"]
pub struct Batch<'a> {
    store: &'a VersionStore,
    writes: Vec<(String, String, String)>,
}

impl<'a> Batch<'a> {
    pub(crate) fn new(store: &'a VersionStore) -> Self {
        Self {
            store,
            writes: Vec::new(),
        }
    }

    /// Stages `value` under `collection`/`key`. Later writes to the same
    /// entry within the batch win.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidKey`] if either name is empty.
    pub fn write(&mut self, collection: &str, key: &str, value: &str) -> StoreResult<()> {
        if collection.is_empty() {
            return Err(StoreError::InvalidKey("empty collection name".into()));
        }
        if key.is_empty() {
            return Err(StoreError::InvalidKey(format!(
                "empty key in collection {collection}"
            )));
        }
        self.writes
            .push((collection.to_string(), key.to_string(), value.to_string()));
        Ok(())
    }

    /// Number of staged writes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.writes.len()
    }

    /// Returns true if nothing is staged.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }

    /// Applies every staged write, or none of them.
    pub fn commit(self) -> StoreResult<()> {
        self.store.apply_writes(self.writes)
    }
}
