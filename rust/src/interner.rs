//! Operation name index for fast lookups.
//!
//! Maps operation names to their dense integer IDs. Unnamed operations are
//! never indexed.

use rustc_hash::FxHashMap;

use crate::models::OperationId;

/// Name -> ID index for the operations of one graph.
#[derive(Debug, Clone, Default)]
pub struct NameIndex {
    by_name: FxHashMap<String, OperationId>,
}

impl NameIndex {
    /// Create a new index with pre-allocated capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            by_name: FxHashMap::with_capacity_and_hasher(capacity, Default::default()),
        }
    }

    /// Register `name` for `id`.
    ///
    /// Returns the ID already holding the name if it is taken; the index is
    /// left unchanged in that case.
    pub fn insert(&mut self, name: &str, id: OperationId) -> Result<(), OperationId> {
        if let Some(&existing) = self.by_name.get(name) {
            return Err(existing);
        }
        self.by_name.insert(name.to_string(), id);
        Ok(())
    }

    /// Get the ID for a name, if it exists.
    #[inline]
    pub fn get(&self, name: &str) -> Option<OperationId> {
        self.by_name.get(name).copied()
    }
}
