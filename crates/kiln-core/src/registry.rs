//! Copy-on-write registries.
//!
//! Route tables, middleware lists and hook lists are written during setup and
//! read on every request. Readers take a cheap [`Arc`] snapshot and iterate it
//! without holding a lock. Writers clone the list, modify the clone and
//! publish it, so registering at runtime never disturbs a request that is
//! already iterating an older snapshot.

use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;

/// An append-mostly list with lock-free iteration over snapshots.
///
/// # Example
///
/// ```
/// use kiln_core::Registry;
///
/// let registry = Registry::new();
/// registry.push("first");
/// let before = registry.snapshot();
/// registry.push("second");
///
/// assert_eq!(before.len(), 1);
/// assert_eq!(registry.snapshot().len(), 2);
/// ```
pub struct Registry<T> {
    entries: RwLock<Arc<Vec<T>>>,
}

impl<T> Default for Registry<T> {
    fn default() -> Self {
        Self {
            entries: RwLock::new(Arc::new(Vec::new())),
        }
    }
}

impl<T: Clone> Registry<T> {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the current entries.
    pub fn snapshot(&self) -> Arc<Vec<T>> {
        Arc::clone(&self.entries.read())
    }

    /// Appends an entry.
    pub fn push(&self, entry: T) {
        self.update(|entries| entries.push(entry));
    }

    /// Inserts an entry at `index`, clamped to the current length.
    pub fn insert(&self, index: usize, entry: T) {
        self.update(|entries| {
            let index = index.min(entries.len());
            entries.insert(index, entry);
        });
    }

    /// Removes every entry matching `predicate`, returning how many were removed.
    pub fn remove_where(&self, mut predicate: impl FnMut(&T) -> bool) -> usize {
        let mut removed = 0;
        self.update(|entries| {
            let before = entries.len();
            entries.retain(|entry| !predicate(entry));
            removed = before - entries.len();
        });
        removed
    }

    /// Appends every entry of `other`'s current snapshot.
    pub fn extend_from(&self, other: &Self) {
        let incoming = other.snapshot();
        self.update(|entries| entries.extend(incoming.iter().cloned()));
    }

    /// Returns the number of entries.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Returns true if the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    fn update(&self, apply: impl FnOnce(&mut Vec<T>)) {
        let mut guard = self.entries.write();
        let mut next = Vec::clone(&guard);
        apply(&mut next);
        *guard = Arc::new(next);
    }
}

impl<T> fmt::Debug for Registry<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("len", &self.entries.read().len())
            .finish()
    }
}
