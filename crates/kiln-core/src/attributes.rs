//! Per-request attribute bag.
//!
//! Middleware and hooks use attributes to hand values to handlers further
//! down the pipeline. The bag is created together with its request and is
//! shared by every clone of that request, so a value stored by an outer
//! layer is visible to every later stage and the bag itself can never be
//! swapped out.

use parking_lot::RwLock;
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

type Value = Arc<dyn Any + Send + Sync>;

/// String-keyed, type-erased storage shared across one request's pipeline.
///
/// # Example
///
/// ```
/// use kiln_core::Attributes;
///
/// let attrs = Attributes::new();
/// attrs.insert("user_id", 42_u64);
///
/// let shared = attrs.clone();
/// assert_eq!(shared.get::<u64>("user_id").as_deref(), Some(&42));
/// assert!(shared.get::<String>("user_id").is_none());
/// ```
#[derive(Clone, Default)]
pub struct Attributes {
    inner: Arc<RwLock<HashMap<String, Value>>>,
}

impl Attributes {
    /// Creates an empty attribute bag.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `value` under `key`, replacing any previous value.
    pub fn insert<T: Any + Send + Sync>(&self, key: impl Into<String>, value: T) {
        self.inner.write().insert(key.into(), Arc::new(value));
    }

    /// Returns the value under `key` if it exists and has type `T`.
    pub fn get<T: Any + Send + Sync>(&self, key: &str) -> Option<Arc<T>> {
        let value = self.inner.read().get(key).cloned()?;
        value.downcast::<T>().ok()
    }

    /// Returns true if a value is stored under `key`.
    pub fn contains(&self, key: &str) -> bool {
        self.inner.read().contains_key(key)
    }

    /// Removes the value under `key`, returning whether one existed.
    pub fn remove(&self, key: &str) -> bool {
        self.inner.write().remove(key).is_some()
    }

    /// Returns the stored keys in arbitrary order.
    pub fn keys(&self) -> Vec<String> {
        self.inner.read().keys().cloned().collect()
    }

    /// Returns the number of stored values.
    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    /// Returns true if nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }

    /// Returns true if both handles refer to the same bag.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for Attributes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Attributes")
            .field("keys", &self.keys())
            .finish()
    }
}
