//! Path parameters captured by route matching.

use smallvec::SmallVec;
use std::collections::HashMap;

/// Number of parameters stored without a heap allocation.
const INLINE_PARAMS: usize = 4;

/// Values captured from `{name}` placeholders, in pattern order.
///
/// # Example
///
/// ```
/// use kiln_core::Params;
///
/// let params: Params = [("org", "kiln"), ("id", "42")].into_iter().collect();
/// assert_eq!(params.get("id"), Some("42"));
/// assert_eq!(params.names().collect::<Vec<_>>(), ["org", "id"]);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Params {
    inner: SmallVec<[(String, String); INLINE_PARAMS]>,
}

impl Params {
    /// Creates an empty parameter set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a captured value.
    pub fn push(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.inner.push((name.into(), value.into()));
    }

    /// Returns the value captured for `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.inner
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// Returns true if `name` was captured.
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Iterates over the placeholder names.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.inner.iter().map(|(n, _)| n.as_str())
    }

    /// Iterates over `(name, value)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.inner.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    /// Copies the parameters into an owned map.
    pub fn to_map(&self) -> HashMap<String, String> {
        self.inner.iter().cloned().collect()
    }

    /// Returns the number of captured values.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Returns true if nothing was captured.
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl<N, V> FromIterator<(N, V)> for Params
where
    N: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (N, V)>>(iter: I) -> Self {
        Self {
            inner: iter.into_iter().map(|(n, v)| (n.into(), v.into())).collect(),
        }
    }
}
