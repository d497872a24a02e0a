//! Case-insensitive string-keyed map
//!
//! Barcodes and names arrive in whatever case the user typed. [`UcMap`]
//! upper-cases keys on the way in and on lookup, and keeps insertion order.

use indexmap::IndexMap;

/// Map keyed by upper-cased strings, in insertion order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UcMap<V> {
    inner: IndexMap<String, V>,
}

impl<V> Default for UcMap<V> {
    fn default() -> Self {
        Self {
            inner: IndexMap::new(),
        }
    }
}

impl<V> UcMap<V> {
    /// Empty map
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from values keyed by the given function
    pub fn from_values<I, F>(values: I, key_fn: F) -> Self
    where
        I: IntoIterator<Item = V>,
        F: Fn(&V) -> &str,
    {
        let mut map = Self::new();
        for value in values {
            let key = key_fn(&value).to_uppercase();
            map.inner.insert(key, value);
        }
        map
    }

    /// Insert, returning any previous value for the key
    pub fn insert(&mut self, key: &str, value: V) -> Option<V> {
        self.inner.insert(key.to_uppercase(), value)
    }

    /// Lookup ignoring case
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&V> {
        self.inner.get(&key.to_uppercase())
    }

    /// Lookup with an optional key; `None` finds nothing
    #[must_use]
    pub fn get_opt(&self, key: Option<&str>) -> Option<&V> {
        key.and_then(|k| self.get(k))
    }

    /// Whether the key is present, ignoring case
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.inner.contains_key(&key.to_uppercase())
    }

    /// Upper-cased keys
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.inner.keys().map(String::as_str)
    }

    /// Values in insertion order
    pub fn values(&self) -> impl Iterator<Item = &V> {
        self.inner.values()
    }

    /// Mutable values in insertion order
    pub fn values_mut(&mut self) -> impl Iterator<Item = &mut V> {
        self.inner.values_mut()
    }

    /// Entries in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &V)> {
        self.inner.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of entries
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Whether the map is empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Consume into values
    pub fn into_values(self) -> impl Iterator<Item = V> {
        self.inner.into_values()
    }
}
