//! Accumulated validation problems

use indexmap::IndexSet;
use std::fmt;

/// Distinct problem messages in the order first reported
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Problems {
    messages: IndexSet<String>,
}

impl Problems {
    /// No problems
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a problem; repeats are ignored
    pub fn add(&mut self, message: impl Into<String>) {
        self.messages.insert(message.into());
    }

    /// Whether nothing has been reported
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Number of distinct problems
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Whether the exact message was reported
    #[must_use]
    pub fn contains(&self, message: &str) -> bool {
        self.messages.contains(message)
    }

    /// Messages in report order
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.messages.iter().map(String::as_str)
    }

    /// Messages in report order
    #[must_use]
    pub fn into_vec(self) -> Vec<String> {
        self.messages.into_iter().collect()
    }
}

impl Extend<String> for Problems {
    fn extend<T: IntoIterator<Item = String>>(&mut self, iter: T) {
        self.messages.extend(iter);
    }
}

impl fmt::Display for Problems {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, message) in self.messages.iter().enumerate() {
            if i > 0 {
                f.write_str("\n")?;
            }
            f.write_str(message)?;
        }
        Ok(())
    }
}

/// `[a, b, c]`
pub(crate) fn bracketed<I, T>(items: I) -> String
where
    I: IntoIterator<Item = T>,
    T: fmt::Display,
{
    let inner: Vec<String> = items.into_iter().map(|item| item.to_string()).collect();
    format!("[{}]", inner.join(", "))
}

/// `"value"` with quotes and backslashes escaped
pub(crate) fn repr(value: &str) -> String {
    format!("{value:?}")
}

/// `base` with `{s}` replaced by `s` unless `count` is one
pub(crate) fn pluralise(base: &str, count: usize) -> String {
    base.replace("{s}", if count == 1 { "" } else { "s" })
}
