//! Error types for the store

/// Store failures
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A unique constraint rejected a write
    #[error("unique constraint {constraint} violated by {value:?}")]
    UniqueViolation {
        /// Constraint name
        constraint: &'static str,
        /// Offending value
        value: String,
    },

    /// A referenced row does not exist
    #[error("{entity} not found: {key}")]
    NotFound {
        /// Entity kind
        entity: &'static str,
        /// Key that was looked up
        key: String,
    },

    /// Fixture content is inconsistent
    #[error("invalid fixture: {0}")]
    Fixture(String),

    /// Fixture file could not be read
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Fixture file is not valid JSON
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl StoreError {
    /// Not-found error
    #[inline]
    pub fn not_found(entity: &'static str, key: impl ToString) -> Self {
        Self::NotFound {
            entity,
            key: key.to_string(),
        }
    }

    /// Whether the error came from a unique constraint, i.e. a lost race
    #[inline]
    #[must_use]
    pub fn is_constraint_violation(&self) -> bool {
        matches!(self, Self::UniqueViolation { .. })
    }
}
