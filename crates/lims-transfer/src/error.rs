//! Error types for the transfer engine
//!
//! - Validation failures carry every problem found; nothing was written
//! - Invariant violations mean validated data did not hold during execution
//! - Store errors come from commit, e.g. a barcode taken by a concurrent request
//! - Storage errors come from post-commit eviction and never undo a transfer

use crate::problems::Problems;
use lims_store::StoreError;

/// Message of every validation failure
pub const VALIDATION_MESSAGE: &str = "The operation could not be validated.";

/// A request failed validation
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct ValidationError {
    message: String,
    problems: Vec<String>,
}

impl ValidationError {
    /// Validation error for the given problems
    #[must_use]
    pub fn new(problems: Problems) -> Self {
        Self {
            message: VALIDATION_MESSAGE.to_string(),
            problems: problems.into_vec(),
        }
    }

    /// Summary message
    #[inline]
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Every problem, in the order found
    #[inline]
    #[must_use]
    pub fn problems(&self) -> &[String] {
        &self.problems
    }
}

/// Transfer failures
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    /// The request is invalid
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Validated data did not hold during execution
    #[error("invariant violated: {0}")]
    Invariant(String),

    /// The store rejected the unit of work
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl TransferError {
    /// Invariant violation
    #[inline]
    pub fn invariant(message: impl Into<String>) -> Self {
        Self::Invariant(message.into())
    }

    /// Check if error is a validation failure
    #[inline]
    #[must_use]
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Check if error is retryable
    ///
    /// Only a lost unique-constraint race is; the retry revalidates and
    /// will usually report the taken barcode as a problem.
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Store(err) if err.is_constraint_violation())
    }

    /// Problems, if this is a validation failure
    #[must_use]
    pub fn problems(&self) -> Option<&[String]> {
        match self {
            Self::Validation(err) => Some(err.problems()),
            _ => None,
        }
    }
}

/// Storage collaborator failures
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StorageError {
    /// The storage service could not be reached
    #[error("storage service unavailable: {0}")]
    Unavailable(String),

    /// The storage service refused the request
    #[error("storage service rejected request: {0}")]
    Rejected(String),

    /// The storage service did not answer in time
    #[error("storage service timed out after {secs}s")]
    Timeout {
        /// Seconds waited
        secs: u64,
    },
}
