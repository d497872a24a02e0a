//! Physical storage collaborator
//!
//! Labware that a transfer discards must be taken out of its storage
//! location. That happens outside the database, after commit.

use crate::error::StorageError;
use lims_model::User;

/// Releases storage locations held by labware
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait StoreService: Send + Sync {
    /// Remove the labware with these barcodes from storage
    async fn discard_storage(&self, user: &User, barcodes: &[String]) -> Result<(), StorageError>;
}

/// [`StoreService`] that only records evictions in the log
///
/// For deployments without a storage system.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogStoreService;

#[async_trait::async_trait]
impl StoreService for LogStoreService {
    async fn discard_storage(&self, user: &User, barcodes: &[String]) -> Result<(), StorageError> {
        tracing::info!(user = %user.username, ?barcodes, "storage released");
        Ok(())
    }
}
