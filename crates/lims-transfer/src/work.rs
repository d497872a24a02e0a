//! Work number collaborator

use crate::problems::{repr, Problems};
use lims_model::{Operation, OperationId, Work};
use lims_store::{StoreError, Transaction};

/// Validates work numbers and links operations to them
pub trait WorkService: Send + Sync {
    /// Load the work if a number is given, reporting unknown or closed work
    fn validate_usable_work(
        &self,
        tx: &Transaction<'_>,
        problems: &mut Problems,
        work_number: Option<&str>,
    ) -> Option<Work>;

    /// Link every operation to the work in one batch
    ///
    /// # Errors
    /// `NotFound` if the work no longer exists.
    fn link(
        &self,
        tx: &mut Transaction<'_>,
        work: &Work,
        operations: &[Operation],
    ) -> Result<(), StoreError>;
}

/// [`WorkService`] backed by the store's work table
#[derive(Debug, Clone, Copy, Default)]
pub struct StoreWorkService;

impl WorkService for StoreWorkService {
    fn validate_usable_work(
        &self,
        tx: &Transaction<'_>,
        problems: &mut Problems,
        work_number: Option<&str>,
    ) -> Option<Work> {
        let work_number = work_number?;
        let Some(work) = tx.work(work_number) else {
            problems.add(format!("Unknown work number: {}", repr(work_number)));
            return None;
        };
        if work.is_closed() {
            problems.add(format!(
                "Work number {} is not usable because it is {}.",
                work.work_number, work.status
            ));
            return None;
        }
        Some(work)
    }

    fn link(
        &self,
        tx: &mut Transaction<'_>,
        work: &Work,
        operations: &[Operation],
    ) -> Result<(), StoreError> {
        if operations.is_empty() {
            return Ok(());
        }
        let ids: Vec<OperationId> = operations.iter().map(|op| op.id).collect();
        tx.link_work(&work.work_number, &ids)?;
        tracing::debug!(work = %work.work_number, operations = ids.len(), "linked work");
        Ok(())
    }
}
