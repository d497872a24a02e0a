//! Slot copy service
//!
//! Runs a request in two phases:
//! 1. One unit of work: validate, execute, update sources, commit. It
//!    returns the result and the barcodes that became discarded.
//! 2. After commit, evict those barcodes from storage. Failure here is
//!    logged and reported but never undoes the transfer.

use crate::config::{ConfigError, TransferConfig};
use crate::error::{StorageError, TransferError};
use crate::execute::TransferExecutor;
use crate::sources::SourceStateUpdater;
use crate::storage::StoreService;
use crate::validate::{TransferRules, TransferValidator};
use crate::work::{StoreWorkService, WorkService};
use lims_model::{OperationResult, TransferRequest, User};
use lims_store::Database;
use std::sync::Arc;
use tracing::Instrument;

/// Transaction name for slot copies
pub const TRANSACTION_NAME: &str = "SlotCopy";

/// What a committed unit of work produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommittedTransfer {
    /// Operations and destination labware
    pub result: OperationResult,
    /// Sources discarded by this transfer
    pub barcodes_to_evict: Vec<String>,
}

impl CommittedTransfer {
    /// Whether storage eviction is needed
    #[must_use]
    pub fn needs_eviction(&self) -> bool {
        !self.result.operations.is_empty() && !self.barcodes_to_evict.is_empty()
    }
}

/// Outcome of a request, including the storage side effect
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferOutcome {
    /// Operations and destination labware
    pub result: OperationResult,
    /// Barcodes sent for eviction
    pub evicted: Vec<String>,
    /// Eviction failure, if eviction was attempted and failed
    pub eviction_error: Option<StorageError>,
}

/// Validates and performs slot copy requests
pub struct SlotCopyService {
    db: Arc<Database>,
    rules: TransferRules,
    work_service: Arc<dyn WorkService>,
    store_service: Arc<dyn StoreService>,
}

impl SlotCopyService {
    /// Service over `db`, evicting through `store_service`
    ///
    /// # Errors
    /// `InvalidRule` if a format rule in `config` does not compile.
    pub fn new(
        db: Arc<Database>,
        config: TransferConfig,
        store_service: Arc<dyn StoreService>,
    ) -> Result<Self, ConfigError> {
        Ok(Self::with_rules(
            db,
            TransferRules::from_config(config)?,
            store_service,
        ))
    }

    /// Service with precompiled rules
    #[must_use]
    pub fn with_rules(
        db: Arc<Database>,
        rules: TransferRules,
        store_service: Arc<dyn StoreService>,
    ) -> Self {
        Self {
            db,
            rules,
            work_service: Arc::new(StoreWorkService),
            store_service,
        }
    }

    /// With a work service
    #[must_use]
    pub fn with_work_service(mut self, work_service: Arc<dyn WorkService>) -> Self {
        self.work_service = work_service;
        self
    }

    /// Database the service writes to
    #[inline]
    #[must_use]
    pub fn database(&self) -> &Arc<Database> {
        &self.db
    }

    /// Perform the request and return what it recorded
    ///
    /// # Errors
    /// `Validation` with every problem if the request is invalid;
    /// `Store` if commit lost a race; `Invariant` on inconsistent data.
    pub async fn perform(
        &self,
        user: &User,
        request: &TransferRequest,
    ) -> Result<OperationResult, TransferError> {
        Ok(self.perform_detailed(user, request).await?.result)
    }

    /// Perform the request and report the storage side effect as well
    ///
    /// # Errors
    /// As [`SlotCopyService::perform`]. Eviction failure is not an error.
    pub async fn perform_detailed(
        &self,
        user: &User,
        request: &TransferRequest,
    ) -> Result<TransferOutcome, TransferError> {
        let span = tracing::info_span!(
            "slot_copy",
            op_type = request.operation_type().unwrap_or_default(),
            user = %user.username,
        );
        async {
            let committed = self.perform_in_transaction(user, request)?;
            let (evicted, eviction_error) = if committed.needs_eviction() {
                let error = self.evict(user, &committed.barcodes_to_evict).await.err();
                (committed.barcodes_to_evict, error)
            } else {
                (Vec::new(), None)
            };
            let outcome = TransferOutcome {
                result: committed.result,
                evicted,
                eviction_error,
            };
            Ok::<_, TransferError>(outcome)
        }
        .instrument(span)
        .await
    }

    /// The unit of work: validate, execute and update sources, then commit
    ///
    /// Storage is not touched. The caller evicts
    /// [`CommittedTransfer::barcodes_to_evict`] if it wants to.
    ///
    /// # Errors
    /// As [`SlotCopyService::perform`].
    pub fn perform_in_transaction(
        &self,
        user: &User,
        request: &TransferRequest,
    ) -> Result<CommittedTransfer, TransferError> {
        let result = self.db.transact(TRANSACTION_NAME, |tx| -> Result<_, TransferError> {
            let transfer =
                TransferValidator::new(tx, &self.rules, self.work_service.as_ref()).validate(request)?;
            let result = TransferExecutor::new(user, self.work_service.as_ref()).execute(tx, &transfer)?;
            let updater = SourceStateUpdater::new(
                transfer.source_states(),
                transfer.operation_type().default_source_state(),
            );
            let discarded = updater.apply(tx, transfer.sources().values())?;
            Ok(CommittedTransfer {
                result,
                barcodes_to_evict: discarded.into_iter().collect(),
            })
        });
        match &result {
            Ok(committed) => tracing::info!(
                operations = committed.result.operations.len(),
                labware = committed.result.labware.len(),
                discarded = committed.barcodes_to_evict.len(),
                "transfer committed"
            ),
            Err(TransferError::Validation(err)) => tracing::warn!(
                problems = err.problems().len(),
                "transfer failed validation"
            ),
            Err(err) => tracing::error!(error = %err, "transfer aborted"),
        }
        result
    }

    async fn evict(&self, user: &User, barcodes: &[String]) -> Result<(), StorageError> {
        let timeout = self.rules.config().eviction_timeout();
        let result = match tokio::time::timeout(
            timeout,
            self.store_service.discard_storage(user, barcodes),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(StorageError::Timeout {
                secs: timeout.as_secs(),
            }),
        };
        match &result {
            Ok(()) => tracing::info!(?barcodes, "storage released"),
            Err(err) => tracing::error!(error = %err, ?barcodes, "storage release failed"),
        }
        result
    }
}

impl std::fmt::Debug for SlotCopyService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlotCopyService")
            .field("rules", &self.rules)
            .finish_non_exhaustive()
    }
}
