//! The database handle
//!
//! [`Database`] owns the committed tables and the id sequences. Work happens
//! in a [`Transaction`], which reads and writes a private copy of the tables
//! taken when it began. Commit re-checks unique constraints against whatever
//! has been committed since, so two transactions racing for the same barcode
//! cannot both succeed.

use crate::error::StoreError;
use crate::tables::Tables;
use crate::transaction::Transaction;
use lims_model::{
    Address, BioState, Labware, LabwareId, LabwareNote, LabwareState, LabwareType, Operation,
    OperationBehaviour, OperationType, Sample, Slot, Tissue, Work, WorkStatus,
};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU32, Ordering};

/// Store configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StoreConfig {
    /// Prefix of system-assigned labware barcodes
    pub barcode_prefix: String,
    /// First value of the barcode sequence
    pub barcode_seed: u32,
}

impl StoreConfig {
    /// Default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With barcode prefix
    #[inline]
    #[must_use]
    pub fn with_barcode_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.barcode_prefix = prefix.into();
        self
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            barcode_prefix: "STAN-".to_string(),
            barcode_seed: 0x100,
        }
    }
}

/// In-memory transactional database
#[derive(Debug)]
pub struct Database {
    config: StoreConfig,
    pub(crate) committed: RwLock<Tables>,
    next_id: AtomicU32,
    next_barcode: AtomicU32,
}

impl Database {
    /// Empty database with default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(StoreConfig::default())
    }

    /// Empty database with the given configuration
    #[must_use]
    pub fn with_config(config: StoreConfig) -> Self {
        let seed = config.barcode_seed;
        Self {
            config,
            committed: RwLock::new(Tables::default()),
            next_id: AtomicU32::new(1),
            next_barcode: AtomicU32::new(seed),
        }
    }

    /// Configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub(crate) fn next_id(&self) -> u32 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    pub(crate) fn next_barcode(&self) -> String {
        let seq = self.next_barcode.fetch_add(1, Ordering::Relaxed);
        format!("{}{:06X}", self.config.barcode_prefix, seq)
    }

    /// Begin a transaction on a snapshot of the committed state
    #[must_use]
    pub fn begin(&self, name: &str) -> Transaction<'_> {
        let snapshot = self.committed.read().clone();
        tracing::debug!(transaction = name, "begin");
        Transaction::new(self, name, snapshot)
    }

    /// Run `f` as one unit of work
    ///
    /// If `f` returns `Err`, nothing it wrote is kept. If it returns `Ok`,
    /// its writes are committed; a commit failure is returned as `E`.
    pub fn transact<T, E, F>(&self, name: &str, f: F) -> Result<T, E>
    where
        F: FnOnce(&mut Transaction<'_>) -> Result<T, E>,
        E: From<StoreError>,
    {
        let mut tx = self.begin(name);
        match f(&mut tx) {
            Ok(value) => {
                tx.commit()?;
                Ok(value)
            }
            Err(err) => {
                tx.rollback();
                Err(err)
            }
        }
    }

    fn seed<T>(&self, f: impl FnOnce(&mut Tables, u32) -> T) -> T {
        let id = self.next_id();
        f(&mut self.committed.write(), id)
    }

    // region Seeding

    /// Add a labware type
    ///
    /// # Errors
    /// `Fixture` if the grid has no rows or no columns.
    pub fn add_labware_type(
        &self,
        name: &str,
        num_rows: u32,
        num_columns: u32,
        prebarcoded: bool,
    ) -> Result<LabwareType, StoreError> {
        if num_rows == 0 || num_columns == 0 {
            return Err(StoreError::Fixture(format!(
                "labware type {name:?} has a {num_rows}x{num_columns} grid"
            )));
        }
        Ok(self.seed(|t, id| {
            let lt = LabwareType {
                id: id.into(),
                name: name.to_string(),
                num_rows,
                num_columns,
                prebarcoded,
            };
            t.labware_types.insert(lt.id, lt.clone());
            lt
        }))
    }

    /// Add a bio state
    pub fn add_bio_state(&self, name: &str) -> BioState {
        self.seed(|t, id| {
            let bs = BioState::new(id.into(), name);
            t.bio_states.insert(bs.id, bs.clone());
            bs
        })
    }

    /// Add an operation type
    pub fn add_operation_type(
        &self,
        name: &str,
        behaviour: OperationBehaviour,
        new_bio_state: Option<BioState>,
    ) -> OperationType {
        self.seed(|t, id| {
            let ot = OperationType {
                id: id.into(),
                name: name.to_string(),
                behaviour,
                new_bio_state,
            };
            t.operation_types.insert(ot.id, ot.clone());
            ot
        })
    }

    /// Add a work number
    pub fn add_work(&self, work_number: &str, status: WorkStatus) -> Work {
        self.seed(|t, id| {
            let work = Work {
                id: id.into(),
                work_number: work_number.to_string(),
                status,
            };
            t.works.insert(work.id, work.clone());
            work
        })
    }

    /// Add a tissue
    pub fn add_tissue(&self, external_name: &str) -> Tissue {
        self.seed(|t, id| {
            let tissue = Tissue {
                id: id.into(),
                external_name: external_name.to_string(),
            };
            t.tissues.insert(tissue.id, tissue.clone());
            tissue
        })
    }

    /// Add a sample
    pub fn add_sample(&self, tissue: &Tissue, section: Option<u32>, bio_state: &BioState) -> Sample {
        self.seed(|t, id| {
            let sample = Sample {
                id: id.into(),
                section,
                tissue: tissue.clone(),
                bio_state: bio_state.clone(),
            };
            t.samples.insert(sample.id, sample.clone());
            sample
        })
    }

    /// Add labware with the given contents
    ///
    /// # Errors
    /// `UniqueViolation` if the barcode or external barcode is taken;
    /// `Fixture` if an address is outside the type's grid.
    pub fn add_labware(
        &self,
        labware_type: &LabwareType,
        barcode: &str,
        external_barcode: Option<&str>,
        state: LabwareState,
        contents: &[(Address, Vec<Sample>)],
    ) -> Result<Labware, StoreError> {
        let labware_id = LabwareId(self.next_id());
        let mut slots: Vec<Slot> = labware_type
            .addresses()
            .map(|address| Slot {
                id: self.next_id().into(),
                labware_id,
                address,
                samples: Vec::new(),
            })
            .collect();
        for (address, samples) in contents {
            let index = labware_type.index_of(*address).ok_or_else(|| {
                StoreError::Fixture(format!(
                    "address {address} is not in labware type {}",
                    labware_type.name
                ))
            })?;
            for sample in samples {
                slots[index].add_sample(sample.clone());
            }
        }
        let labware = Labware {
            id: labware_id,
            barcode: barcode.to_uppercase(),
            external_barcode: external_barcode.map(str::to_uppercase),
            labware_type: labware_type.clone(),
            state,
            slots,
        };
        let mut tables = self.committed.write();
        tables.check_unique(&labware.barcode, labware.external_barcode.as_deref())?;
        tables.labware.insert(labware.id, labware.clone());
        Ok(labware)
    }

    // endregion

    // region Committed reads

    /// Committed labware with the given barcode
    #[must_use]
    pub fn labware(&self, barcode: &str) -> Option<Labware> {
        self.committed.read().labware_by_barcode(barcode).cloned()
    }

    /// Number of committed labware
    #[must_use]
    pub fn labware_count(&self) -> usize {
        self.committed.read().labware.len()
    }

    /// Number of committed samples
    #[must_use]
    pub fn sample_count(&self) -> usize {
        self.committed.read().samples.len()
    }

    /// Committed operations in id order
    #[must_use]
    pub fn operations(&self) -> Vec<Operation> {
        self.committed.read().operations.values().cloned().collect()
    }

    /// Committed notes for a labware
    #[must_use]
    pub fn notes_for(&self, labware_id: LabwareId) -> Vec<LabwareNote> {
        self.committed
            .read()
            .notes
            .values()
            .filter(|note| note.labware_id == labware_id)
            .cloned()
            .collect()
    }

    /// Ids of operations linked to the work number
    #[must_use]
    pub fn work_operations(&self, work_number: &str) -> Vec<lims_model::OperationId> {
        let tables = self.committed.read();
        let Some(work) = tables.work_by_number(work_number) else {
            return Vec::new();
        };
        tables
            .work_operations
            .iter()
            .filter(|(work_id, _)| *work_id == work.id)
            .map(|(_, op_id)| *op_id)
            .collect()
    }

    // endregion
}

impl Default for Database {
    fn default() -> Self {
        Self::new()
    }
}
