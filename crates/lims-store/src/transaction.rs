//! Transactions
//!
//! A [`Transaction`] works on its own copy of the tables. Nothing it does is
//! visible to other transactions until [`Transaction::commit`], which checks
//! the unique constraints against the committed state and then applies the
//! recorded changes in one step under the write lock.

use crate::db::Database;
use crate::error::StoreError;
use crate::tables::Tables;
use chrono::Utc;
use lims_model::{
    Action, BioState, Labware, LabwareId, LabwareNote, LabwareState, LabwareType, NewAction,
    NoteId, Operation, OperationId, OperationType, Sample, SampleId, Slot, UcMap, User, Work,
    WorkId,
};
use std::collections::BTreeSet;

#[derive(Debug, Default)]
struct ChangeSet {
    created_labware: BTreeSet<LabwareId>,
    updated_labware: BTreeSet<LabwareId>,
    samples: Vec<SampleId>,
    operations: Vec<OperationId>,
    notes: Vec<NoteId>,
    work_links: Vec<(WorkId, OperationId)>,
}

/// A unit of work against a [`Database`]
#[derive(Debug)]
pub struct Transaction<'db> {
    db: &'db Database,
    name: String,
    tables: Tables,
    changes: ChangeSet,
}

impl<'db> Transaction<'db> {
    pub(crate) fn new(db: &'db Database, name: &str, tables: Tables) -> Self {
        Self {
            db,
            name: name.to_string(),
            tables,
            changes: ChangeSet::default(),
        }
    }

    /// Transaction name, used in logs
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    // region Reads

    /// Operation type by name, ignoring case
    #[must_use]
    pub fn operation_type(&self, name: &str) -> Option<OperationType> {
        self.tables.operation_type_by_name(name).cloned()
    }

    /// Labware type by name, ignoring case
    #[must_use]
    pub fn labware_type(&self, name: &str) -> Option<LabwareType> {
        self.tables.labware_type_by_name(name).cloned()
    }

    /// Bio state by name, ignoring case
    #[must_use]
    pub fn bio_state(&self, name: &str) -> Option<BioState> {
        self.tables.bio_state_by_name(name).cloned()
    }

    /// Labware by system barcode, ignoring case
    #[must_use]
    pub fn labware(&self, barcode: &str) -> Option<Labware> {
        self.tables.labware_by_barcode(barcode).cloned()
    }

    /// Labware types with any of the given names, keyed by name
    #[must_use]
    pub fn labware_types<'n>(&self, names: impl IntoIterator<Item = &'n str>) -> UcMap<LabwareType> {
        let mut found = UcMap::new();
        for lt in names
            .into_iter()
            .filter_map(|name| self.tables.labware_type_by_name(name))
        {
            found.insert(&lt.name, lt.clone());
        }
        found
    }

    /// Bio states with any of the given names, keyed by name
    #[must_use]
    pub fn bio_states<'n>(&self, names: impl IntoIterator<Item = &'n str>) -> UcMap<BioState> {
        let mut found = UcMap::new();
        for bs in names
            .into_iter()
            .filter_map(|name| self.tables.bio_state_by_name(name))
        {
            found.insert(&bs.name, bs.clone());
        }
        found
    }

    /// Labware with any of the given system barcodes, in request order
    ///
    /// Each labware appears once per time its barcode is given.
    #[must_use]
    pub fn labware_by_barcodes<'b>(&self, barcodes: impl IntoIterator<Item = &'b str>) -> Vec<Labware> {
        barcodes
            .into_iter()
            .filter_map(|bc| self.tables.labware_by_barcode(bc).cloned())
            .collect()
    }

    /// Labware by id
    ///
    /// # Errors
    /// `NotFound` if there is no such labware.
    pub fn labware_by_id(&self, id: LabwareId) -> Result<Labware, StoreError> {
        self.tables
            .labware
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("labware", id))
    }

    /// Whether any labware has this system barcode
    #[must_use]
    pub fn exists_by_barcode(&self, barcode: &str) -> bool {
        self.tables.labware_by_barcode(barcode).is_some()
    }

    /// Whether any labware has this external barcode
    #[must_use]
    pub fn exists_by_external_barcode(&self, barcode: &str) -> bool {
        self.tables.labware_by_external_barcode(barcode).is_some()
    }

    /// Work by work number, ignoring case
    #[must_use]
    pub fn work(&self, work_number: &str) -> Option<Work> {
        self.tables.work_by_number(work_number).cloned()
    }

    // endregion

    // region Writes

    /// Create empty labware of the given type
    ///
    /// Without a barcode the next one from the sequence is assigned.
    ///
    /// # Errors
    /// `UniqueViolation` if the barcode or external barcode is taken.
    pub fn create_labware(
        &mut self,
        labware_type: &LabwareType,
        barcode: Option<&str>,
        external_barcode: Option<&str>,
    ) -> Result<Labware, StoreError> {
        let barcode = match barcode {
            Some(bc) => bc.to_uppercase(),
            None => self.db.next_barcode(),
        };
        let external_barcode = external_barcode.map(str::to_uppercase);
        self.tables.check_unique(&barcode, external_barcode.as_deref())?;

        let id = LabwareId(self.db.next_id());
        let slots = labware_type
            .addresses()
            .map(|address| Slot {
                id: self.db.next_id().into(),
                labware_id: id,
                address,
                samples: Vec::new(),
            })
            .collect();
        let labware = Labware {
            id,
            barcode,
            external_barcode,
            labware_type: labware_type.clone(),
            state: LabwareState::Active,
            slots,
        };
        self.tables.labware.insert(id, labware.clone());
        self.changes.created_labware.insert(id);
        Ok(labware)
    }

    /// Create a sample derived from `template` with a new bio state
    pub fn create_sample(&mut self, template: &Sample, bio_state: BioState) -> Sample {
        let sample = template.derive(self.db.next_id().into(), bio_state);
        self.tables.samples.insert(sample.id, sample.clone());
        self.changes.samples.push(sample.id);
        sample
    }

    /// Store the labware's slots and state
    ///
    /// # Errors
    /// `NotFound` if the labware does not exist.
    pub fn save_labware(&mut self, labware: &Labware) -> Result<(), StoreError> {
        let row = self
            .tables
            .labware
            .get_mut(&labware.id)
            .ok_or_else(|| StoreError::not_found("labware", labware.id))?;
        row.state = labware.state;
        row.slots.clone_from(&labware.slots);
        self.changes.updated_labware.insert(labware.id);
        Ok(())
    }

    /// Set the state of several labware in one batch
    ///
    /// # Errors
    /// `NotFound` if any labware does not exist; nothing is changed then.
    pub fn save_labware_states(
        &mut self,
        updates: &[(LabwareId, LabwareState)],
    ) -> Result<(), StoreError> {
        if let Some((missing, _)) = updates
            .iter()
            .find(|(id, _)| !self.tables.labware.contains_key(id))
        {
            return Err(StoreError::not_found("labware", missing));
        }
        for (id, state) in updates {
            if let Some(row) = self.tables.labware.get_mut(id) {
                row.state = *state;
                self.changes.updated_labware.insert(*id);
            }
        }
        Ok(())
    }

    /// Record an operation with its actions
    pub fn create_operation(
        &mut self,
        operation_type: &OperationType,
        user: &User,
        actions: Vec<NewAction>,
    ) -> Operation {
        let operation_id = OperationId(self.db.next_id());
        let actions = actions
            .into_iter()
            .map(|action| Action {
                id: self.db.next_id().into(),
                operation_id,
                source: action.source,
                destination: action.destination,
                source_sample: action.source_sample,
                sample: action.sample,
            })
            .collect();
        let operation = Operation {
            id: operation_id,
            operation_type: operation_type.clone(),
            performed: Utc::now(),
            user: user.clone(),
            actions,
        };
        self.tables.operations.insert(operation_id, operation.clone());
        self.changes.operations.push(operation_id);
        operation
    }

    /// Record a note on labware for an operation
    pub fn add_note(
        &mut self,
        labware_id: LabwareId,
        operation_id: OperationId,
        name: &str,
        value: &str,
    ) -> LabwareNote {
        let note = LabwareNote {
            id: self.db.next_id().into(),
            labware_id,
            operation_id,
            name: name.to_string(),
            value: value.to_string(),
        };
        self.tables.notes.insert(note.id, note.clone());
        self.changes.notes.push(note.id);
        note
    }

    /// Link operations to a work number
    ///
    /// # Errors
    /// `NotFound` if the work number does not exist.
    pub fn link_work(
        &mut self,
        work_number: &str,
        operation_ids: &[OperationId],
    ) -> Result<Work, StoreError> {
        let work = self
            .tables
            .work_by_number(work_number)
            .cloned()
            .ok_or_else(|| StoreError::not_found("work", work_number))?;
        for op_id in operation_ids {
            self.tables.work_operations.push((work.id, *op_id));
            self.changes.work_links.push((work.id, *op_id));
        }
        Ok(work)
    }

    // endregion

    /// Apply every change to the committed state
    ///
    /// # Errors
    /// `UniqueViolation` if labware committed since this transaction began
    /// took one of its barcodes. Nothing is applied in that case.
    pub fn commit(self) -> Result<(), StoreError> {
        let mut committed = self.db.committed.write();

        for id in &self.changes.created_labware {
            let lw = &self.tables.labware[id];
            if let Err(err) = committed.check_unique(&lw.barcode, lw.external_barcode.as_deref())
            {
                tracing::warn!(transaction = %self.name, error = %err, "commit rejected");
                return Err(err);
            }
        }

        for id in &self.changes.created_labware {
            committed.labware.insert(*id, self.tables.labware[id].clone());
        }
        for id in &self.changes.updated_labware {
            let ours = &self.tables.labware[id];
            match committed.labware.get_mut(id) {
                Some(row) => merge_labware(row, ours),
                None => {
                    committed.labware.insert(*id, ours.clone());
                }
            }
        }
        for id in &self.changes.samples {
            committed.samples.insert(*id, self.tables.samples[id].clone());
        }
        for id in &self.changes.operations {
            committed
                .operations
                .insert(*id, self.tables.operations[id].clone());
        }
        for id in &self.changes.notes {
            committed.notes.insert(*id, self.tables.notes[id].clone());
        }
        committed
            .work_operations
            .extend(self.changes.work_links.iter().copied());

        tracing::debug!(
            transaction = %self.name,
            labware = self.changes.created_labware.len(),
            operations = self.changes.operations.len(),
            "commit"
        );
        Ok(())
    }

    /// Discard every change
    pub fn rollback(self) {
        tracing::debug!(transaction = %self.name, "rollback");
    }
}

/// Our state wins; slot contents are the union of both sides
fn merge_labware(row: &mut Labware, ours: &Labware) {
    row.state = ours.state;
    for (slot, our_slot) in row.slots.iter_mut().zip(&ours.slots) {
        for sample in &our_slot.samples {
            slot.add_sample(sample.clone());
        }
    }
}
