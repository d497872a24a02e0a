//! Row storage shared by committed state and transaction working copies

use crate::error::StoreError;
use lims_model::{
    BioState, BioStateId, Labware, LabwareId, LabwareNote, LabwareType, LabwareTypeId, NoteId,
    Operation, OperationId, OperationType, OperationTypeId, Sample, SampleId, Tissue, TissueId,
    Work, WorkId,
};
use std::collections::BTreeMap;

/// Every table in the store
#[derive(Debug, Clone, Default)]
pub(crate) struct Tables {
    pub(crate) labware_types: BTreeMap<LabwareTypeId, LabwareType>,
    pub(crate) bio_states: BTreeMap<BioStateId, BioState>,
    pub(crate) operation_types: BTreeMap<OperationTypeId, OperationType>,
    pub(crate) works: BTreeMap<WorkId, Work>,
    pub(crate) tissues: BTreeMap<TissueId, Tissue>,
    pub(crate) samples: BTreeMap<SampleId, Sample>,
    pub(crate) labware: BTreeMap<LabwareId, Labware>,
    pub(crate) operations: BTreeMap<OperationId, Operation>,
    pub(crate) notes: BTreeMap<NoteId, LabwareNote>,
    pub(crate) work_operations: Vec<(WorkId, OperationId)>,
}

impl Tables {
    pub(crate) fn labware_by_barcode(&self, barcode: &str) -> Option<&Labware> {
        self.labware
            .values()
            .find(|lw| lw.barcode.eq_ignore_ascii_case(barcode))
    }

    pub(crate) fn labware_by_external_barcode(&self, barcode: &str) -> Option<&Labware> {
        self.labware.values().find(|lw| {
            lw.external_barcode
                .as_deref()
                .is_some_and(|ext| ext.eq_ignore_ascii_case(barcode))
        })
    }

    pub(crate) fn labware_type_by_name(&self, name: &str) -> Option<&LabwareType> {
        self.labware_types
            .values()
            .find(|lt| lt.name.eq_ignore_ascii_case(name))
    }

    pub(crate) fn bio_state_by_name(&self, name: &str) -> Option<&BioState> {
        self.bio_states
            .values()
            .find(|bs| bs.name.eq_ignore_ascii_case(name))
    }

    pub(crate) fn operation_type_by_name(&self, name: &str) -> Option<&OperationType> {
        self.operation_types
            .values()
            .find(|ot| ot.name.eq_ignore_ascii_case(name))
    }

    pub(crate) fn work_by_number(&self, work_number: &str) -> Option<&Work> {
        self.works
            .values()
            .find(|w| w.work_number.eq_ignore_ascii_case(work_number))
    }

    /// Fails if either barcode is already held by some labware
    pub(crate) fn check_unique(
        &self,
        barcode: &str,
        external_barcode: Option<&str>,
    ) -> Result<(), StoreError> {
        if self.labware_by_barcode(barcode).is_some() {
            return Err(StoreError::UniqueViolation {
                constraint: "labware_barcode",
                value: barcode.to_string(),
            });
        }
        if let Some(ext) = external_barcode {
            if self.labware_by_external_barcode(ext).is_some() {
                return Err(StoreError::UniqueViolation {
                    constraint: "labware_external_barcode",
                    value: ext.to_string(),
                });
            }
        }
        Ok(())
    }
}
