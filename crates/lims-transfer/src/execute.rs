//! Transfer execution
//!
//! Runs inside the unit of work after validation. Anything that goes wrong
//! here means validated data did not hold, and aborts the whole unit.

use crate::error::TransferError;
use crate::resolve::SampleResolver;
use crate::validate::{PlannedDestination, ValidatedTransfer};
use crate::work::WorkService;
use lims_model::{Labware, NewAction, Operation, OperationResult, SlotRef, User};
use lims_store::Transaction;

/// Note name for slide costing
pub const NOTE_COSTING: &str = "costing";
/// Note name for lot number
pub const NOTE_LOT: &str = "lot";
/// Note name for probe lot number
pub const NOTE_PROBE_LOT: &str = "probe lot";

/// Creates and fills destinations and records the operations
pub struct TransferExecutor<'a> {
    user: &'a User,
    work_service: &'a dyn WorkService,
}

impl<'a> TransferExecutor<'a> {
    /// Executor acting for `user`
    #[must_use]
    pub fn new(user: &'a User, work_service: &'a dyn WorkService) -> Self {
        Self { user, work_service }
    }

    /// Execute every destination in order
    ///
    /// # Errors
    /// `Invariant` if validated data is inconsistent; `Store` if a write fails.
    pub fn execute(
        &self,
        tx: &mut Transaction<'_>,
        transfer: &ValidatedTransfer,
    ) -> Result<OperationResult, TransferError> {
        let resolver = SampleResolver::build(tx, transfer)?;
        let mut result = OperationResult::default();
        for dest in transfer.destinations() {
            let (operation, labware) = self.execute_destination(tx, transfer, dest, &resolver)?;
            result.operations.push(operation);
            result.labware.push(labware);
        }
        if let Some(work) = transfer.work() {
            self.work_service.link(tx, work, &result.operations)?;
        }
        Ok(result)
    }

    fn execute_destination(
        &self,
        tx: &mut Transaction<'_>,
        transfer: &ValidatedTransfer,
        dest: &PlannedDestination,
        resolver: &SampleResolver,
    ) -> Result<(Operation, Labware), TransferError> {
        let mut labware = match dest.existing() {
            Some(existing) => tx.labware_by_id(existing.id)?,
            None => tx.create_labware(dest.labware_type(), dest.pre_barcode(), dest.pre_barcode())?,
        };
        let target = transfer.target_bio_state(dest);

        let mut actions = Vec::new();
        for copy in dest.copies() {
            let source_slot = transfer
                .sources()
                .get(&copy.source_barcode)
                .and_then(|lw| lw.slot(copy.source_address))
                .ok_or_else(|| {
                    TransferError::invariant(format!(
                        "no slot {} in source {}",
                        copy.source_address, copy.source_barcode
                    ))
                })?;
            let dest_slot = labware.slot_mut(copy.destination_address).ok_or_else(|| {
                TransferError::invariant(format!(
                    "no slot {} in destination {}",
                    copy.destination_address, labware_barcode(dest)
                ))
            })?;
            for source_sample in &source_slot.samples {
                let sample = resolver.get(source_sample, target).ok_or_else(|| {
                    TransferError::invariant(format!("sample {} was not resolved", source_sample.id))
                })?;
                dest_slot.add_sample(sample.clone());
                actions.push(NewAction {
                    source: SlotRef::from(source_slot),
                    destination: SlotRef::from(&*dest_slot),
                    source_sample: source_sample.clone(),
                    sample: sample.clone(),
                });
            }
        }

        tx.save_labware(&labware)?;
        let labware = tx.labware_by_id(labware.id)?;
        let operation = tx.create_operation(transfer.operation_type(), self.user, actions);

        if let Some(costing) = dest.costing {
            tx.add_note(labware.id, operation.id, NOTE_COSTING, &costing.to_string());
        }
        if let Some(lot) = dest.lot_number.as_deref() {
            tx.add_note(labware.id, operation.id, NOTE_LOT, lot);
        }
        if let Some(lot) = dest.probe_lot_number.as_deref() {
            tx.add_note(labware.id, operation.id, NOTE_PROBE_LOT, lot);
        }

        tracing::debug!(
            labware = %labware.barcode,
            operation = %operation.id,
            actions = operation.actions.len(),
            "destination filled"
        );
        Ok((operation, labware))
    }
}

fn labware_barcode(dest: &PlannedDestination) -> &str {
    dest.existing()
        .map_or_else(|| dest.pre_barcode().unwrap_or("new labware"), |lw| lw.barcode.as_str())
}
