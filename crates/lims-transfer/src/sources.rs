//! Post-transfer source states

use indexmap::IndexSet;
use lims_model::{Labware, LabwareId, LabwareState, UcMap};
use lims_store::{StoreError, Transaction};

/// Applies declared or default states to source labware
#[derive(Debug, Clone, Copy)]
pub struct SourceStateUpdater<'a> {
    declared: &'a UcMap<LabwareState>,
    default_state: Option<LabwareState>,
}

impl<'a> SourceStateUpdater<'a> {
    /// Updater using `declared` states, else `default_state`
    #[must_use]
    pub fn new(declared: &'a UcMap<LabwareState>, default_state: Option<LabwareState>) -> Self {
        Self {
            declared,
            default_state,
        }
    }

    /// State the source should end up in, if any
    #[must_use]
    pub fn target_state(&self, source: &Labware) -> Option<LabwareState> {
        self.declared
            .get(&source.barcode)
            .copied()
            .or(self.default_state)
    }

    /// Update the sources in one batch
    ///
    /// Returns the barcodes of sources that became discarded, which must be
    /// evicted from storage once the transaction commits.
    ///
    /// # Errors
    /// `NotFound` if a source no longer exists.
    pub fn apply<'s>(
        &self,
        tx: &mut Transaction<'_>,
        sources: impl IntoIterator<Item = &'s Labware>,
    ) -> Result<IndexSet<String>, StoreError> {
        let mut updates: Vec<(LabwareId, LabwareState)> = Vec::new();
        let mut discarded = IndexSet::new();
        for source in sources {
            match self.target_state(source) {
                Some(LabwareState::Discarded) if !source.is(LabwareState::Discarded) => {
                    updates.push((source.id, LabwareState::Discarded));
                    discarded.insert(source.barcode.clone());
                }
                Some(LabwareState::Used) if !source.is(LabwareState::Used) => {
                    updates.push((source.id, LabwareState::Used));
                }
                _ => {}
            }
        }
        if !updates.is_empty() {
            tx.save_labware_states(&updates)?;
        }
        Ok(discarded)
    }
}
