//! Source sample to destination sample mapping
//!
//! A copy keeps the source sample when no bio state change is wanted.
//! Otherwise the destination gets a new sample with the same tissue and
//! section and the new bio state. Each new sample is created once and reused
//! for every copy of the same source sample to the same bio state.

use crate::error::TransferError;
use crate::validate::ValidatedTransfer;
use lims_model::{BioState, BioStateId, Sample, SampleId};
use lims_store::Transaction;
use std::collections::HashMap;

type Key = (SampleId, Option<BioStateId>);

/// Mapping table from source sample to destination sample
#[derive(Debug, Clone, Default)]
pub struct SampleResolver {
    map: HashMap<Key, Sample>,
    created: usize,
}

impl SampleResolver {
    /// Empty table
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the table for every copy in the transfer, creating new samples
    ///
    /// # Errors
    /// `Invariant` if a source slot is missing from validated data.
    pub fn build(tx: &mut Transaction<'_>, transfer: &ValidatedTransfer) -> Result<Self, TransferError> {
        let mut resolver = Self::new();
        for dest in transfer.destinations() {
            let target = transfer.target_bio_state(dest);
            for copy in dest.copies() {
                let slot = transfer
                    .sources()
                    .get(&copy.source_barcode)
                    .and_then(|lw| lw.slot(copy.source_address))
                    .ok_or_else(|| {
                        TransferError::invariant(format!(
                            "source slot {} in {} not loaded",
                            copy.source_address, copy.source_barcode
                        ))
                    })?;
                for sample in &slot.samples {
                    resolver.resolve(tx, sample, target);
                }
            }
        }
        tracing::debug!(
            mapped = resolver.len(),
            created = resolver.created(),
            "samples resolved"
        );
        Ok(resolver)
    }

    /// Destination sample for `sample` under `target`, creating it if needed
    pub fn resolve(
        &mut self,
        tx: &mut Transaction<'_>,
        sample: &Sample,
        target: Option<&BioState>,
    ) -> Sample {
        let key = key(sample, target);
        if let Some(resolved) = self.map.get(&key) {
            return resolved.clone();
        }
        let resolved = match target {
            Some(bs) if bs.id != sample.bio_state.id => {
                self.created += 1;
                tx.create_sample(sample, bs.clone())
            }
            _ => sample.clone(),
        };
        self.map.insert(key, resolved.clone());
        resolved
    }

    /// Previously resolved destination sample
    #[must_use]
    pub fn get(&self, sample: &Sample, target: Option<&BioState>) -> Option<&Sample> {
        self.map.get(&key(sample, target))
    }

    /// Number of source samples mapped
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Whether nothing is mapped
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Number of new samples created
    #[inline]
    #[must_use]
    pub fn created(&self) -> usize {
        self.created
    }
}

/// No target and a target equal to the sample's own state are the same key
fn key(sample: &Sample, target: Option<&BioState>) -> Key {
    let target = target
        .filter(|bs| bs.id != sample.bio_state.id)
        .map(|bs| bs.id);
    (sample.id, target)
}
