//! Samples, tissues and bio states

use crate::ids::{BioStateId, SampleId, TissueId};
use serde::{Deserialize, Serialize};

/// Processing-stage classification of a sample
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BioState {
    /// Bio state id
    pub id: BioStateId,
    /// Bio state name (e.g. "cDNA")
    pub name: String,
}

impl BioState {
    /// Create a bio state
    #[inline]
    #[must_use]
    pub fn new(id: BioStateId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }
}

/// Tissue a sample was taken from
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tissue {
    /// Tissue id
    pub id: TissueId,
    /// Externally assigned tissue name
    pub external_name: String,
}

/// An immutable biological unit
///
/// Samples are never updated. A change of bio state produces a new sample
/// with the same tissue and section.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sample {
    /// Sample id
    pub id: SampleId,
    /// Section number, if the sample is a section
    pub section: Option<u32>,
    /// Source tissue
    pub tissue: Tissue,
    /// Current bio state
    pub bio_state: BioState,
}

impl Sample {
    /// New sample of the same lineage in a different bio state
    #[must_use]
    pub fn derive(&self, id: SampleId, bio_state: BioState) -> Sample {
        Sample {
            id,
            section: self.section,
            tissue: self.tissue.clone(),
            bio_state,
        }
    }
}
