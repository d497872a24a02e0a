//! Labware, labware types and slots

use crate::address::Address;
use crate::ids::{LabwareId, LabwareTypeId, SampleId, SlotId};
use crate::sample::Sample;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A kind of labware: a fixed grid of addressable slots
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LabwareType {
    /// Labware type id
    pub id: LabwareTypeId,
    /// Unique name
    pub name: String,
    /// Number of rows (nonzero)
    pub num_rows: u32,
    /// Number of columns (nonzero)
    pub num_columns: u32,
    /// Whether labware of this type carries an external barcode
    #[serde(default)]
    pub prebarcoded: bool,
}

impl LabwareType {
    /// Row-major index of the address within this type's grid
    #[must_use]
    pub fn index_of(&self, address: Address) -> Option<usize> {
        if address.row() > self.num_rows || address.column() > self.num_columns {
            return None;
        }
        let index = (address.row() - 1) * self.num_columns + (address.column() - 1);
        usize::try_from(index).ok()
    }

    /// Whether the address lies within the grid
    #[inline]
    #[must_use]
    pub fn contains(&self, address: Address) -> bool {
        self.index_of(address).is_some()
    }

    /// Every address in the grid, row-major
    pub fn addresses(&self) -> impl Iterator<Item = Address> {
        Address::grid(self.num_rows, self.num_columns)
    }
}

/// Lifecycle state of labware
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LabwareState {
    /// In use
    #[default]
    Active,
    /// Contents consumed
    Used,
    /// Thrown away
    Discarded,
    /// Sent out of the lab
    Released,
    /// Destroyed
    Destroyed,
}

impl LabwareState {
    /// All states
    pub const ALL: [LabwareState; 5] = [
        LabwareState::Active,
        LabwareState::Used,
        LabwareState::Discarded,
        LabwareState::Released,
        LabwareState::Destroyed,
    ];

    /// Lowercase name
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            LabwareState::Active => "active",
            LabwareState::Used => "used",
            LabwareState::Discarded => "discarded",
            LabwareState::Released => "released",
            LabwareState::Destroyed => "destroyed",
        }
    }
}

impl fmt::Display for LabwareState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LabwareState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        LabwareState::ALL
            .into_iter()
            .find(|state| state.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown labware state: {s}"))
    }
}

/// One addressable position in a labware
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Slot {
    /// Slot id
    pub id: SlotId,
    /// Owning labware
    pub labware_id: LabwareId,
    /// Position in the labware
    pub address: Address,
    /// Samples in the slot; no sample appears twice
    #[serde(default)]
    pub samples: Vec<Sample>,
}

impl Slot {
    /// Whether the slot holds no samples
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Whether the slot holds the sample with the given id
    #[inline]
    #[must_use]
    pub fn contains(&self, sample_id: SampleId) -> bool {
        self.samples.iter().any(|s| s.id == sample_id)
    }

    /// Adds the sample unless already present; returns whether it was added
    pub fn add_sample(&mut self, sample: Sample) -> bool {
        if self.contains(sample.id) {
            return false;
        }
        self.samples.push(sample);
        true
    }
}

/// A physical container with a grid of slots
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Labware {
    /// Labware id
    pub id: LabwareId,
    /// System barcode
    pub barcode: String,
    /// External barcode, for prebarcoded types
    pub external_barcode: Option<String>,
    /// Labware type
    pub labware_type: LabwareType,
    /// Lifecycle state
    #[serde(default)]
    pub state: LabwareState,
    /// Slots in row-major order; exactly the type's grid
    pub slots: Vec<Slot>,
}

impl Labware {
    /// Slot at the given address
    #[must_use]
    pub fn slot(&self, address: Address) -> Option<&Slot> {
        let index = self.labware_type.index_of(address)?;
        self.slots.get(index).filter(|slot| slot.address == address)
    }

    /// Mutable slot at the given address
    pub fn slot_mut(&mut self, address: Address) -> Option<&mut Slot> {
        let index = self.labware_type.index_of(address)?;
        self.slots.get_mut(index).filter(|slot| slot.address == address)
    }

    /// Whether every slot is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(Slot::is_empty)
    }

    /// Slots that hold at least one sample
    pub fn occupied_slots(&self) -> impl Iterator<Item = &Slot> {
        self.slots.iter().filter(|slot| !slot.is_empty())
    }

    /// Every sample in every slot
    pub fn samples(&self) -> impl Iterator<Item = &Sample> {
        self.slots.iter().flat_map(|slot| slot.samples.iter())
    }

    /// Whether the labware has the given state
    #[inline]
    #[must_use]
    pub fn is(&self, state: LabwareState) -> bool {
        self.state == state
    }

    /// Whether the barcode or external barcode equals `value`, ignoring case
    #[must_use]
    pub fn answers_to(&self, value: &str) -> bool {
        self.barcode.eq_ignore_ascii_case(value)
            || self
                .external_barcode
                .as_deref()
                .is_some_and(|ext| ext.eq_ignore_ascii_case(value))
    }
}
