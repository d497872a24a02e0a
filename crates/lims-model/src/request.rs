//! Slot-copy requests and results
//!
//! Request fields are optional because requests come from users: the
//! validator reports what is missing instead of the parser rejecting it.
//! Accessors such as [`TransferDestination::barcode`] treat empty strings
//! as absent.

use crate::address::Address;
use crate::labware::{Labware, LabwareState};
use crate::operation::{Operation, SlideCosting};
use serde::{Deserialize, Serialize};
use std::fmt;

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|s| !s.is_empty())
}

/// One slot's content copied to one destination address
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TransferContent {
    /// Barcode of the source labware
    pub source_barcode: Option<String>,
    /// Address of the source slot
    pub source_address: Option<Address>,
    /// Address of the destination slot
    pub destination_address: Option<Address>,
}

impl TransferContent {
    /// Content entry with every field given
    #[must_use]
    pub fn new(source_barcode: impl Into<String>, source: Address, destination: Address) -> Self {
        Self {
            source_barcode: Some(source_barcode.into()),
            source_address: Some(source),
            destination_address: Some(destination),
        }
    }

    /// Source barcode, if non-empty
    #[inline]
    #[must_use]
    pub fn source_barcode(&self) -> Option<&str> {
        non_empty(&self.source_barcode)
    }
}

impl fmt::Display for TransferContent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let show = |a: Option<Address>| a.map_or_else(|| "null".to_string(), |a| a.to_string());
        write!(
            f,
            "{{sourceBarcode={}, sourceAddress={}, destinationAddress={}}}",
            self.source_barcode.as_deref().unwrap_or("null"),
            show(self.source_address),
            show(self.destination_address),
        )
    }
}

/// A destination: new labware of a named type, or existing labware
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TransferDestination {
    /// Barcode of existing labware to add to
    pub barcode: Option<String>,
    /// Name of the labware type for new labware
    pub labware_type: Option<String>,
    /// External barcode for prebarcoded labware types
    pub pre_barcode: Option<String>,
    /// Bio state for the copied samples
    pub bio_state: Option<String>,
    /// Costing of the labware
    pub costing: Option<SlideCosting>,
    /// Lot number of the labware
    pub lot_number: Option<String>,
    /// Probe lot number
    pub probe_lot_number: Option<String>,
    /// What to copy into this destination
    pub contents: Vec<TransferContent>,
}

impl TransferDestination {
    /// New labware of the named type
    #[must_use]
    pub fn new_labware(labware_type: impl Into<String>) -> Self {
        Self {
            labware_type: Some(labware_type.into()),
            ..Self::default()
        }
    }

    /// Existing labware with the given barcode
    #[must_use]
    pub fn existing(barcode: impl Into<String>) -> Self {
        Self {
            barcode: Some(barcode.into()),
            ..Self::default()
        }
    }

    /// With a content entry
    #[must_use]
    pub fn with_content(mut self, content: TransferContent) -> Self {
        self.contents.push(content);
        self
    }

    /// With a prebarcode
    #[must_use]
    pub fn with_pre_barcode(mut self, pre_barcode: impl Into<String>) -> Self {
        self.pre_barcode = Some(pre_barcode.into());
        self
    }

    /// With a bio state name
    #[must_use]
    pub fn with_bio_state(mut self, bio_state: impl Into<String>) -> Self {
        self.bio_state = Some(bio_state.into());
        self
    }

    /// With costing
    #[must_use]
    pub fn with_costing(mut self, costing: SlideCosting) -> Self {
        self.costing = Some(costing);
        self
    }

    /// With lot number
    #[must_use]
    pub fn with_lot_number(mut self, lot: impl Into<String>) -> Self {
        self.lot_number = Some(lot.into());
        self
    }

    /// With probe lot number
    #[must_use]
    pub fn with_probe_lot_number(mut self, lot: impl Into<String>) -> Self {
        self.probe_lot_number = Some(lot.into());
        self
    }

    /// Existing labware barcode, if non-empty
    #[inline]
    #[must_use]
    pub fn barcode(&self) -> Option<&str> {
        non_empty(&self.barcode)
    }

    /// Labware type name, if non-empty
    #[inline]
    #[must_use]
    pub fn labware_type(&self) -> Option<&str> {
        non_empty(&self.labware_type)
    }

    /// Prebarcode, if non-empty
    #[inline]
    #[must_use]
    pub fn pre_barcode(&self) -> Option<&str> {
        non_empty(&self.pre_barcode)
    }

    /// Bio state name, if non-empty
    #[inline]
    #[must_use]
    pub fn bio_state(&self) -> Option<&str> {
        non_empty(&self.bio_state)
    }

    /// Lot number, if non-empty
    #[inline]
    #[must_use]
    pub fn lot_number(&self) -> Option<&str> {
        non_empty(&self.lot_number)
    }

    /// Probe lot number, if non-empty
    #[inline]
    #[must_use]
    pub fn probe_lot_number(&self) -> Option<&str> {
        non_empty(&self.probe_lot_number)
    }
}

/// Explicit post-transfer state for a source labware
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TransferSource {
    /// Source barcode
    pub barcode: Option<String>,
    /// State the source should be left in
    pub labware_state: Option<LabwareState>,
}

impl TransferSource {
    /// Declaration with both fields
    #[must_use]
    pub fn new(barcode: impl Into<String>, state: LabwareState) -> Self {
        Self {
            barcode: Some(barcode.into()),
            labware_state: Some(state),
        }
    }

    /// Barcode, if non-empty
    #[inline]
    #[must_use]
    pub fn barcode(&self) -> Option<&str> {
        non_empty(&self.barcode)
    }
}

/// A batch of slot copies under one operation type
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TransferRequest {
    /// Operation type name
    pub operation_type: Option<String>,
    /// Work number to link the operations to
    pub work_number: Option<String>,
    /// Destinations, executed in order
    pub destinations: Vec<TransferDestination>,
    /// Explicit source states
    pub sources: Vec<TransferSource>,
}

impl TransferRequest {
    /// Request for the named operation type
    #[must_use]
    pub fn new(operation_type: impl Into<String>) -> Self {
        Self {
            operation_type: Some(operation_type.into()),
            ..Self::default()
        }
    }

    /// With a destination
    #[must_use]
    pub fn with_destination(mut self, destination: TransferDestination) -> Self {
        self.destinations.push(destination);
        self
    }

    /// With a source declaration
    #[must_use]
    pub fn with_source(mut self, source: TransferSource) -> Self {
        self.sources.push(source);
        self
    }

    /// With a work number
    #[must_use]
    pub fn with_work_number(mut self, work_number: impl Into<String>) -> Self {
        self.work_number = Some(work_number.into());
        self
    }

    /// Operation type name, if non-empty
    #[inline]
    #[must_use]
    pub fn operation_type(&self) -> Option<&str> {
        non_empty(&self.operation_type)
    }

    /// Work number, if non-empty
    #[inline]
    #[must_use]
    pub fn work_number(&self) -> Option<&str> {
        non_empty(&self.work_number)
    }

    /// Every content entry across every destination
    pub fn contents(&self) -> impl Iterator<Item = &TransferContent> {
        self.destinations.iter().flat_map(|d| d.contents.iter())
    }
}

/// Operations recorded and labware produced by a request
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationResult {
    /// Recorded operations, one per destination
    pub operations: Vec<Operation>,
    /// Destination labware as populated
    pub labware: Vec<Labware>,
}
