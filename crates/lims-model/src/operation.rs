//! Operation types, operations, actions and labware notes

use crate::address::Address;
use crate::ids::{ActionId, LabwareId, NoteId, OperationId, OperationTypeId, SlotId};
use crate::labware::{LabwareState, Slot};
use crate::sample::{BioState, Sample};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Behaviour of an operation type
///
/// Looked up by operation type name; the engine branches on these flags
/// rather than on the type's identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OperationBehaviour {
    /// Runs on existing content without moving it
    ///
    /// Recorded for other operation kinds; slot copies neither read nor
    /// require it.
    pub in_place: bool,
    /// Sources are discarded afterwards
    pub discard_source: bool,
    /// Sources are marked used afterwards
    pub mark_source_used: bool,
    /// Existing active labware may be used as a destination
    pub supports_active_dest: bool,
}

/// A named kind of operation
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationType {
    /// Operation type id
    pub id: OperationTypeId,
    /// Unique name
    pub name: String,
    /// Behaviour flags
    #[serde(default)]
    pub behaviour: OperationBehaviour,
    /// Bio state given to copied samples when the request names none
    #[serde(default)]
    pub new_bio_state: Option<BioState>,
}

impl OperationType {
    /// Whether sources are discarded by default
    #[inline]
    #[must_use]
    pub fn discard_source(&self) -> bool {
        self.behaviour.discard_source
    }

    /// Whether sources are marked used by default
    #[inline]
    #[must_use]
    pub fn mark_source_used(&self) -> bool {
        self.behaviour.mark_source_used
    }

    /// Whether existing labware may be a destination
    #[inline]
    #[must_use]
    pub fn supports_active_dest(&self) -> bool {
        self.behaviour.supports_active_dest
    }

    /// State sources move to when the request does not say otherwise
    #[must_use]
    pub fn default_source_state(&self) -> Option<LabwareState> {
        if self.discard_source() {
            Some(LabwareState::Discarded)
        } else if self.mark_source_used() {
            Some(LabwareState::Used)
        } else {
            None
        }
    }
}

/// The person responsible for an operation
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct User {
    /// Login name
    pub username: String,
}

impl User {
    /// Create user
    #[inline]
    #[must_use]
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
        }
    }
}

/// Slot coordinates recorded on an action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotRef {
    /// Slot id
    pub slot_id: SlotId,
    /// Owning labware
    pub labware_id: LabwareId,
    /// Slot address
    pub address: Address,
}

impl From<&Slot> for SlotRef {
    fn from(slot: &Slot) -> Self {
        Self {
            slot_id: slot.id,
            labware_id: slot.labware_id,
            address: slot.address,
        }
    }
}

/// One sample in one slot becoming a sample in another slot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Action {
    /// Action id
    pub id: ActionId,
    /// Owning operation
    pub operation_id: OperationId,
    /// Source slot
    pub source: SlotRef,
    /// Destination slot
    pub destination: SlotRef,
    /// Sample as it was in the source
    pub source_sample: Sample,
    /// Sample as it is in the destination
    pub sample: Sample,
}

/// An action not yet saved
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAction {
    /// Source slot
    pub source: SlotRef,
    /// Destination slot
    pub destination: SlotRef,
    /// Sample as it was in the source
    pub source_sample: Sample,
    /// Sample as it is in the destination
    pub sample: Sample,
}

/// A recorded operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Operation {
    /// Operation id
    pub id: OperationId,
    /// Operation type
    pub operation_type: OperationType,
    /// When it was recorded
    pub performed: DateTime<Utc>,
    /// Who recorded it
    pub user: User,
    /// What moved where
    pub actions: Vec<Action>,
}

/// Costing category for new labware
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SlideCosting {
    /// Faculty
    Faculty,
    /// SGP
    #[serde(rename = "SGP")]
    Sgp,
    /// Warranty replacement
    #[serde(rename = "Warranty_replacement")]
    WarrantyReplacement,
}

impl fmt::Display for SlideCosting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SlideCosting::Faculty => "Faculty",
            SlideCosting::Sgp => "SGP",
            SlideCosting::WarrantyReplacement => "Warranty_replacement",
        })
    }
}

/// Name/value metadata on a labware for one operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LabwareNote {
    /// Note id
    pub id: NoteId,
    /// Labware the note is about
    pub labware_id: LabwareId,
    /// Operation the note was recorded with
    pub operation_id: OperationId,
    /// Note name
    pub name: String,
    /// Note value
    pub value: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn op_type(behaviour: OperationBehaviour) -> OperationType {
        OperationType {
            id: OperationTypeId(1),
            name: "Transfer".into(),
            behaviour,
            new_bio_state: None,
        }
    }

    #[test]
    fn discard_takes_precedence_over_used() {
        let ot = op_type(OperationBehaviour {
            discard_source: true,
            mark_source_used: true,
            ..OperationBehaviour::default()
        });
        assert_eq!(ot.default_source_state(), Some(LabwareState::Discarded));
    }

    #[test]
    fn default_source_state_variants() {
        let used = op_type(OperationBehaviour {
            mark_source_used: true,
            ..OperationBehaviour::default()
        });
        assert_eq!(used.default_source_state(), Some(LabwareState::Used));
        assert_eq!(op_type(OperationBehaviour::default()).default_source_state(), None);
    }

    #[test]
    fn in_place_flag_is_stored_but_does_not_change_source_state() {
        let behaviour: OperationBehaviour =
            serde_json::from_str(r#"{"inPlace": true, "markSourceUsed": true}"#).unwrap();
        assert!(behaviour.in_place);
        assert_eq!(
            op_type(behaviour).default_source_state(),
            op_type(OperationBehaviour {
                in_place: false,
                ..behaviour
            })
            .default_source_state()
        );
        assert_eq!(op_type(behaviour).default_source_state(), Some(LabwareState::Used));
    }

    #[test]
    fn costing_serializes_with_original_names() {
        let json = serde_json::to_string(&SlideCosting::WarrantyReplacement).unwrap();
        assert_eq!(json, "\"Warranty_replacement\"");
        assert_eq!(SlideCosting::Sgp.to_string(), "SGP");
    }
}
