//! Identifier newtypes for persisted entities
//!
//! Every row the store creates gets an id from a database sequence.
//! The newtypes keep labware ids from being confused with sample ids.

use serde::{Deserialize, Serialize};

macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub u32);

        impl $name {
            /// Raw sequence value
            #[inline]
            #[must_use]
            pub fn value(self) -> u32 {
                self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<u32> for $name {
            fn from(value: u32) -> Self {
                Self(value)
            }
        }
    };
}

entity_id!(
    /// Labware identifier
    LabwareId
);
entity_id!(
    /// Labware type identifier
    LabwareTypeId
);
entity_id!(
    /// Slot identifier
    SlotId
);
entity_id!(
    /// Sample identifier
    SampleId
);
entity_id!(
    /// Tissue identifier
    TissueId
);
entity_id!(
    /// Bio state identifier
    BioStateId
);
entity_id!(
    /// Operation type identifier
    OperationTypeId
);
entity_id!(
    /// Operation identifier
    OperationId
);
entity_id!(
    /// Action identifier
    ActionId
);
entity_id!(
    /// Labware note identifier
    NoteId
);
entity_id!(
    /// Work identifier
    WorkId
);
