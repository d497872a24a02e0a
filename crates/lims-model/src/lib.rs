//! LIMS Model
//!
//! Domain types shared by the store and the transfer engine:
//! - **Labware** with a typed grid of **Slots**
//! - Immutable **Samples** with a **BioState**
//! - **OperationTypes** whose behaviour is data, and recorded
//!   **Operations** made of **Actions**
//! - **LabwareNotes** and **Work** numbers
//! - Slot-copy **requests** and their results
//!
//! # Example
//!
//! ```rust
//! use lims_model::{Address, TransferContent, TransferDestination, TransferRequest};
//!
//! let request = TransferRequest::new("Transfer").with_destination(
//!     TransferDestination::new_labware("96 well plate").with_content(TransferContent::new(
//!         "STAN-1",
//!         "A1".parse::<Address>().unwrap(),
//!         Address::new(1, 1),
//!     )),
//! );
//! assert_eq!(request.contents().count(), 1);
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod address;
pub mod ids;
pub mod labware;
pub mod operation;
pub mod request;
pub mod sample;
pub mod ucmap;
pub mod work;

// Re-exports
pub use address::{Address, AddressParseError};
pub use ids::{
    ActionId, BioStateId, LabwareId, LabwareTypeId, NoteId, OperationId, OperationTypeId,
    SampleId, SlotId, TissueId, WorkId,
};
pub use labware::{Labware, LabwareState, LabwareType, Slot};
pub use operation::{
    Action, LabwareNote, NewAction, Operation, OperationBehaviour, OperationType, SlideCosting,
    SlotRef, User,
};
pub use request::{
    OperationResult, TransferContent, TransferDestination, TransferRequest, TransferSource,
};
pub use sample::{BioState, Sample, Tissue};
pub use ucmap::UcMap;
pub use work::{Work, WorkStatus};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
