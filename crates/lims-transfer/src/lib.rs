//! LIMS Transfer - Slot Copy Engine
//!
//! Copies sample content from source labware slots into new or existing
//! destination labware:
//! - Validates the whole request and reports every problem at once
//! - Executes as one unit of work: nothing is written unless it all succeeds
//! - Creates new samples when the destination changes the bio state
//! - Records one operation per destination, with notes and a work link
//! - Moves sources to their declared or default states
//! - Evicts discarded sources from storage after commit
//!
//! # Example
//!
//! ```rust,ignore
//! use lims_transfer::prelude::*;
//! use std::sync::Arc;
//!
//! # async fn example(db: Arc<lims_store::Database>) -> Result<(), Box<dyn std::error::Error>> {
//! let service = SlotCopyService::new(db, TransferConfig::new(), Arc::new(LogStoreService))?;
//!
//! let request = TransferRequest::new("Transfer").with_destination(
//!     TransferDestination::new_labware("96 well plate")
//!         .with_content(TransferContent::new("STAN-1", "A1".parse()?, "B3".parse()?)),
//! );
//! let result = service.perform(&User::new("dr6"), &request).await?;
//!
//! println!("Created {}", result.labware[0].barcode);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod config;
pub mod error;
pub mod execute;
pub mod labware_check;
pub mod problems;
pub mod resolve;
pub mod service;
pub mod sources;
pub mod storage;
pub mod validate;
pub mod validators;
pub mod work;

// Re-exports for convenience
pub use config::{ConfigError, FormatRule, TransferConfig};
pub use error::{StorageError, TransferError, ValidationError, VALIDATION_MESSAGE};
pub use execute::TransferExecutor;
pub use labware_check::LabwareValidator;
pub use problems::Problems;
pub use resolve::SampleResolver;
pub use service::{CommittedTransfer, SlotCopyService, TransferOutcome};
pub use sources::SourceStateUpdater;
pub use storage::{LogStoreService, StoreService};
pub use validate::{
    PlannedCopy, PlannedDestination, TransferRules, TransferValidator, ValidatedTransfer,
};
pub use validators::{FormatValidator, StringValidator};
pub use work::{StoreWorkService, WorkService};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for performing slot copies
    pub use crate::{
        LogStoreService, SlotCopyService, StoreService, TransferConfig, TransferError,
        TransferOutcome,
    };
    pub use lims_model::{
        Address, LabwareState, OperationResult, SlideCosting, TransferContent,
        TransferDestination, TransferRequest, TransferSource, User,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
