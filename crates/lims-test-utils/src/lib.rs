//! Testing utilities for the LIMS workspace
//!
//! A seeded lab database, request helpers and a recording storage fake.

#![allow(missing_docs)]

use lims_model::{
    Address, BioState, Labware, LabwareState, LabwareType, OperationBehaviour, Sample, Tissue,
    TransferContent, User, WorkStatus,
};
use lims_store::Database;
use lims_transfer::validate::{CYTASSIST_OP, CYTASSIST_SLIDE, CYTASSIST_SLIDE_XL};
use lims_transfer::{SlotCopyService, StorageError, StoreService, TransferConfig};
use parking_lot::Mutex;
use std::sync::Arc;

/// Allows reused destinations, leaves sources alone
pub const TRANSFER: &str = "Transfer";
/// Discards its sources
pub const TRANSFER_DISCARD: &str = "Transfer discard";
/// Marks its sources used
pub const TRANSFER_USED: &str = "Transfer used";
/// New destinations only
pub const STRICT: &str = "Strict";
/// Changes bio state to Library
pub const LIBRARY_PREP: &str = "Library prep";

pub const ACTIVE_WORK: &str = "SGP1";
pub const CLOSED_WORK: &str = "SGP9";

/// Seeded database with the common types, bio states and operation types
pub struct Lab {
    pub db: Arc<Database>,
    pub plate: LabwareType,
    pub tube: LabwareType,
    pub prebarcoded_tube: LabwareType,
    pub cytassist: LabwareType,
    pub cytassist_xl: LabwareType,
    pub cdna: BioState,
    pub library: BioState,
    pub tissue_state: BioState,
    pub tissue: Tissue,
}

impl Lab {
    pub fn new() -> Self {
        let db = Database::new();
        let plate = db.add_labware_type("96 well plate", 8, 12, false).unwrap();
        let tube = db.add_labware_type("Tube", 1, 1, false).unwrap();
        let prebarcoded_tube = db.add_labware_type("Prebarcoded tube", 1, 1, true).unwrap();
        let cytassist = db.add_labware_type(CYTASSIST_SLIDE, 4, 1, true).unwrap();
        let cytassist_xl = db.add_labware_type(CYTASSIST_SLIDE_XL, 2, 1, true).unwrap();
        let cdna = db.add_bio_state("cDNA");
        let library = db.add_bio_state("Library");
        let tissue_state = db.add_bio_state("Tissue");

        db.add_operation_type(
            TRANSFER,
            OperationBehaviour {
                supports_active_dest: true,
                ..OperationBehaviour::default()
            },
            None,
        );
        db.add_operation_type(
            TRANSFER_DISCARD,
            OperationBehaviour {
                discard_source: true,
                ..OperationBehaviour::default()
            },
            None,
        );
        db.add_operation_type(
            TRANSFER_USED,
            OperationBehaviour {
                mark_source_used: true,
                ..OperationBehaviour::default()
            },
            None,
        );
        db.add_operation_type(STRICT, OperationBehaviour::default(), None);
        db.add_operation_type(LIBRARY_PREP, OperationBehaviour::default(), Some(library.clone()));
        db.add_operation_type(
            CYTASSIST_OP,
            OperationBehaviour {
                discard_source: true,
                ..OperationBehaviour::default()
            },
            None,
        );
        db.add_work(ACTIVE_WORK, WorkStatus::Active);
        db.add_work(CLOSED_WORK, WorkStatus::Completed);
        let tissue = db.add_tissue("TISSUE1");

        Self {
            db: Arc::new(db),
            plate,
            tube,
            prebarcoded_tube,
            cytassist,
            cytassist_xl,
            cdna,
            library,
            tissue_state,
            tissue,
        }
    }

    /// New cDNA sample
    pub fn sample(&self, section: u32) -> Sample {
        self.sample_in(section, &self.cdna)
    }

    pub fn sample_in(&self, section: u32, bio_state: &BioState) -> Sample {
        self.db.add_sample(&self.tissue, Some(section), bio_state)
    }

    /// Active labware with `contents` given as `("A1", samples)`
    pub fn labware(
        &self,
        labware_type: &LabwareType,
        barcode: &str,
        contents: &[(&str, Vec<Sample>)],
    ) -> Labware {
        self.labware_in_state(labware_type, barcode, LabwareState::Active, contents)
    }

    pub fn labware_in_state(
        &self,
        labware_type: &LabwareType,
        barcode: &str,
        state: LabwareState,
        contents: &[(&str, Vec<Sample>)],
    ) -> Labware {
        let contents: Vec<(Address, Vec<Sample>)> = contents
            .iter()
            .map(|(address, samples)| (address.parse().unwrap(), samples.clone()))
            .collect();
        self.db
            .add_labware(labware_type, barcode, None, state, &contents)
            .unwrap()
    }

    /// Active tube holding one new cDNA sample
    pub fn tube_with_sample(&self, barcode: &str, section: u32) -> Labware {
        let sample = self.sample(section);
        self.labware(&self.tube, barcode, &[("A1", vec![sample])])
    }

    /// Service over this lab with default configuration
    pub fn service(&self, store: Arc<dyn StoreService>) -> SlotCopyService {
        SlotCopyService::new(Arc::clone(&self.db), TransferConfig::default(), store).unwrap()
    }
}

impl Default for Lab {
    fn default() -> Self {
        Self::new()
    }
}

/// Content copying `source_address` of `barcode` to `destination_address`
pub fn copy(barcode: &str, source_address: &str, destination_address: &str) -> TransferContent {
    TransferContent::new(
        barcode,
        source_address.parse().unwrap(),
        destination_address.parse().unwrap(),
    )
}

pub fn user() -> User {
    User::new("dr6")
}

/// Storage fake that records every eviction, optionally failing each one
#[derive(Debug, Default)]
pub struct RecordingStore {
    calls: Mutex<Vec<(String, Vec<String>)>>,
    failure: Option<StorageError>,
}

impl RecordingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(error: StorageError) -> Self {
        Self {
            calls: Mutex::default(),
            failure: Some(error),
        }
    }

    /// Username and barcodes of each call
    pub fn calls(&self) -> Vec<(String, Vec<String>)> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    /// Every barcode sent, in order
    pub fn evicted(&self) -> Vec<String> {
        self.calls
            .lock()
            .iter()
            .flat_map(|(_, barcodes)| barcodes.iter().cloned())
            .collect()
    }
}

#[async_trait::async_trait]
impl StoreService for RecordingStore {
    async fn discard_storage(&self, user: &User, barcodes: &[String]) -> Result<(), StorageError> {
        self.calls
            .lock()
            .push((user.username.clone(), barcodes.to_vec()));
        match &self.failure {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }
}
