//! Seeding a database from a JSON fixture
//!
//! Samples are declared once under a key and placed into slots by key, so
//! the same sample can sit in several slots.
//!
//! ```json
//! {
//!   "labwareTypes": [{"name": "Tube", "numRows": 1, "numColumns": 1}],
//!   "bioStates": ["Tissue", "cDNA"],
//!   "operationTypes": [{"name": "Transfer", "newBioState": "cDNA"}],
//!   "works": [{"workNumber": "SGP1"}],
//!   "samples": [{"key": "s1", "tissue": "T1", "section": 1, "bioState": "Tissue"}],
//!   "labware": [{"barcode": "STAN-1", "labwareType": "Tube",
//!                "contents": [{"address": "A1", "samples": ["s1"]}]}]
//! }
//! ```

use crate::db::{Database, StoreConfig};
use crate::error::StoreError;
use lims_model::{Address, LabwareState, OperationBehaviour, Sample, Tissue, WorkStatus};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// Labware type row
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LabwareTypeFixture {
    /// Type name
    pub name: String,
    /// Rows in the grid
    pub num_rows: u32,
    /// Columns in the grid
    pub num_columns: u32,
    /// Whether labware of this type carries an external barcode
    #[serde(default)]
    pub prebarcoded: bool,
}

/// Operation type row
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationTypeFixture {
    /// Type name
    pub name: String,
    /// Behaviour flags
    #[serde(default)]
    pub behaviour: OperationBehaviour,
    /// Bio state given to copied samples
    #[serde(default)]
    pub new_bio_state: Option<String>,
}

/// Work row
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkFixture {
    /// Work number
    pub work_number: String,
    /// Status
    #[serde(default)]
    pub status: WorkStatus,
}

/// Sample row
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SampleFixture {
    /// Key used by labware contents
    pub key: String,
    /// Tissue external name
    pub tissue: String,
    /// Section number
    #[serde(default)]
    pub section: Option<u32>,
    /// Bio state name
    pub bio_state: String,
}

/// Samples in one slot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlotFixture {
    /// Slot address
    pub address: Address,
    /// Sample keys
    pub samples: Vec<String>,
}

/// Labware row
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LabwareFixture {
    /// System barcode
    pub barcode: String,
    /// Labware type name
    pub labware_type: String,
    /// External barcode
    #[serde(default)]
    pub external_barcode: Option<String>,
    /// State
    #[serde(default)]
    pub state: LabwareState,
    /// Occupied slots
    #[serde(default)]
    pub contents: Vec<SlotFixture>,
}

/// Everything needed to seed a database
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Fixture {
    /// Store configuration
    pub store: StoreConfig,
    /// Labware types
    pub labware_types: Vec<LabwareTypeFixture>,
    /// Bio state names
    pub bio_states: Vec<String>,
    /// Operation types
    pub operation_types: Vec<OperationTypeFixture>,
    /// Works
    pub works: Vec<WorkFixture>,
    /// Samples
    pub samples: Vec<SampleFixture>,
    /// Labware
    pub labware: Vec<LabwareFixture>,
}

impl Fixture {
    /// Parse a fixture from JSON text
    ///
    /// # Errors
    /// `Json` if the text is not a valid fixture.
    pub fn from_json_str(json: &str) -> Result<Self, StoreError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Read a fixture file
    ///
    /// # Errors
    /// `Io` if the file cannot be read; `Json` if it is not a valid fixture.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }

    /// Build a database holding the fixture's rows
    ///
    /// # Errors
    /// `Fixture` if a row refers to a name or key that is not declared.
    pub fn into_database(self) -> Result<Database, StoreError> {
        let db = Database::with_config(self.store);

        let labware_types = self
            .labware_types
            .iter()
            .map(|lt| {
                let row =
                    db.add_labware_type(&lt.name, lt.num_rows, lt.num_columns, lt.prebarcoded)?;
                Ok((lt.name.to_uppercase(), row))
            })
            .collect::<Result<HashMap<String, _>, StoreError>>()?;
        let bio_states: HashMap<String, _> = self
            .bio_states
            .iter()
            .map(|name| (name.to_uppercase(), db.add_bio_state(name)))
            .collect();
        let bio_state = |name: &str| {
            bio_states
                .get(&name.to_uppercase())
                .cloned()
                .ok_or_else(|| StoreError::Fixture(format!("undeclared bio state {name:?}")))
        };

        for ot in &self.operation_types {
            let new_bio_state = ot.new_bio_state.as_deref().map(bio_state).transpose()?;
            db.add_operation_type(&ot.name, ot.behaviour, new_bio_state);
        }
        for work in &self.works {
            db.add_work(&work.work_number, work.status);
        }

        let mut tissues: HashMap<String, Tissue> = HashMap::new();
        let mut samples: HashMap<String, Sample> = HashMap::new();
        for sf in &self.samples {
            let tissue = tissues
                .entry(sf.tissue.clone())
                .or_insert_with(|| db.add_tissue(&sf.tissue))
                .clone();
            let sample = db.add_sample(&tissue, sf.section, &bio_state(&sf.bio_state)?);
            samples.insert(sf.key.clone(), sample);
        }

        for lf in &self.labware {
            let lt = labware_types
                .get(&lf.labware_type.to_uppercase())
                .ok_or_else(|| {
                    StoreError::Fixture(format!("undeclared labware type {:?}", lf.labware_type))
                })?;
            let contents = lf
                .contents
                .iter()
                .map(|slot| {
                    let placed = slot
                        .samples
                        .iter()
                        .map(|key| {
                            samples.get(key).cloned().ok_or_else(|| {
                                StoreError::Fixture(format!("undeclared sample {key:?}"))
                            })
                        })
                        .collect::<Result<Vec<_>, _>>()?;
                    Ok((slot.address, placed))
                })
                .collect::<Result<Vec<_>, StoreError>>()?;
            db.add_labware(
                lt,
                &lf.barcode,
                lf.external_barcode.as_deref(),
                lf.state,
                &contents,
            )?;
        }

        tracing::debug!(
            labware = db.labware_count(),
            samples = db.sample_count(),
            "fixture loaded"
        );
        Ok(db)
    }
}
