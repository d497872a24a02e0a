//! Request validation
//!
//! Every rule runs and every problem is collected before anything is
//! written. A request that passes becomes a [`ValidatedTransfer`], which can
//! only be built here: the executor accepts nothing else.
//!
//! Rules, in the order their problems are reported:
//! 1. operation type exists
//! 2. reused destinations load, are unique and active, and the operation
//!    type allows reuse
//! 3. named labware types exist
//! 4. prebarcodes are present exactly where the type needs one, and well formed
//! 5. prebarcodes are unique and not already in use
//! 6. sources load and are usable
//! 7. declared source states are sensible
//! 8. lot numbers are well formed
//! 9. content addresses are valid and free
//! 10. `CytAssist` destination types and slots
//! 11. bio states exist and are allowed
//! 12. reused destinations agree with the named type and bio state
//! 13. the work number is usable

use crate::config::{ConfigError, TransferConfig};
use crate::error::{TransferError, ValidationError};
use crate::labware_check::LabwareValidator;
use crate::problems::{bracketed, pluralise, repr, Problems};
use crate::validators::{FormatValidator, StringValidator};
use crate::work::WorkService;
use indexmap::IndexSet;
use lims_model::{
    Address, BioState, BioStateId, Labware, LabwareState, LabwareType, OperationType,
    SlideCosting, TransferDestination, TransferRequest, UcMap, Work,
};
use lims_store::Transaction;
use std::collections::HashSet;

/// Operation type with `CytAssist` slide rules
pub const CYTASSIST_OP: &str = "CytAssist";
/// Standard `CytAssist` slide
pub const CYTASSIST_SLIDE: &str = "Visium LP CytAssist";
/// Extra-large `CytAssist` slide
pub const CYTASSIST_SLIDE_XL: &str = "Visium LP CytAssist XL";

/// States a request may declare for a source
const DECLARABLE_SOURCE_STATES: [LabwareState; 3] = [
    LabwareState::Active,
    LabwareState::Discarded,
    LabwareState::Used,
];

/// Configuration compiled into checkers
pub struct TransferRules {
    config: TransferConfig,
    prebarcode: Box<dyn StringValidator>,
    lot_number: Box<dyn StringValidator>,
}

impl TransferRules {
    /// Compile the format rules in `config`
    ///
    /// # Errors
    /// `InvalidRule` if a format rule does not compile.
    pub fn from_config(config: TransferConfig) -> Result<Self, ConfigError> {
        let prebarcode = Box::new(FormatValidator::new(config.prebarcode.clone())?);
        let lot_number = Box::new(FormatValidator::new(config.lot_number.clone())?);
        Ok(Self {
            config,
            prebarcode,
            lot_number,
        })
    }

    /// With a custom prebarcode checker
    #[must_use]
    pub fn with_prebarcode_validator(mut self, validator: Box<dyn StringValidator>) -> Self {
        self.prebarcode = validator;
        self
    }

    /// With a custom lot number checker
    #[must_use]
    pub fn with_lot_number_validator(mut self, validator: Box<dyn StringValidator>) -> Self {
        self.lot_number = validator;
        self
    }

    /// Configuration the rules were built from
    #[inline]
    #[must_use]
    pub fn config(&self) -> &TransferConfig {
        &self.config
    }
}

impl std::fmt::Debug for TransferRules {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransferRules")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// One slot copy, with every field checked
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedCopy {
    /// Upper-cased source barcode
    pub source_barcode: String,
    /// Source slot
    pub source_address: Address,
    /// Destination slot
    pub destination_address: Address,
}

/// One destination, with every reference resolved
#[derive(Debug, Clone)]
pub struct PlannedDestination {
    pub(crate) labware_type: LabwareType,
    pub(crate) existing: Option<Labware>,
    pub(crate) pre_barcode: Option<String>,
    pub(crate) bio_state: Option<BioState>,
    pub(crate) costing: Option<SlideCosting>,
    pub(crate) lot_number: Option<String>,
    pub(crate) probe_lot_number: Option<String>,
    pub(crate) copies: Vec<PlannedCopy>,
}

impl PlannedDestination {
    /// Type of the labware to fill
    #[inline]
    #[must_use]
    pub fn labware_type(&self) -> &LabwareType {
        &self.labware_type
    }

    /// Labware being reused, if any
    #[inline]
    #[must_use]
    pub fn existing(&self) -> Option<&Labware> {
        self.existing.as_ref()
    }

    /// Upper-cased prebarcode for new labware
    #[inline]
    #[must_use]
    pub fn pre_barcode(&self) -> Option<&str> {
        self.pre_barcode.as_deref()
    }

    /// Bio state requested for this destination
    #[inline]
    #[must_use]
    pub fn bio_state(&self) -> Option<&BioState> {
        self.bio_state.as_ref()
    }

    /// Copies into this destination
    #[inline]
    #[must_use]
    pub fn copies(&self) -> &[PlannedCopy] {
        &self.copies
    }
}

/// A request that passed validation, with everything it refers to loaded
#[derive(Debug, Clone)]
pub struct ValidatedTransfer {
    pub(crate) operation_type: OperationType,
    pub(crate) destinations: Vec<PlannedDestination>,
    pub(crate) sources: UcMap<Labware>,
    pub(crate) source_states: UcMap<LabwareState>,
    pub(crate) work: Option<Work>,
}

impl ValidatedTransfer {
    /// Operation type to record
    #[inline]
    #[must_use]
    pub fn operation_type(&self) -> &OperationType {
        &self.operation_type
    }

    /// Destinations in request order
    #[inline]
    #[must_use]
    pub fn destinations(&self) -> &[PlannedDestination] {
        &self.destinations
    }

    /// Source labware keyed by barcode
    #[inline]
    #[must_use]
    pub fn sources(&self) -> &UcMap<Labware> {
        &self.sources
    }

    /// Explicitly declared source states keyed by barcode
    #[inline]
    #[must_use]
    pub fn source_states(&self) -> &UcMap<LabwareState> {
        &self.source_states
    }

    /// Work to link operations to
    #[inline]
    #[must_use]
    pub fn work(&self) -> Option<&Work> {
        self.work.as_ref()
    }

    /// Bio state the samples copied into a destination should have
    #[must_use]
    pub fn target_bio_state<'a>(
        &'a self,
        destination: &'a PlannedDestination,
    ) -> Option<&'a BioState> {
        destination
            .bio_state
            .as_ref()
            .or(self.operation_type.new_bio_state.as_ref())
    }
}

/// Checks a [`TransferRequest`] against the store
pub struct TransferValidator<'a, 'db> {
    tx: &'a Transaction<'db>,
    rules: &'a TransferRules,
    work_service: &'a dyn WorkService,
}

/// Everything loaded while checking
#[derive(Default)]
struct Loaded {
    operation_type: Option<OperationType>,
    existing: UcMap<Labware>,
    labware_types: UcMap<LabwareType>,
    sources: UcMap<Labware>,
    source_states: UcMap<LabwareState>,
    bio_states: UcMap<BioState>,
    work: Option<Work>,
}

impl Loaded {
    /// Reused labware's type, else the named type
    fn destination_type(&self, dest: &TransferDestination) -> Option<&LabwareType> {
        self.existing
            .get_opt(dest.barcode())
            .map(|lw| &lw.labware_type)
            .or_else(|| self.labware_types.get_opt(dest.labware_type()))
    }
}

impl<'a, 'db> TransferValidator<'a, 'db> {
    /// Validator reading from `tx`
    #[must_use]
    pub fn new(
        tx: &'a Transaction<'db>,
        rules: &'a TransferRules,
        work_service: &'a dyn WorkService,
    ) -> Self {
        Self {
            tx,
            rules,
            work_service,
        }
    }

    /// Every problem with the request; empty means it can be executed
    #[must_use]
    pub fn problems(&self, request: &TransferRequest) -> Problems {
        self.check(request).0
    }

    /// Validate the request
    ///
    /// # Errors
    /// `Validation` with every problem found, if there are any.
    pub fn validate(&self, request: &TransferRequest) -> Result<ValidatedTransfer, TransferError> {
        let (problems, loaded) = self.check(request);
        if !problems.is_empty() {
            return Err(ValidationError::new(problems).into());
        }
        plan(request, loaded)
    }

    fn check(&self, request: &TransferRequest) -> (Problems, Loaded) {
        let mut problems = Problems::new();
        let mut loaded = Loaded {
            operation_type: self.load_operation_type(&mut problems, request.operation_type()),
            ..Loaded::default()
        };
        let dests = &request.destinations;
        loaded.existing =
            self.load_existing_destinations(&mut problems, loaded.operation_type.as_ref(), dests);
        loaded.labware_types = self.load_labware_types(&mut problems, dests);
        self.check_pre_barcodes(&mut problems, dests, &loaded.labware_types);
        self.check_pre_barcodes_in_use(&mut problems, dests, &loaded.existing);
        loaded.sources = self.load_sources(&mut problems, request);
        validate_sources(&mut problems, &loaded.sources);
        loaded.source_states = check_listed_sources(&mut problems, request);
        self.validate_lot_numbers(&mut problems, dests);
        validate_contents(&mut problems, &loaded, request);
        validate_cyt_assist(&mut problems, &loaded, dests);
        loaded.bio_states =
            self.validate_bio_states(&mut problems, request.operation_type(), dests);
        check_existing_destinations(&mut problems, &loaded, dests);
        loaded.work =
            self.work_service
                .validate_usable_work(self.tx, &mut problems, request.work_number());
        (problems, loaded)
    }

    fn load_operation_type(
        &self,
        problems: &mut Problems,
        name: Option<&str>,
    ) -> Option<OperationType> {
        let Some(name) = name else {
            problems.add("No operation type specified.");
            return None;
        };
        let op_type = self.tx.operation_type(name);
        if op_type.is_none() {
            problems.add(format!("Unknown operation type: {}", repr(name)));
        }
        op_type
    }

    fn load_existing_destinations(
        &self,
        problems: &mut Problems,
        op_type: Option<&OperationType>,
        dests: &[TransferDestination],
    ) -> UcMap<Labware> {
        let barcodes: Vec<&str> = dests.iter().filter_map(TransferDestination::barcode).collect();
        if barcodes.is_empty() {
            return UcMap::new();
        }
        if let Some(op_type) = op_type.filter(|op| !op.supports_active_dest()) {
            problems.add(format!(
                "Reusing existing destinations is not supported for operation type {}.",
                op_type.name
            ));
        }
        let mut val = LabwareValidator::load(self.tx, &barcodes).with_unique_required(true);
        val.validate_active_destinations();
        let (labware, errors) = val.into_parts();
        problems.extend(errors);
        UcMap::from_values(labware, |lw| lw.barcode.as_str())
    }

    fn load_labware_types(
        &self,
        problems: &mut Problems,
        dests: &[TransferDestination],
    ) -> UcMap<LabwareType> {
        if dests
            .iter()
            .any(|d| d.labware_type().is_none() && d.barcode().is_none())
        {
            problems.add("Labware type name missing from request.");
        }
        let names: IndexSet<&str> = dests.iter().filter_map(TransferDestination::labware_type).collect();
        if names.is_empty() {
            return UcMap::new();
        }
        let found = self.tx.labware_types(names.iter().copied());
        let mut seen = HashSet::new();
        let missing: Vec<String> = names
            .iter()
            .filter(|name| !found.contains_key(name) && seen.insert(name.to_uppercase()))
            .map(|name| repr(name))
            .collect();
        if !missing.is_empty() {
            problems.add(format!("Unknown labware types: {}", bracketed(missing)));
        }
        found
    }

    fn check_pre_barcodes(
        &self,
        problems: &mut Problems,
        dests: &[TransferDestination],
        labware_types: &UcMap<LabwareType>,
    ) {
        let mut missing = IndexSet::new();
        let mut unexpected = IndexSet::new();
        for dest in dests {
            let lt = labware_types.get_opt(dest.labware_type());
            match (dest.pre_barcode(), lt) {
                (None, Some(lt)) if lt.prebarcoded => {
                    missing.insert(lt.name.as_str());
                }
                (None, _) => {}
                (Some(_), Some(lt)) if !lt.prebarcoded => {
                    unexpected.insert(lt.name.as_str());
                }
                (Some(barcode), _) => {
                    self.rules
                        .prebarcode
                        .validate(&barcode.to_uppercase(), problems);
                }
            }
        }
        if !missing.is_empty() {
            problems.add(format!(
                "Expected a prebarcode for labware type: {}",
                bracketed(missing)
            ));
        }
        if !unexpected.is_empty() {
            problems.add(format!(
                "Prebarcode not expected for labware type: {}",
                bracketed(unexpected)
            ));
        }
    }

    fn check_pre_barcodes_in_use(
        &self,
        problems: &mut Problems,
        dests: &[TransferDestination],
        existing: &UcMap<Labware>,
    ) {
        let mut seen = HashSet::new();
        for dest in dests {
            let Some(pre_barcode) = dest.pre_barcode() else {
                continue;
            };
            let pre_barcode = pre_barcode.to_uppercase();
            if let Some(lw) = existing.get_opt(dest.barcode()) {
                if !lw.answers_to(&pre_barcode) {
                    problems.add(format!(
                        "External barcode {} cannot be added to existing labware {}.",
                        repr(&pre_barcode),
                        lw.barcode
                    ));
                }
            } else if !seen.insert(pre_barcode.clone()) {
                problems.add(format!("External barcode given multiple times: {pre_barcode}"));
            } else if self.tx.exists_by_barcode(&pre_barcode) {
                problems.add(format!("Labware already exists with barcode {pre_barcode}."));
            } else if self.tx.exists_by_external_barcode(&pre_barcode) {
                problems.add(format!(
                    "Labware already exists with external barcode {pre_barcode}."
                ));
            }
        }
    }

    fn load_sources(&self, problems: &mut Problems, request: &TransferRequest) -> UcMap<Labware> {
        let mut barcodes = IndexSet::new();
        for content in request.contents() {
            match content.source_barcode() {
                Some(bc) => {
                    barcodes.insert(bc.to_uppercase());
                }
                None => problems.add("Missing source barcode."),
            }
        }
        if barcodes.is_empty() {
            return UcMap::new();
        }
        let found = UcMap::from_values(
            self.tx.labware_by_barcodes(barcodes.iter().map(String::as_str)),
            |lw| lw.barcode.as_str(),
        );
        let unknown: Vec<String> = barcodes
            .iter()
            .filter(|bc| !found.contains_key(bc))
            .map(|bc| repr(bc))
            .collect();
        if !unknown.is_empty() {
            problems.add(format!(
                "{}{}",
                pluralise("Unknown source barcode{s}: ", unknown.len()),
                bracketed(unknown)
            ));
        }
        found
    }

    fn validate_lot_numbers(&self, problems: &mut Problems, dests: &[TransferDestination]) {
        for dest in dests {
            for lot in [dest.lot_number(), dest.probe_lot_number()].into_iter().flatten() {
                self.rules.lot_number.validate(lot, problems);
            }
        }
    }

    fn validate_bio_states(
        &self,
        problems: &mut Problems,
        operation_type: Option<&str>,
        dests: &[TransferDestination],
    ) -> UcMap<BioState> {
        let names: IndexSet<&str> = dests.iter().filter_map(TransferDestination::bio_state).collect();
        if names.is_empty() {
            return UcMap::new();
        }
        let found = self.tx.bio_states(names.iter().copied());
        let unknown: Vec<&str> = names
            .iter()
            .copied()
            .filter(|name| !found.contains_key(name))
            .collect();
        if !unknown.is_empty() {
            problems.add(format!("Unknown bio state: {}", bracketed(unknown)));
        }
        let disallowed: Vec<&str> = found
            .values()
            .map(|bs| bs.name.as_str())
            .filter(|name| !self.rules.config.allows_bio_state_for(operation_type, name))
            .collect();
        if !disallowed.is_empty() {
            problems.add(format!(
                "Bio state not allowed for this operation: {}",
                bracketed(disallowed)
            ));
        }
        found
    }
}

fn validate_sources(problems: &mut Problems, sources: &UcMap<Labware>) {
    let mut val = LabwareValidator::new(sources.values().cloned().collect());
    val.validate_sources();
    problems.extend(val.into_parts().1);
}

fn check_listed_sources(problems: &mut Problems, request: &TransferRequest) -> UcMap<LabwareState> {
    let mut states = UcMap::new();
    if request.sources.is_empty() {
        return states;
    }
    let used: HashSet<String> = request
        .contents()
        .filter_map(|c| c.source_barcode())
        .map(str::to_uppercase)
        .collect();
    for src in &request.sources {
        let Some(bc) = src.barcode() else {
            problems.add("Source specified without barcode.");
            continue;
        };
        if states.contains_key(bc) {
            problems.add(format!("Repeated source barcode: {bc}"));
            continue;
        }
        match src.labware_state {
            None => problems.add(format!("Source given without labware state: {bc}")),
            Some(state) if !DECLARABLE_SOURCE_STATES.contains(&state) => {
                problems.add(format!("Unsupported new labware state: {state}"));
            }
            Some(state) => {
                states.insert(bc, state);
            }
        }
    }
    let unexpected: Vec<&str> = states.keys().filter(|bc| !used.contains(*bc)).collect();
    if !unexpected.is_empty() {
        problems.add(format!(
            "Source barcodes specified that do not map to any destination slots: {}",
            bracketed(unexpected)
        ));
    }
    states
}

fn validate_contents(problems: &mut Problems, loaded: &Loaded, request: &TransferRequest) {
    if request.destinations.is_empty() {
        problems.add("No destinations specified.");
        return;
    }
    if request.destinations.iter().any(|d| d.contents.is_empty()) {
        problems.add("No contents specified in destination.");
    }
    for dest in &request.destinations {
        let existing = loaded.existing.get_opt(dest.barcode());
        let lt = loaded.destination_type(dest);
        let mut seen = HashSet::new();
        for content in &dest.contents {
            let key = (
                content.source_barcode().map(str::to_uppercase),
                content.source_address,
                content.destination_address,
            );
            if !seen.insert(key) {
                problems.add(format!("Repeated copy specified: {content}"));
                continue;
            }
            match (content.destination_address, existing) {
                (None, _) => problems.add("No destination address specified."),
                (Some(address), Some(lw)) => match lw.slot(address) {
                    None => problems.add(format!(
                        "No such slot {address} in labware {}.",
                        lw.barcode
                    )),
                    Some(slot) if !slot.is_empty() => problems.add(format!(
                        "Slot {address} in labware {} is not empty.",
                        lw.barcode
                    )),
                    Some(_) => {}
                },
                (Some(address), None) => {
                    if let Some(lt) = lt.filter(|lt| !lt.contains(address)) {
                        problems.add(format!(
                            "Invalid address {address} for labware type {}.",
                            lt.name
                        ));
                    }
                }
            }
            let source = loaded.sources.get_opt(content.source_barcode());
            match (content.source_address, source) {
                (None, _) => problems.add("No source address specified."),
                (Some(address), Some(lw)) => match lw.slot(address) {
                    None => problems.add(format!(
                        "Invalid address {address} for source labware {}.",
                        lw.barcode
                    )),
                    Some(slot) if slot.is_empty() => problems.add(format!(
                        "Slot {address} in labware {} is empty.",
                        lw.barcode
                    )),
                    Some(_) => {}
                },
                (Some(_), None) => {}
            }
        }
    }
}

fn validate_cyt_assist(problems: &mut Problems, loaded: &Loaded, dests: &[TransferDestination]) {
    let is_cyt_assist = loaded
        .operation_type
        .as_ref()
        .is_some_and(|op| op.name.eq_ignore_ascii_case(CYTASSIST_OP));
    if !is_cyt_assist {
        return;
    }
    for dest in dests {
        let Some(lt) = loaded.destination_type(dest) else {
            continue;
        };
        let standard = lt.name.eq_ignore_ascii_case(CYTASSIST_SLIDE);
        if !standard && !lt.name.eq_ignore_ascii_case(CYTASSIST_SLIDE_XL) {
            problems.add(format!(
                "Expected labware type {CYTASSIST_SLIDE} or {CYTASSIST_SLIDE_XL} for operation {CYTASSIST_OP}."
            ));
        }
        let uses_blocked_slot = dest
            .contents
            .iter()
            .filter_map(|c| c.destination_address)
            .any(|a| a.column() == 1 && (2..=3).contains(&a.row()));
        if standard && uses_blocked_slot {
            problems.add("Slots B1 and C1 are disallowed for use in this operation.");
        }
    }
}

fn check_existing_destinations(
    problems: &mut Problems,
    loaded: &Loaded,
    dests: &[TransferDestination],
) {
    for dest in dests {
        let Some(lw) = loaded.existing.get_opt(dest.barcode()) else {
            continue;
        };
        if let Some(lt) = loaded.labware_types.get_opt(dest.labware_type()) {
            if lt.id != lw.labware_type.id {
                problems.add(format!(
                    "Labware type {} specified for labware {} but it already has type {}.",
                    lt.name, lw.barcode, lw.labware_type.name
                ));
            }
        }
        if let Some(bs) = loaded.bio_states.get_opt(dest.bio_state()) {
            let present: IndexSet<BioStateId> = lw.samples().map(|s| s.bio_state.id).collect();
            if let (1, Some(sample)) = (present.len(), lw.samples().next()) {
                if sample.bio_state.id != bs.id {
                    problems.add(format!(
                        "Bio state {} specified for labware {}, which already uses bio state {}.",
                        bs.name, lw.barcode, sample.bio_state.name
                    ));
                }
            }
        }
    }
}

/// Build the plan from a request that raised no problems
fn plan(request: &TransferRequest, loaded: Loaded) -> Result<ValidatedTransfer, TransferError> {
    let missing = |what: &str| TransferError::invariant(format!("validated request has no {what}"));
    let operation_type = loaded
        .operation_type
        .clone()
        .ok_or_else(|| missing("operation type"))?;
    let mut destinations = Vec::with_capacity(request.destinations.len());
    for dest in &request.destinations {
        let copies = dest
            .contents
            .iter()
            .map(|content| -> Result<PlannedCopy, TransferError> {
                Ok(PlannedCopy {
                    source_barcode: content
                        .source_barcode()
                        .ok_or_else(|| missing("source barcode"))?
                        .to_uppercase(),
                    source_address: content.source_address.ok_or_else(|| missing("source address"))?,
                    destination_address: content
                        .destination_address
                        .ok_or_else(|| missing("destination address"))?,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        destinations.push(PlannedDestination {
            labware_type: loaded
                .destination_type(dest)
                .cloned()
                .ok_or_else(|| missing("labware type"))?,
            existing: loaded.existing.get_opt(dest.barcode()).cloned(),
            pre_barcode: dest.pre_barcode().map(str::to_uppercase),
            bio_state: loaded.bio_states.get_opt(dest.bio_state()).cloned(),
            costing: dest.costing,
            lot_number: dest.lot_number().map(str::to_uppercase),
            probe_lot_number: dest.probe_lot_number().map(str::to_uppercase),
            copies,
        });
    }
    Ok(ValidatedTransfer {
        operation_type,
        destinations,
        sources: loaded.sources,
        source_states: loaded.source_states,
        work: loaded.work,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::work::StoreWorkService;
    use lims_model::{OperationBehaviour, TransferContent, TransferSource, WorkStatus};
    use lims_store::Database;
    use pretty_assertions::assert_eq;

    fn a(s: &str) -> Address {
        s.parse().unwrap()
    }

    /// Plate type, a tube source STAN-1 holding one cDNA sample in A1,
    /// an empty active plate STAN-D, and a Transfer operation type
    fn db() -> Database {
        let db = Database::new();
        let plate = db.add_labware_type("96 well plate", 8, 12, false).unwrap();
        let tube = db.add_labware_type("Tube", 1, 1, false).unwrap();
        db.add_labware_type("Prebarcoded tube", 1, 1, true).unwrap();
        db.add_labware_type(CYTASSIST_SLIDE, 4, 1, true).unwrap();
        let cdna = db.add_bio_state("cDNA");
        db.add_bio_state("Library");
        db.add_bio_state("Tissue");
        db.add_operation_type(
            "Transfer",
            OperationBehaviour {
                supports_active_dest: true,
                ..OperationBehaviour::default()
            },
            None,
        );
        db.add_operation_type("Strict", OperationBehaviour::default(), None);
        db.add_operation_type(CYTASSIST_OP, OperationBehaviour::default(), None);
        db.add_work("SGP1", WorkStatus::Active);
        let tissue = db.add_tissue("T1");
        let sample = db.add_sample(&tissue, Some(1), &cdna);
        db.add_labware(
            &tube,
            "STAN-1",
            None,
            LabwareState::Active,
            &[(a("A1"), vec![sample.clone()])],
        )
        .unwrap();
        db.add_labware(
            &plate,
            "STAN-D",
            Some("EXTD-01"),
            LabwareState::Active,
            &[(a("A1"), vec![sample])],
        )
        .unwrap();
        db
    }

    fn problems(db: &Database, request: &TransferRequest) -> Vec<String> {
        let rules = TransferRules::from_config(TransferConfig::default()).unwrap();
        let tx = db.begin("test");
        TransferValidator::new(&tx, &rules, &StoreWorkService)
            .problems(request)
            .into_vec()
    }

    fn copy(src: &str, dst: &str) -> TransferContent {
        TransferContent::new("STAN-1", a(src), a(dst))
    }

    #[test]
    fn valid_request_has_no_problems_and_plans() {
        let db = db();
        let request = TransferRequest::new("Transfer")
            .with_work_number("SGP1")
            .with_destination(
                TransferDestination::new_labware("96 well plate")
                    .with_bio_state("Library")
                    .with_lot_number("lot-1")
                    .with_content(copy("A1", "B2")),
            );
        assert_eq!(problems(&db, &request), Vec::<String>::new());

        let rules = TransferRules::from_config(TransferConfig::default()).unwrap();
        let tx = db.begin("test");
        let plan = TransferValidator::new(&tx, &rules, &StoreWorkService)
            .validate(&request)
            .unwrap();
        let dest = &plan.destinations()[0];
        assert_eq!(dest.labware_type().name, "96 well plate");
        assert_eq!(dest.lot_number.as_deref(), Some("LOT-1"));
        assert_eq!(plan.target_bio_state(dest).unwrap().name, "Library");
        assert_eq!(plan.work().unwrap().work_number, "SGP1");
        assert_eq!(
            dest.copies(),
            &[PlannedCopy {
                source_barcode: "STAN-1".into(),
                source_address: a("A1"),
                destination_address: a("B2"),
            }]
        );
    }

    #[test]
    fn missing_and_unknown_operation_type() {
        let db = db();
        let mut request = TransferRequest::default()
            .with_destination(TransferDestination::new_labware("Tube").with_content(copy("A1", "A1")));
        assert_eq!(problems(&db, &request), vec!["No operation type specified."]);
        request.operation_type = Some("Teleport".into());
        assert_eq!(
            problems(&db, &request),
            vec!["Unknown operation type: \"Teleport\""]
        );
    }

    #[test]
    fn every_rule_accumulates() {
        let db = db();
        let request = TransferRequest::new("Transfer")
            .with_work_number("SGP404")
            .with_destination(
                TransferDestination::new_labware("Flask")
                    .with_bio_state("Plasma")
                    .with_content(TransferContent::new("STAN-404", a("A1"), a("A1"))),
            )
            .with_destination(TransferDestination::default());
        assert_eq!(
            problems(&db, &request),
            vec![
                "Labware type name missing from request.",
                "Unknown labware types: [\"Flask\"]",
                "Unknown source barcode: [\"STAN-404\"]",
                "No contents specified in destination.",
                "Unknown bio state: [Plasma]",
                "Unknown work number: \"SGP404\"",
            ]
        );
    }

    #[test]
    fn prebarcode_presence_follows_type() {
        let db = db();
        let request = TransferRequest::new("Transfer")
            .with_destination(TransferDestination::new_labware("Prebarcoded tube").with_content(copy("A1", "A1")))
            .with_destination(
                TransferDestination::new_labware("Tube")
                    .with_pre_barcode("ABC123")
                    .with_content(copy("A1", "A1")),
            );
        assert_eq!(
            problems(&db, &request),
            vec![
                "Expected a prebarcode for labware type: [Prebarcoded tube]",
                "Prebarcode not expected for labware type: [Tube]",
            ]
        );
    }

    #[test]
    fn prebarcode_format_and_availability() {
        let db = db();
        let dest = |pre: &str| {
            TransferDestination::new_labware("Prebarcoded tube")
                .with_pre_barcode(pre)
                .with_content(copy("A1", "A1"))
        };
        let request = TransferRequest::new("Transfer")
            .with_destination(dest("ab"))
            .with_destination(dest("NEW-001"))
            .with_destination(dest("new-001"))
            .with_destination(dest("stan-d1"))
            .with_destination(dest("EXTD-01"))
            .with_destination(dest("STAN-1X"));
        let found = problems(&db, &request);
        assert_eq!(
            found,
            vec![
                "External barcode \"AB\" is shorter than the minimum length 6.",
                "External barcode given multiple times: NEW-001",
                "Labware already exists with external barcode EXTD-01.",
            ]
        );
    }

    #[test]
    fn prebarcode_taken_as_system_barcode() {
        let db = db();
        let lt = db.add_labware_type("Long tube", 1, 1, true).unwrap();
        db.add_labware(&lt, "PRE-0001", None, LabwareState::Active, &[])
            .unwrap();
        let request = TransferRequest::new("Transfer").with_destination(
            TransferDestination::new_labware("Prebarcoded tube")
                .with_pre_barcode("pre-0001")
                .with_content(copy("A1", "A1")),
        );
        assert_eq!(
            problems(&db, &request),
            vec!["Labware already exists with barcode PRE-0001."]
        );
    }

    #[test]
    fn existing_destination_rules() {
        let db = db();
        let request = TransferRequest::new("Transfer")
            .with_destination(
                TransferDestination::existing("STAN-D")
                    .with_pre_barcode("OTHER-1")
                    .with_content(copy("A1", "A1"))
                    .with_content(copy("A1", "M1")),
            )
            .with_destination(TransferDestination::existing("STAN-D").with_content(copy("A1", "B1")));
        assert_eq!(
            problems(&db, &request),
            vec![
                "Labware is repeated: [STAN-D]",
                "External barcode \"OTHER-1\" cannot be added to existing labware STAN-D.",
                "Slot A1 in labware STAN-D is not empty.",
                "No such slot M1 in labware STAN-D.",
            ]
        );
    }

    #[test]
    fn reuse_needs_supporting_operation_type() {
        let db = db();
        let request = TransferRequest::new("Strict")
            .with_destination(TransferDestination::existing("STAN-D").with_content(copy("A1", "B1")));
        assert_eq!(
            problems(&db, &request),
            vec!["Reusing existing destinations is not supported for operation type Strict."]
        );
    }

    #[test]
    fn existing_destination_must_agree_with_type_and_bio_state() {
        let db = db();
        let request = TransferRequest::new("Transfer").with_destination(
            TransferDestination::existing("STAN-D")
                .with_pre_barcode("extd-01")
                .with_bio_state("Library")
                .with_content(copy("A1", "B1")),
        );
        assert_eq!(
            problems(&db, &request),
            vec!["Bio state Library specified for labware STAN-D, which already uses bio state cDNA."]
        );

        let mut request = request;
        request.destinations[0].bio_state = None;
        request.destinations[0].pre_barcode = None;
        request.destinations[0].labware_type = Some("Tube".into());
        assert_eq!(
            problems(&db, &request),
            vec!["Labware type Tube specified for labware STAN-D but it already has type 96 well plate."]
        );
    }

    #[test]
    fn content_address_rules() {
        let db = db();
        let request = TransferRequest::new("Transfer").with_destination(
            TransferDestination::new_labware("Tube")
                .with_content(copy("A1", "A1"))
                .with_content(copy("A1", "A1"))
                .with_content(copy("A2", "B1"))
                .with_content(TransferContent::default()),
        );
        assert_eq!(
            problems(&db, &request),
            vec![
                "Missing source barcode.",
                "Repeated copy specified: {sourceBarcode=STAN-1, sourceAddress=A1, destinationAddress=A1}",
                "Invalid address B1 for labware type Tube.",
                "Invalid address A2 for source labware STAN-1.",
                "No destination address specified.",
                "No source address specified.",
            ]
        );
    }

    #[test]
    fn empty_source_slot_and_no_destinations() {
        let db = db();
        let plate = db.add_labware_type("Small plate", 1, 2, false).unwrap();
        let bs = db.add_bio_state("Probes");
        let tissue = db.add_tissue("T2");
        let sample = db.add_sample(&tissue, None, &bs);
        db.add_labware(&plate, "STAN-2", None, LabwareState::Active, &[(a("A1"), vec![sample])])
            .unwrap();
        let request = TransferRequest::new("Transfer").with_destination(
            TransferDestination::new_labware("Tube")
                .with_content(TransferContent::new("STAN-2", a("A2"), a("A1"))),
        );
        assert_eq!(
            problems(&db, &request),
            vec!["Slot A2 in labware STAN-2 is empty."]
        );
        assert_eq!(
            problems(&db, &TransferRequest::new("Transfer")),
            vec!["No destinations specified."]
        );
    }

    #[test]
    fn listed_sources_rules() {
        let db = db();
        let request = TransferRequest::new("Transfer")
            .with_destination(TransferDestination::new_labware("Tube").with_content(copy("A1", "A1")))
            .with_source(TransferSource::new("STAN-1", LabwareState::Discarded))
            .with_source(TransferSource::new("stan-1", LabwareState::Used))
            .with_source(TransferSource::default())
            .with_source(TransferSource {
                barcode: Some("STAN-9".into()),
                labware_state: None,
            })
            .with_source(TransferSource::new("STAN-8", LabwareState::Released))
            .with_source(TransferSource::new("STAN-D", LabwareState::Used));
        assert_eq!(
            problems(&db, &request),
            vec![
                "Repeated source barcode: stan-1",
                "Source specified without barcode.",
                "Source given without labware state: STAN-9",
                "Unsupported new labware state: released",
                "Source barcodes specified that do not map to any destination slots: [STAN-D]",
            ]
        );
    }

    #[test]
    fn unusable_source_labware() {
        let db = db();
        let tube = db.add_labware_type("Old tube", 1, 1, false).unwrap();
        db.add_labware(&tube, "STAN-E", None, LabwareState::Active, &[])
            .unwrap();
        let request = TransferRequest::new("Transfer").with_destination(
            TransferDestination::new_labware("Tube")
                .with_content(TransferContent::new("STAN-E", a("A1"), a("A1"))),
        );
        assert_eq!(
            problems(&db, &request),
            vec![
                "Labware is empty: [STAN-E]",
                "Slot A1 in labware STAN-E is empty.",
            ]
        );
    }

    #[test]
    fn lot_numbers_are_checked_independently() {
        let db = db();
        let request = TransferRequest::new("Transfer").with_destination(
            TransferDestination::new_labware("Tube")
                .with_lot_number("LOT 1")
                .with_probe_lot_number("PROBE-LOT-NUMBER-TOO-LONG")
                .with_content(copy("A1", "A1")),
        );
        assert_eq!(
            problems(&db, &request),
            vec![
                "Lot number \"LOT 1\" contains invalid characters [ ].",
                "Lot number \"PROBE-LOT-NUMBER-TOO-LONG\" is longer than the maximum length 20.",
            ]
        );
    }

    #[test]
    fn cyt_assist_type_and_blocked_slots() {
        let db = db();
        let request = TransferRequest::new("cytassist")
            .with_destination(
                TransferDestination::new_labware(CYTASSIST_SLIDE)
                    .with_pre_barcode("SLIDE-01")
                    .with_content(copy("A1", "B1")),
            )
            .with_destination(TransferDestination::new_labware("Tube").with_content(copy("A1", "A1")));
        assert_eq!(
            problems(&db, &request),
            vec![
                "Slots B1 and C1 are disallowed for use in this operation.",
                "Expected labware type Visium LP CytAssist or Visium LP CytAssist XL for operation CytAssist.",
            ]
        );
    }

    #[test]
    fn disallowed_bio_state() {
        let db = db();
        let request = TransferRequest::new("Transfer").with_destination(
            TransferDestination::new_labware("Tube")
                .with_bio_state("tissue")
                .with_content(copy("A1", "A1")),
        );
        assert_eq!(
            problems(&db, &request),
            vec!["Bio state not allowed for this operation: [Tissue]"]
        );
    }

    #[test]
    fn operation_bio_state_list_overrides_global_list() {
        let db = db();
        let config = TransferConfig::default().with_operation_bio_states("strict", ["Tissue"]);
        let rules = TransferRules::from_config(config).unwrap();
        let request = |op: &str, bio_state: &str| {
            TransferRequest::new(op).with_destination(
                TransferDestination::new_labware("Tube")
                    .with_bio_state(bio_state)
                    .with_content(copy("A1", "A1")),
            )
        };
        let tx = db.begin("test");
        let validator = TransferValidator::new(&tx, &rules, &StoreWorkService);

        assert!(validator.problems(&request("Strict", "Tissue")).is_empty());
        assert_eq!(
            validator.problems(&request("Strict", "cDNA")).into_vec(),
            vec!["Bio state not allowed for this operation: [cDNA]"]
        );
        assert_eq!(
            validator.problems(&request("Transfer", "Tissue")).into_vec(),
            vec!["Bio state not allowed for this operation: [Tissue]"]
        );
    }

    struct RejectAll;

    impl StringValidator for RejectAll {
        fn validate(&self, value: &str, problems: &mut Problems) -> bool {
            problems.add(format!("Rejected {value}."));
            false
        }
    }

    #[test]
    fn custom_string_validators_replace_format_rules() {
        let db = db();
        let rules = TransferRules::from_config(TransferConfig::default())
            .unwrap()
            .with_prebarcode_validator(Box::new(RejectAll))
            .with_lot_number_validator(Box::new(RejectAll));
        let request = TransferRequest::new("Transfer").with_destination(
            TransferDestination::new_labware("Prebarcoded tube")
                .with_pre_barcode("good-001")
                .with_lot_number("L1")
                .with_content(copy("A1", "A1")),
        );
        let tx = db.begin("test");
        let found = TransferValidator::new(&tx, &rules, &StoreWorkService).problems(&request);
        assert_eq!(found.into_vec(), vec!["Rejected GOOD-001.", "Rejected L1."]);
    }

    #[test]
    fn validate_returns_validation_error() {
        let db = db();
        let rules = TransferRules::from_config(TransferConfig::default()).unwrap();
        let tx = db.begin("test");
        let err = TransferValidator::new(&tx, &rules, &StoreWorkService)
            .validate(&TransferRequest::new("Transfer"))
            .unwrap_err();
        assert!(err.is_validation());
        assert_eq!(err.problems().unwrap(), &["No destinations specified.".to_string()]);
    }
}
