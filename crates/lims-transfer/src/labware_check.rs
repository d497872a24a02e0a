//! Usability checks for loaded labware
//!
//! A [`LabwareValidator`] is loaded with labware (and told about barcodes
//! that found nothing), then asked to validate it for a role. Problems are
//! grouped: one message per kind of problem, listing the barcodes.

use crate::problems::{bracketed, pluralise};
use indexmap::IndexSet;
use lims_model::{Labware, LabwareState};
use lims_store::Transaction;

/// Validates labware for use as sources or reused destinations
#[derive(Debug, Clone, Default)]
pub struct LabwareValidator {
    labware: Vec<Labware>,
    unknown: Vec<String>,
    unique_required: bool,
    errors: Vec<String>,
}

impl LabwareValidator {
    /// Validator for labware already loaded
    #[must_use]
    pub fn new(labware: Vec<Labware>) -> Self {
        Self {
            labware,
            ..Self::default()
        }
    }

    /// Load labware by barcode, remembering barcodes that found nothing
    #[must_use]
    pub fn load(tx: &Transaction<'_>, barcodes: &[&str]) -> Self {
        let mut labware = Vec::with_capacity(barcodes.len());
        let mut unknown = Vec::new();
        for bc in barcodes {
            match tx.labware(bc) {
                Some(lw) => labware.push(lw),
                None => unknown.push((*bc).to_string()),
            }
        }
        Self {
            labware,
            unknown,
            ..Self::default()
        }
    }

    /// Whether the same labware may appear more than once
    #[inline]
    #[must_use]
    pub fn with_unique_required(mut self, unique_required: bool) -> Self {
        self.unique_required = unique_required;
        self
    }

    /// Check labware copied from: present, not empty, not finished with
    pub fn validate_sources(&mut self) {
        self.check_common();
        self.check_grouped("Labware is empty: ", |lw| lw.is_empty());
        for state in [
            LabwareState::Discarded,
            LabwareState::Released,
            LabwareState::Destroyed,
            LabwareState::Used,
        ] {
            self.check_grouped(&format!("Labware is {state}: "), |lw| lw.is(state));
        }
    }

    /// Check labware reused as a destination: present and active
    pub fn validate_active_destinations(&mut self) {
        self.check_common();
        self.check_grouped("Labware is not active: ", |lw| {
            !lw.is(LabwareState::Active)
        });
    }

    fn check_common(&mut self) {
        if !self.unknown.is_empty() {
            self.errors.push(format!(
                "{}{}",
                pluralise("Unknown labware barcode{s}: ", self.unknown.len()),
                bracketed(&self.unknown)
            ));
        }
        if self.unique_required {
            let mut seen = IndexSet::new();
            let repeated: IndexSet<&str> = self
                .labware
                .iter()
                .filter(|lw| !seen.insert(lw.id))
                .map(|lw| lw.barcode.as_str())
                .collect();
            if !repeated.is_empty() {
                self.errors
                    .push(format!("Labware is repeated: {}", bracketed(repeated)));
            }
        }
    }

    fn check_grouped(&mut self, prefix: &str, pred: impl Fn(&Labware) -> bool) {
        let matching: IndexSet<&str> = self
            .labware
            .iter()
            .filter(|lw| pred(lw))
            .map(|lw| lw.barcode.as_str())
            .collect();
        if !matching.is_empty() {
            self.errors
                .push(format!("{prefix}{}", bracketed(matching)));
        }
    }

    /// Loaded labware
    #[inline]
    #[must_use]
    pub fn labware(&self) -> &[Labware] {
        &self.labware
    }

    /// Problems found so far
    #[inline]
    #[must_use]
    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    /// Loaded labware and problems found
    #[must_use]
    pub fn into_parts(self) -> (Vec<Labware>, Vec<String>) {
        (self.labware, self.errors)
    }
}
