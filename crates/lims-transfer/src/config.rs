//! Transfer configuration
//!
//! Loaded from TOML:
//!
//! ```toml
//! allowed_bio_states = ["Probes", "cDNA", "Library"]
//! eviction_timeout_secs = 10
//!
//! [operation_bio_states]
//! "Library prep" = ["Library"]
//!
//! [prebarcode]
//! field_name = "External barcode"
//! min_len = 6
//! max_len = 20
//! allowed_chars = "A-Z0-9-"
//!
//! [lot_number]
//! field_name = "Lot number"
//! min_len = 1
//! max_len = 20
//! allowed_chars = "A-Za-z0-9_-"
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Config file could not be read
    #[error("cannot read config {path}: {source}")]
    Io {
        /// File path
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Config text is not valid TOML for this structure
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    /// A format rule cannot be compiled
    #[error("invalid format rule for {field}: {reason}")]
    InvalidRule {
        /// Field the rule applies to
        field: String,
        /// What is wrong with it
        reason: String,
    },
}

/// Length and character rules for a user-supplied string
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormatRule {
    /// Field name used in problem messages
    pub field_name: String,
    /// Minimum length in characters
    pub min_len: usize,
    /// Maximum length in characters
    pub max_len: usize,
    /// Regex character-class body of the allowed characters, e.g. `A-Z0-9-`
    pub allowed_chars: String,
}

impl FormatRule {
    /// Rule with the given bounds
    #[must_use]
    pub fn new(
        field_name: impl Into<String>,
        min_len: usize,
        max_len: usize,
        allowed_chars: impl Into<String>,
    ) -> Self {
        Self {
            field_name: field_name.into(),
            min_len,
            max_len,
            allowed_chars: allowed_chars.into(),
        }
    }
}

/// Transfer engine configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransferConfig {
    /// Bio states a destination may request, compared ignoring case
    pub allowed_bio_states: Vec<String>,
    /// Time allowed for post-commit storage eviction
    pub eviction_timeout_secs: u64,
    /// Per operation type replacements for `allowed_bio_states`, keyed by
    /// operation type name ignoring case
    pub operation_bio_states: BTreeMap<String, Vec<String>>,
    /// Format of destination prebarcodes, checked after upper-casing
    pub prebarcode: FormatRule,
    /// Format of lot and probe lot numbers
    pub lot_number: FormatRule,
}

impl TransferConfig {
    /// Default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With allowed bio states
    #[must_use]
    pub fn with_allowed_bio_states<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_bio_states = names.into_iter().map(Into::into).collect();
        self
    }

    /// With the bio states allowed for one operation type
    #[must_use]
    pub fn with_operation_bio_states<I, S>(mut self, operation_type: &str, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.operation_bio_states.insert(
            operation_type.to_string(),
            names.into_iter().map(Into::into).collect(),
        );
        self
    }

    /// With prebarcode rule
    #[inline]
    #[must_use]
    pub fn with_prebarcode(mut self, rule: FormatRule) -> Self {
        self.prebarcode = rule;
        self
    }

    /// With lot number rule
    #[inline]
    #[must_use]
    pub fn with_lot_number(mut self, rule: FormatRule) -> Self {
        self.lot_number = rule;
        self
    }

    /// With eviction timeout
    #[inline]
    #[must_use]
    pub fn with_eviction_timeout(mut self, timeout: Duration) -> Self {
        self.eviction_timeout_secs = timeout.as_secs();
        self
    }

    /// Eviction timeout
    #[inline]
    #[must_use]
    pub fn eviction_timeout(&self) -> Duration {
        Duration::from_secs(self.eviction_timeout_secs)
    }

    /// Whether the bio state name is allowed, ignoring case
    #[must_use]
    pub fn allows_bio_state(&self, name: &str) -> bool {
        self.allows_bio_state_for(None, name)
    }

    /// Whether the bio state name is allowed for an operation type
    ///
    /// An operation type listed in `operation_bio_states` uses its own list
    /// instead of `allowed_bio_states`.
    #[must_use]
    pub fn allows_bio_state_for(&self, operation_type: Option<&str>, name: &str) -> bool {
        self.bio_states_for(operation_type)
            .iter()
            .any(|allowed| allowed.eq_ignore_ascii_case(name))
    }

    fn bio_states_for(&self, operation_type: Option<&str>) -> &[String] {
        operation_type
            .and_then(|op| {
                self.operation_bio_states
                    .iter()
                    .find(|(key, _)| key.eq_ignore_ascii_case(op))
            })
            .map_or(&self.allowed_bio_states, |(_, names)| names)
    }

    /// Parse from TOML text; missing keys take their defaults
    ///
    /// # Errors
    /// `Parse` if the text is not valid.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Read a TOML config file
    ///
    /// # Errors
    /// `Io` if the file cannot be read; `Parse` if it is not valid.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            allowed_bio_states: [
                "Probes",
                "cDNA",
                "Library",
                "Library pre-clean",
                "Library post-clean",
                "Probes pre-clean",
                "Probes post-clean",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            prebarcode: FormatRule::new("External barcode", 6, 20, "A-Z0-9-"),
            lot_number: FormatRule::new("Lot number", 1, 20, "A-Za-z0-9_-"),
            eviction_timeout_secs: 10,
            operation_bio_states: BTreeMap::new(),
        }
    }
}
