//! Format validators for user-supplied strings

use crate::config::{ConfigError, FormatRule};
use crate::problems::{bracketed, Problems};
use indexmap::IndexSet;
use regex::Regex;

/// Checks a string and reports what is wrong with it
pub trait StringValidator: Send + Sync {
    /// Report problems with `value`; returns whether it is valid
    fn validate(&self, value: &str, problems: &mut Problems) -> bool;
}

/// Length and character-set validator built from a [`FormatRule`]
#[derive(Debug, Clone)]
pub struct FormatValidator {
    rule: FormatRule,
    invalid: Regex,
}

impl FormatValidator {
    /// Compile a rule
    ///
    /// # Errors
    /// `InvalidRule` if the bounds are inverted or the character class does
    /// not compile.
    pub fn new(rule: FormatRule) -> Result<Self, ConfigError> {
        if rule.min_len > rule.max_len {
            return Err(ConfigError::InvalidRule {
                field: rule.field_name,
                reason: format!("min_len {} exceeds max_len {}", rule.min_len, rule.max_len),
            });
        }
        let invalid = Regex::new(&format!("[^{}]", rule.allowed_chars)).map_err(|err| {
            ConfigError::InvalidRule {
                field: rule.field_name.clone(),
                reason: err.to_string(),
            }
        })?;
        Ok(Self { rule, invalid })
    }

    /// Rule this validator applies
    #[inline]
    #[must_use]
    pub fn rule(&self) -> &FormatRule {
        &self.rule
    }
}

impl StringValidator for FormatValidator {
    fn validate(&self, value: &str, problems: &mut Problems) -> bool {
        let field = &self.rule.field_name;
        let len = value.chars().count();
        let mut valid = true;
        if len < self.rule.min_len {
            problems.add(format!(
                "{field} \"{value}\" is shorter than the minimum length {}.",
                self.rule.min_len
            ));
            valid = false;
        } else if len > self.rule.max_len {
            problems.add(format!(
                "{field} \"{value}\" is longer than the maximum length {}.",
                self.rule.max_len
            ));
            valid = false;
        }
        let bad: IndexSet<&str> = self.invalid.find_iter(value).map(|m| m.as_str()).collect();
        if !bad.is_empty() {
            problems.add(format!(
                "{field} \"{value}\" contains invalid characters {}.",
                bracketed(bad)
            ));
            valid = false;
        }
        valid
    }
}
