//! Field validator for submitted values
//!
//! Validation semantics:
//! - Fields are checked in layout order; messages keep that order
//! - At most one message per field
//! - Absent values are treated as the empty string
//! - Kinds without a rule never produce a message
//!
//! The validator has no knowledge of storage, hooks or transactions.

use serde::{Deserialize, Serialize};

use super::errors::ValidationErrors;
use super::types::{BoundField, FieldKind};
use super::values::{RawSubmission, SubmittedValue};

/// How a required checkbox group is judged to be unanswered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckboxRule {
    /// Flag the group when exactly one value was posted.
    ///
    /// Checkbox groups post a hidden empty entry ahead of the checked boxes,
    /// so a single posted value is the sentinel alone. A group whose sentinel
    /// is missing (zero values) passes.
    #[default]
    LegacySingleValue,
    /// Flag the group when no non-empty value was posted.
    NoSelection,
}

/// Validates raw submissions against bound form fields.
///
/// Validation is deterministic and does not mutate its inputs.
#[derive(Debug, Clone, Copy, Default)]
pub struct FieldValidator {
    checkbox_rule: CheckboxRule,
}

impl FieldValidator {
    /// Creates a validator with the legacy checkbox rule.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_checkbox_rule(checkbox_rule: CheckboxRule) -> Self {
        Self { checkbox_rule }
    }

    pub fn checkbox_rule(&self) -> CheckboxRule {
        self.checkbox_rule
    }

    /// Validates every field in order and returns the collected messages.
    pub fn validate(&self, fields: &[BoundField], raw: &RawSubmission) -> ValidationErrors {
        let mut errors = ValidationErrors::new();
        for field in fields {
            if let Some(message) = self.check_field(field, raw.get(field.handle())) {
                errors.push(message);
            }
        }
        errors
    }

    /// Applies the rule for one field's kind.
    fn check_field(&self, field: &BoundField, value: Option<&SubmittedValue>) -> Option<String> {
        let required = field.is_required();
        let name = field.name();

        match field.kind() {
            FieldKind::PlainText | FieldKind::RichText => {
                (required && is_blank(value)).then(|| format!("{} cannot be blank.", name))
            }
            FieldKind::Number => {
                let numeric = value.and_then(SubmittedValue::as_text).is_some_and(is_all_digits);
                if required {
                    (!numeric).then(|| {
                        format!("{} cannot be blank and needs to contain only numbers.", name)
                    })
                } else {
                    (!numeric && !is_blank(value))
                        .then(|| format!("{} needs to contain only numbers.", name))
                }
            }
            FieldKind::MultiSelect => (required && is_blank(value))
                .then(|| format!("{} please select at least one.", name)),
            FieldKind::RadioButtons | FieldKind::Dropdown => {
                (required && is_blank(value)).then(|| format!("{} please select one.", name))
            }
            FieldKind::Checkboxes => (required && self.checkboxes_unanswered(value))
                .then(|| format!("{} please select at least one.", name)),
            FieldKind::Other(_) => None,
        }
    }

    fn checkboxes_unanswered(&self, value: Option<&SubmittedValue>) -> bool {
        match self.checkbox_rule {
            CheckboxRule::LegacySingleValue => value.map_or(0, SubmittedValue::count) == 1,
            CheckboxRule::NoSelection => value.map_or(0, SubmittedValue::selected_count) == 0,
        }
    }
}

/// Validates with the default rules.
pub fn validate(fields: &[BoundField], raw: &RawSubmission) -> ValidationErrors {
    FieldValidator::new().validate(fields, raw)
}

/// Absent values normalize to the empty string.
fn is_blank(value: Option<&SubmittedValue>) -> bool {
    value.map_or(true, SubmittedValue::is_blank)
}

/// Every character is an ASCII digit; the empty string is not numeric.
fn is_all_digits(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}
