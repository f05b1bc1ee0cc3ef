//! Submission entries and records
//!
//! A `SubmissionEntry` is the in-memory candidate handed to the pipeline. It
//! accumulates validation messages and receives its id when the element
//! store accepts it. A `SubmissionRecord` is the row written to the record
//! store: the raw payload is kept as an opaque JSON blob.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::schema::{EntryId, FormId, RawSubmission, ValidationErrors};

/// Default limit on record titles, in characters
pub const DEFAULT_TITLE_MAX_LENGTH: usize = 255;

/// Candidate submission
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionEntry {
    /// Assigned by the element store
    #[serde(default)]
    pub id: Option<EntryId>,
    pub form_id: FormId,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub data: RawSubmission,
    #[serde(skip)]
    errors: ValidationErrors,
}

impl SubmissionEntry {
    pub fn new(form_id: FormId, title: impl Into<String>, data: RawSubmission) -> Self {
        Self {
            id: None,
            form_id,
            title: title.into(),
            data,
            errors: ValidationErrors::new(),
        }
    }

    pub fn add_error(&mut self, message: impl Into<String>) {
        self.errors.push(message);
    }

    pub fn add_errors(&mut self, errors: ValidationErrors) {
        self.errors.extend(errors);
    }

    pub fn errors(&self) -> &ValidationErrors {
        &self.errors
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn clear_errors(&mut self) {
        self.errors = ValidationErrors::new();
    }
}

/// Record-level constraints checked independently of field rules
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordRules {
    pub title_max_length: usize,
}

impl RecordRules {
    pub fn new(title_max_length: usize) -> Self {
        Self { title_max_length }
    }
}

impl Default for RecordRules {
    fn default() -> Self {
        Self::new(DEFAULT_TITLE_MAX_LENGTH)
    }
}

/// Persisted shape of a submission
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionRecord {
    pub id: Option<EntryId>,
    pub form_id: FormId,
    pub title: String,
    /// Raw payload, stored without per-field decomposition
    pub data: Value,
    pub date_created: DateTime<Utc>,
}

impl SubmissionRecord {
    /// Build a record from a candidate; the id is copied in only after the element is saved
    pub fn from_entry(entry: &SubmissionEntry) -> Self {
        Self {
            id: None,
            form_id: entry.form_id,
            title: entry.title.clone(),
            data: entry.data.to_json(),
            date_created: Utc::now(),
        }
    }

    /// Checks record-level rules, returning messages in rule order
    pub fn validate(&self, rules: &RecordRules) -> ValidationErrors {
        let mut errors = ValidationErrors::new();

        if self.form_id == 0 {
            errors.push("Form ID cannot be blank.");
        }
        if self.title.chars().count() > rules.title_max_length {
            errors.push(format!(
                "Title is too long (maximum is {} characters).",
                rules.title_max_length
            ));
        }

        errors
    }
}
