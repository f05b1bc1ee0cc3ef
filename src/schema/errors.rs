//! Validation messages and form loading errors
//!
//! Field violations are not errors in the `Result` sense: they are collected
//! into an ordered `ValidationErrors` list and handed back to the caller.
//! Problems with the definitions themselves surface as `FormLoadError`.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Ordered list of human-readable violations.
///
/// Empty means the submission is valid.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ValidationErrors {
    messages: Vec<String>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, message: impl Into<String>) {
        self.messages.push(message.into());
    }

    /// Append another list, keeping its order
    pub fn extend(&mut self, other: ValidationErrors) {
        self.messages.extend(other.messages);
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn messages(&self) -> &[String] {
        &self.messages
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.messages.iter().map(String::as_str)
    }

    pub fn into_messages(self) -> Vec<String> {
        self.messages
    }
}

impl From<Vec<String>> for ValidationErrors {
    fn from(messages: Vec<String>) -> Self {
        Self { messages }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.messages.join(" "))
    }
}

/// Errors raised while loading or registering form definitions
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormLoadError {
    /// A definition file could not be read or parsed
    #[error("Malformed definition '{path}': {reason}")]
    Malformed { path: String, reason: String },

    /// A definition violates a structural rule
    #[error("Invalid definition '{path}': {reason}")]
    Invalid { path: String, reason: String },

    /// A form or field id was registered twice
    #[error("Duplicate {kind} id {id}")]
    Duplicate { kind: &'static str, id: u64 },

    /// A form layout references a field that does not exist
    #[error("Form '{form}' references unknown field {field_id}")]
    UnknownField { form: String, field_id: u64 },
}

impl FormLoadError {
    pub fn malformed(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Malformed {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn invalid(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Invalid {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Stable error code
    pub fn code(&self) -> &'static str {
        match self {
            Self::Malformed { .. } => "FORMENTRY_DEFINITION_MALFORMED",
            Self::Invalid { .. } => "FORMENTRY_DEFINITION_INVALID",
            Self::Duplicate { .. } => "FORMENTRY_DEFINITION_DUPLICATE",
            Self::UnknownField { .. } => "FORMENTRY_DEFINITION_UNKNOWN_FIELD",
        }
    }
}

/// Result type for form loading
pub type FormLoadResult<T> = Result<T, FormLoadError>;
