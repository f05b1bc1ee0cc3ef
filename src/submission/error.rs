//! Submission error types
//!
//! Only fatal conditions are errors. Validation failures, vetoes and
//! rejected writes are reported as `ProcessOutcome` values instead.

use thiserror::Error;

use crate::schema::{FieldId, FormId};
use crate::store::StorageError;

/// Submission module result type
pub type SubmissionResult<T> = Result<T, SubmissionError>;

/// Fatal submission errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubmissionError {
    /// The submission references a form that does not exist
    #[error("Form {form_id} not found")]
    FormNotFound { form_id: FormId },

    /// A form layout references a field that does not exist
    #[error("Field {field_id} not found")]
    FieldNotFound { field_id: FieldId },

    /// Storage raised while resolving or persisting; any owned transaction was rolled back
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl SubmissionError {
    /// Stable error code
    pub fn code(&self) -> &'static str {
        match self {
            Self::FormNotFound { .. } => "FORMENTRY_FORM_NOT_FOUND",
            Self::FieldNotFound { .. } => "FORMENTRY_FIELD_NOT_FOUND",
            Self::Storage(e) => e.code(),
        }
    }

    pub fn is_storage(&self) -> bool {
        matches!(self, Self::Storage(_))
    }
}
