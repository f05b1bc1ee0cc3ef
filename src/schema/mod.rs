//! Form schema subsystem
//!
//! Form and field definitions, raw submitted values, and the field
//! validator that checks one against the other.
//!
//! # Design Principles
//!
//! - Validation is pure: (fields, raw input) in, ordered messages out
//! - Messages follow layout order
//! - A layout override can only make a field required
//! - Unknown field types are accepted without checks

mod errors;
mod loader;
mod types;
mod validator;
mod values;

pub use errors::{FormLoadError, FormLoadResult, ValidationErrors};
pub use loader::FormLoader;
pub use types::{
    effective_required, BoundField, EntryId, FieldDef, FieldId, FieldKind, FormDef, FormId,
    LayoutField,
};
pub use validator::{validate, CheckboxRule, FieldValidator};
pub use values::{RawSubmission, SubmittedValue};
