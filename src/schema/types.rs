//! Form and field definitions
//!
//! A form is an ordered layout of field references. Each layout slot may force
//! the referenced field to be required; it can never relax a field that is
//! required on its own.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// Stable form identifier
pub type FormId = u64;

/// Stable field identifier
pub type FieldId = u64;

/// Identifier assigned to a submission when it is persisted
pub type EntryId = u64;

/// Closed set of field kinds that carry validation rules.
///
/// Unknown type names are kept in `Other` and never produce violations.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum FieldKind {
    PlainText,
    RichText,
    Number,
    MultiSelect,
    RadioButtons,
    Dropdown,
    Checkboxes,
    /// Any type without a rule
    Other(String),
}

impl FieldKind {
    /// Returns the type name used in definition files
    pub fn type_name(&self) -> &str {
        match self {
            FieldKind::PlainText => "PlainText",
            FieldKind::RichText => "RichText",
            FieldKind::Number => "Number",
            FieldKind::MultiSelect => "MultiSelect",
            FieldKind::RadioButtons => "RadioButtons",
            FieldKind::Dropdown => "Dropdown",
            FieldKind::Checkboxes => "Checkboxes",
            FieldKind::Other(name) => name,
        }
    }

    /// Returns true if the validator has a rule for this kind
    pub fn has_rule(&self) -> bool {
        !matches!(self, FieldKind::Other(_))
    }
}

impl From<String> for FieldKind {
    fn from(name: String) -> Self {
        match name.as_str() {
            "PlainText" => FieldKind::PlainText,
            // Older layouts store rich text fields under this name
            "RichText" | "RichField" => FieldKind::RichText,
            "Number" => FieldKind::Number,
            "MultiSelect" => FieldKind::MultiSelect,
            "RadioButtons" => FieldKind::RadioButtons,
            "Dropdown" => FieldKind::Dropdown,
            "Checkboxes" => FieldKind::Checkboxes,
            _ => FieldKind::Other(name),
        }
    }
}

impl From<&str> for FieldKind {
    fn from(name: &str) -> Self {
        FieldKind::from(name.to_string())
    }
}

impl From<FieldKind> for String {
    fn from(kind: FieldKind) -> Self {
        match kind {
            FieldKind::Other(name) => name,
            known => known.type_name().to_string(),
        }
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.type_name())
    }
}

/// A single field's schema
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDef {
    /// Field identifier referenced from form layouts
    pub id: FieldId,
    /// Lookup key into the raw submission
    pub handle: String,
    /// Display label used in messages
    pub name: String,
    /// Field type
    #[serde(rename = "type")]
    pub kind: FieldKind,
    /// The field's own required flag
    #[serde(default)]
    pub required: bool,
}

impl FieldDef {
    /// Create a field with an explicit required flag
    pub fn new(
        id: FieldId,
        handle: impl Into<String>,
        name: impl Into<String>,
        kind: impl Into<FieldKind>,
        required: bool,
    ) -> Self {
        Self {
            id,
            handle: handle.into(),
            name: name.into(),
            kind: kind.into(),
            required,
        }
    }

    /// Create a required field
    pub fn required(
        id: FieldId,
        handle: impl Into<String>,
        name: impl Into<String>,
        kind: impl Into<FieldKind>,
    ) -> Self {
        Self::new(id, handle, name, kind, true)
    }

    /// Create an optional field
    pub fn optional(
        id: FieldId,
        handle: impl Into<String>,
        name: impl Into<String>,
        kind: impl Into<FieldKind>,
    ) -> Self {
        Self::new(id, handle, name, kind, false)
    }

    /// Validates the field definition itself (not a submitted value)
    pub fn validate_structure(&self) -> Result<(), String> {
        if self.handle.trim().is_empty() {
            return Err(format!("Field {} must have a non-empty handle", self.id));
        }
        Ok(())
    }
}

/// One slot of a form layout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayoutField {
    /// Referenced field
    pub field_id: FieldId,
    /// Layout-level required override
    #[serde(default)]
    pub required: bool,
}

impl LayoutField {
    pub fn new(field_id: FieldId) -> Self {
        Self {
            field_id,
            required: false,
        }
    }

    /// Layout slot that forces the field to be required
    pub fn required(field_id: FieldId) -> Self {
        Self {
            field_id,
            required: true,
        }
    }
}

/// A form definition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormDef {
    pub id: FormId,
    pub handle: String,
    #[serde(default)]
    pub name: String,
    /// Whether accepted submissions are written to storage
    #[serde(default)]
    pub persist_submissions: bool,
    /// Ordered field layout; order determines message order
    #[serde(default)]
    pub layout: Vec<LayoutField>,
}

impl FormDef {
    /// Create a form with an empty layout
    pub fn new(id: FormId, handle: impl Into<String>, persist_submissions: bool) -> Self {
        let handle = handle.into();
        Self {
            id,
            name: handle.clone(),
            handle,
            persist_submissions,
            layout: Vec::new(),
        }
    }

    /// Append a layout slot
    pub fn with_field(mut self, slot: LayoutField) -> Self {
        self.layout.push(slot);
        self
    }

    /// Validates the form structure itself
    pub fn validate_structure(&self) -> Result<(), String> {
        if self.handle.trim().is_empty() {
            return Err(format!("Form {} must have a non-empty handle", self.id));
        }

        let mut seen = HashSet::new();
        for slot in &self.layout {
            if !seen.insert(slot.field_id) {
                return Err(format!(
                    "Form '{}' lists field {} more than once",
                    self.handle, slot.field_id
                ));
            }
        }

        Ok(())
    }
}

/// Merge a field's own required flag with its layout override.
///
/// The override only ever strengthens the requirement.
pub fn effective_required(field_required: bool, layout_override: bool) -> bool {
    field_required || layout_override
}

/// A field definition bound to the layout slot that placed it on a form
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundField {
    pub field: FieldDef,
    pub layout_required: bool,
}

impl BoundField {
    pub fn new(field: FieldDef, layout_required: bool) -> Self {
        Self {
            field,
            layout_required,
        }
    }

    /// Bind a field without any layout override
    pub fn plain(field: FieldDef) -> Self {
        Self::new(field, false)
    }

    pub fn handle(&self) -> &str {
        &self.field.handle
    }

    pub fn name(&self) -> &str {
        &self.field.name
    }

    pub fn kind(&self) -> &FieldKind {
        &self.field.kind
    }

    /// Required after applying the layout override
    pub fn is_required(&self) -> bool {
        effective_required(self.field.required, self.layout_required)
    }
}

impl From<FieldDef> for BoundField {
    fn from(field: FieldDef) -> Self {
        Self::plain(field)
    }
}
