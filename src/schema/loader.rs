//! Form loader for loading form and field definitions from disk
//!
//! Layout:
//! - `<dir>/fields/*.json`, one field definition per file
//! - `<dir>/forms/*.json`, one form definition per file
//!
//! Fields are loaded before forms so every layout reference can be checked.
//! The loader doubles as the in-process form and field repository.

use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;

use super::errors::{FormLoadError, FormLoadResult};
use super::types::{FieldDef, FieldId, FormDef, FormId};
use crate::observability::{Event, Logger};
use crate::store::{FieldRepository, FormRepository, StoreResult};

/// Registry of form and field definitions, optionally backed by a directory.
#[derive(Debug, Default)]
pub struct FormLoader {
    /// Directory containing `forms/` and `fields/`
    dir: Option<PathBuf>,
    forms: BTreeMap<FormId, FormDef>,
    fields: BTreeMap<FieldId, FieldDef>,
}

impl FormLoader {
    /// Creates a loader for the given definitions directory.
    pub fn new(dir: &Path) -> Self {
        Self {
            dir: Some(dir.to_path_buf()),
            ..Self::default()
        }
    }

    /// Creates a loader with no backing directory.
    pub fn in_memory() -> Self {
        Self::default()
    }

    pub fn dir(&self) -> Option<&Path> {
        self.dir.as_deref()
    }

    /// Loads all field and form files.
    ///
    /// A missing directory is treated as empty.
    pub fn load_all(&mut self) -> FormLoadResult<()> {
        let Some(dir) = self.dir.clone() else {
            return Ok(());
        };

        for path in json_files(&dir.join("fields"))? {
            let field: FieldDef = read_definition(&path)?;
            self.insert_field(field, &path.display().to_string())?;
        }

        for path in json_files(&dir.join("forms"))? {
            let form: FormDef = read_definition(&path)?;
            self.insert_form(form, &path.display().to_string())?;
        }

        let forms = self.forms.len().to_string();
        let fields = self.fields.len().to_string();
        Logger::info(
            Event::FormsLoaded.as_str(),
            &[("fields", &fields), ("forms", &forms)],
        );

        Ok(())
    }

    /// Registers a field directly.
    pub fn register_field(&mut self, field: FieldDef) -> FormLoadResult<()> {
        self.insert_field(field, "<in-memory>")
    }

    /// Registers a form directly; its fields must already be registered.
    pub fn register_form(&mut self, form: FormDef) -> FormLoadResult<()> {
        self.insert_form(form, "<in-memory>")
    }

    fn insert_field(&mut self, field: FieldDef, origin: &str) -> FormLoadResult<()> {
        field
            .validate_structure()
            .map_err(|e| FormLoadError::invalid(origin, e))?;

        if self.fields.contains_key(&field.id) {
            return Err(FormLoadError::Duplicate {
                kind: "field",
                id: field.id,
            });
        }

        self.fields.insert(field.id, field);
        Ok(())
    }

    fn insert_form(&mut self, form: FormDef, origin: &str) -> FormLoadResult<()> {
        form.validate_structure()
            .map_err(|e| FormLoadError::invalid(origin, e))?;

        if self.forms.contains_key(&form.id) {
            return Err(FormLoadError::Duplicate {
                kind: "form",
                id: form.id,
            });
        }
        if self.forms.values().any(|f| f.handle == form.handle) {
            return Err(FormLoadError::invalid(
                origin,
                format!("Form handle '{}' is already in use", form.handle),
            ));
        }

        // Every slot must resolve, and handles must be unique within the form
        let mut handles = HashSet::new();
        for slot in &form.layout {
            let field = self
                .fields
                .get(&slot.field_id)
                .ok_or_else(|| FormLoadError::UnknownField {
                    form: form.handle.clone(),
                    field_id: slot.field_id,
                })?;

            if !handles.insert(field.handle.as_str()) {
                return Err(FormLoadError::invalid(
                    origin,
                    format!(
                        "Form '{}' uses handle '{}' more than once",
                        form.handle, field.handle
                    ),
                ));
            }
        }

        self.forms.insert(form.id, form);
        Ok(())
    }

    pub fn form(&self, id: FormId) -> Option<&FormDef> {
        self.forms.get(&id)
    }

    pub fn form_with_handle(&self, handle: &str) -> Option<&FormDef> {
        self.forms.values().find(|f| f.handle == handle)
    }

    pub fn field(&self, id: FieldId) -> Option<&FieldDef> {
        self.fields.get(&id)
    }

    pub fn form_count(&self) -> usize {
        self.forms.len()
    }

    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    /// Writes a form definition under `<dir>/forms/`.
    pub fn save_form(&self, form: &FormDef) -> FormLoadResult<PathBuf> {
        self.write_definition("forms", &format!("form_{}.json", form.id), form)
    }

    /// Writes a field definition under `<dir>/fields/`.
    pub fn save_field(&self, field: &FieldDef) -> FormLoadResult<PathBuf> {
        self.write_definition("fields", &format!("field_{}.json", field.id), field)
    }

    fn write_definition<T: serde::Serialize>(
        &self,
        subdir: &str,
        filename: &str,
        value: &T,
    ) -> FormLoadResult<PathBuf> {
        let dir = self
            .dir
            .as_ref()
            .ok_or_else(|| FormLoadError::invalid(filename, "loader has no backing directory"))?
            .join(subdir);

        fs::create_dir_all(&dir).map_err(|e| {
            FormLoadError::malformed(
                dir.display().to_string(),
                format!("Failed to create directory: {}", e),
            )
        })?;

        let path = dir.join(filename);
        let content = serde_json::to_string_pretty(value).map_err(|e| {
            FormLoadError::malformed(path.display().to_string(), format!("Failed to serialize: {}", e))
        })?;

        fs::write(&path, content).map_err(|e| {
            FormLoadError::malformed(path.display().to_string(), format!("Failed to write file: {}", e))
        })?;

        Ok(path)
    }
}

impl FormRepository for FormLoader {
    fn form_by_id(&self, id: FormId) -> StoreResult<Option<FormDef>> {
        Ok(self.form(id).cloned())
    }

    fn form_by_handle(&self, handle: &str) -> StoreResult<Option<FormDef>> {
        Ok(self.form_with_handle(handle).cloned())
    }
}

impl FieldRepository for FormLoader {
    fn field_by_id(&self, id: FieldId) -> StoreResult<Option<FieldDef>> {
        Ok(self.field(id).cloned())
    }
}

/// Lists `*.json` files in a directory, sorted by name.
fn json_files(dir: &Path) -> FormLoadResult<Vec<PathBuf>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }

    let entries = fs::read_dir(dir).map_err(|e| {
        FormLoadError::malformed(
            dir.display().to_string(),
            format!("Failed to read directory: {}", e),
        )
    })?;

    let mut paths = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| {
            FormLoadError::malformed(
                dir.display().to_string(),
                format!("Failed to read directory entry: {}", e),
            )
        })?;
        let path = entry.path();
        if path.extension().is_some_and(|ext| ext == "json") {
            paths.push(path);
        }
    }

    paths.sort();
    Ok(paths)
}

fn read_definition<T: DeserializeOwned>(path: &Path) -> FormLoadResult<T> {
    let content = fs::read_to_string(path).map_err(|e| {
        FormLoadError::malformed(path.display().to_string(), format!("Failed to read file: {}", e))
    })?;

    serde_json::from_str(&content).map_err(|e| {
        FormLoadError::malformed(path.display().to_string(), format!("Invalid JSON: {}", e))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::types::LayoutField;
    use tempfile::TempDir;

    fn contact_form() -> FormDef {
        FormDef::new(1, "contact", true)
            .with_field(LayoutField::new(10))
            .with_field(LayoutField::required(11))
    }

    fn registered() -> FormLoader {
        let mut loader = FormLoader::in_memory();
        loader
            .register_field(FieldDef::required(10, "email", "Email", "PlainText"))
            .unwrap();
        loader
            .register_field(FieldDef::optional(11, "age", "Age", "Number"))
            .unwrap();
        loader.register_form(contact_form()).unwrap();
        loader
    }

    #[test]
    fn test_register_and_lookup() {
        let loader = registered();
        assert_eq!(loader.form_count(), 1);
        assert_eq!(loader.field_count(), 2);
        assert_eq!(loader.form_with_handle("contact").map(|f| f.id), Some(1));
        assert_eq!(loader.form_by_id(1).unwrap().map(|f| f.handle), Some("contact".into()));
        assert!(loader.form_by_id(2).unwrap().is_none());
    }

    #[test]
    fn test_unknown_layout_field_rejected() {
        let mut loader = FormLoader::in_memory();
        let result = loader.register_form(contact_form());
        assert!(matches!(
            result,
            Err(FormLoadError::UnknownField { field_id: 10, .. })
        ));
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let mut loader = registered();
        let err = loader
            .register_field(FieldDef::optional(10, "other", "Other", "PlainText"))
            .unwrap_err();
        assert_eq!(err.code(), "FORMENTRY_DEFINITION_DUPLICATE");

        let err = loader.register_form(contact_form()).unwrap_err();
        assert!(matches!(err, FormLoadError::Duplicate { kind: "form", id: 1 }));
    }

    #[test]
    fn test_duplicate_handles_within_form_rejected() {
        let mut loader = FormLoader::in_memory();
        loader
            .register_field(FieldDef::optional(1, "name", "Name", "PlainText"))
            .unwrap();
        loader
            .register_field(FieldDef::optional(2, "name", "Name again", "PlainText"))
            .unwrap();

        let form = FormDef::new(5, "dupes", false)
            .with_field(LayoutField::new(1))
            .with_field(LayoutField::new(2));
        assert!(loader.register_form(form).is_err());
    }

    #[test]
    fn test_save_then_load_from_disk() {
        let tmp = TempDir::new().unwrap();
        let writer = FormLoader::new(tmp.path());
        writer
            .save_field(&FieldDef::required(10, "email", "Email", "PlainText"))
            .unwrap();
        writer
            .save_field(&FieldDef::optional(11, "age", "Age", "Number"))
            .unwrap();
        writer.save_form(&contact_form()).unwrap();

        let mut loader = FormLoader::new(tmp.path());
        loader.load_all().unwrap();
        assert_eq!(loader.form(1), Some(&contact_form()));
        assert_eq!(loader.field(11).map(|f| f.handle.as_str()), Some("age"));
    }

    #[test]
    fn test_missing_directory_is_empty() {
        let tmp = TempDir::new().unwrap();
        let mut loader = FormLoader::new(&tmp.path().join("absent"));
        loader.load_all().unwrap();
        assert_eq!(loader.form_count(), 0);
    }

    #[test]
    fn test_malformed_file_reported() {
        let tmp = TempDir::new().unwrap();
        let forms = tmp.path().join("forms");
        fs::create_dir_all(&forms).unwrap();
        fs::write(forms.join("broken.json"), "{ not json").unwrap();

        let mut loader = FormLoader::new(tmp.path());
        let err = loader.load_all().unwrap_err();
        assert_eq!(err.code(), "FORMENTRY_DEFINITION_MALFORMED");
    }

    #[test]
    fn test_in_memory_loader_cannot_save() {
        let loader = FormLoader::in_memory();
        assert!(loader.save_form(&contact_form()).is_err());
    }
}
