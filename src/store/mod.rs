//! Storage collaborators
//!
//! The submission pipeline never reaches storage directly. Everything it
//! needs is expressed as a trait here so callers can inject real backends
//! or in-memory fakes:
//!
//! - `FormRepository` / `FieldRepository`: read-only definition lookups
//! - `ElementStore`: content elements; assigns submission ids
//! - `RecordStore`: the `{id, form_id, title, data}` submission rows
//! - `TransactionManager`: begin / commit / rollback on the shared backend

mod errors;
mod memory;

pub use errors::{StorageError, StoreResult};
pub use memory::MemoryStore;

use crate::schema::{EntryId, FieldDef, FieldId, FormDef, FormId};
use crate::submission::{SubmissionEntry, SubmissionRecord};

/// Form definition lookups
pub trait FormRepository: Send + Sync {
    /// Resolve a form by id
    fn form_by_id(&self, id: FormId) -> StoreResult<Option<FormDef>>;

    /// Resolve a form by handle
    fn form_by_handle(&self, handle: &str) -> StoreResult<Option<FormDef>>;
}

/// Field definition lookups
pub trait FieldRepository: Send + Sync {
    fn field_by_id(&self, id: FieldId) -> StoreResult<Option<FieldDef>>;
}

/// Content element store
pub trait ElementStore: Send + Sync {
    /// Save a submission as a content element.
    ///
    /// On success the store assigns `entry.id` and returns `true`.
    /// `false` means the element was rejected without raising.
    fn save_element(&self, entry: &mut SubmissionEntry) -> StoreResult<bool>;

    /// Read a stored element back
    fn element_by_id(&self, id: EntryId) -> StoreResult<Option<SubmissionEntry>>;
}

/// Submission record store
pub trait RecordStore: Send + Sync {
    /// Persist a record; `run_validation` asks the store to re-check record rules.
    fn save(&self, record: &SubmissionRecord, run_validation: bool) -> StoreResult<bool>;

    /// All stored records, in id order
    fn find_all(&self) -> StoreResult<Vec<SubmissionRecord>>;

    /// Stored records for one form, in id order
    fn find_by_form(&self, form_id: FormId) -> StoreResult<Vec<SubmissionRecord>>;

    /// Ids of all stored records
    fn all_ids(&self) -> StoreResult<Vec<EntryId>> {
        Ok(self.find_all()?.into_iter().filter_map(|r| r.id).collect())
    }
}

/// Transaction control on the shared backend
pub trait TransactionManager: Send + Sync {
    /// Whether a transaction is currently open
    fn in_transaction(&self) -> bool;

    fn begin(&self) -> StoreResult<()>;

    fn commit(&self) -> StoreResult<()>;

    fn rollback(&self) -> StoreResult<()>;
}
