//! In-memory storage backend
//!
//! Implements the element store, record store and transaction manager over
//! a single shared state. A transaction snapshots the committed state on
//! `begin`; `rollback` restores the snapshot and `commit` discards it.
//!
//! A transaction belongs to the thread that began it. Other threads see
//! `in_transaction() == false`, and their `begin` and writes block until the
//! owner commits or rolls back. Lock order is transaction, then state.

use std::collections::BTreeMap;
use std::sync::{Condvar, Mutex, MutexGuard, RwLock};
use std::thread::{self, ThreadId};

use super::errors::{StorageError, StoreResult};
use super::{ElementStore, RecordStore, TransactionManager};
use crate::schema::{EntryId, FormId};
use crate::submission::{RecordRules, SubmissionEntry, SubmissionRecord};

#[derive(Debug, Clone, Default)]
struct StoreState {
    last_id: EntryId,
    elements: BTreeMap<EntryId, SubmissionEntry>,
    records: BTreeMap<EntryId, SubmissionRecord>,
}

/// Open transaction: the owning thread and the state to restore on rollback
#[derive(Debug)]
struct OpenTransaction {
    owner: ThreadId,
    snapshot: StoreState,
}

impl OpenTransaction {
    fn owned_by_current(&self) -> bool {
        self.owner == thread::current().id()
    }
}

type TransactionSlot = Option<OpenTransaction>;

/// In-memory storage for tests and one-shot CLI runs
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<StoreState>,
    transaction: Mutex<TransactionSlot>,
    released: Condvar,
    rules: RecordRules,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use specific record rules when `save` is asked to validate
    pub fn with_record_rules(rules: RecordRules) -> Self {
        Self {
            rules,
            ..Self::default()
        }
    }

    pub fn element_count(&self) -> StoreResult<usize> {
        Ok(self.state.read()?.elements.len())
    }

    pub fn record_count(&self) -> StoreResult<usize> {
        Ok(self.state.read()?.records.len())
    }

    pub fn record_by_id(&self, id: EntryId) -> StoreResult<Option<SubmissionRecord>> {
        Ok(self.state.read()?.records.get(&id).cloned())
    }

    /// Waits until no other thread holds a transaction.
    ///
    /// The returned guard keeps other threads from beginning one until the
    /// caller's write is done.
    fn exclusive(&self) -> StoreResult<MutexGuard<'_, TransactionSlot>> {
        let guard = self.transaction.lock()?;
        Ok(self.released.wait_while(guard, |slot| {
            slot.as_ref().is_some_and(|open| !open.owned_by_current())
        })?)
    }

    /// Locks the transaction slot, requiring the current thread to own it
    fn owned_slot(&self, action: &str) -> StoreResult<MutexGuard<'_, TransactionSlot>> {
        let slot = self.transaction.lock()?;
        match slot.as_ref().map(OpenTransaction::owned_by_current) {
            Some(true) => Ok(slot),
            Some(false) => Err(StorageError::transaction(format!(
                "cannot {} a transaction owned by another thread",
                action
            ))),
            None => Err(StorageError::transaction(format!(
                "no open transaction to {}",
                action
            ))),
        }
    }
}

impl ElementStore for MemoryStore {
    fn save_element(&self, entry: &mut SubmissionEntry) -> StoreResult<bool> {
        let _slot = self.exclusive()?;
        let mut state = self.state.write()?;

        let id = match entry.id {
            Some(id) if state.elements.contains_key(&id) => id,
            // Unknown explicit ids are not created implicitly
            Some(_) => return Ok(false),
            None => {
                state.last_id += 1;
                state.last_id
            }
        };

        entry.id = Some(id);
        state.elements.insert(id, entry.clone());
        Ok(true)
    }

    fn element_by_id(&self, id: EntryId) -> StoreResult<Option<SubmissionEntry>> {
        Ok(self.state.read()?.elements.get(&id).cloned())
    }
}

impl RecordStore for MemoryStore {
    fn save(&self, record: &SubmissionRecord, run_validation: bool) -> StoreResult<bool> {
        let Some(id) = record.id else {
            return Ok(false);
        };
        if run_validation && !record.validate(&self.rules).is_empty() {
            return Ok(false);
        }

        let _slot = self.exclusive()?;
        self.state.write()?.records.insert(id, record.clone());
        Ok(true)
    }

    fn find_all(&self) -> StoreResult<Vec<SubmissionRecord>> {
        Ok(self.state.read()?.records.values().cloned().collect())
    }

    fn find_by_form(&self, form_id: FormId) -> StoreResult<Vec<SubmissionRecord>> {
        Ok(self
            .state
            .read()?
            .records
            .values()
            .filter(|r| r.form_id == form_id)
            .cloned()
            .collect())
    }

    fn all_ids(&self) -> StoreResult<Vec<EntryId>> {
        Ok(self.state.read()?.records.keys().copied().collect())
    }
}

impl TransactionManager for MemoryStore {
    /// True only on the thread that began the open transaction
    fn in_transaction(&self) -> bool {
        self.transaction
            .lock()
            .map(|slot| slot.as_ref().is_some_and(OpenTransaction::owned_by_current))
            .unwrap_or(false)
    }

    fn begin(&self) -> StoreResult<()> {
        let mut slot = self.exclusive()?;
        if slot.is_some() {
            return Err(StorageError::transaction("a transaction is already open"));
        }

        *slot = Some(OpenTransaction {
            owner: thread::current().id(),
            snapshot: self.state.read()?.clone(),
        });
        Ok(())
    }

    fn commit(&self) -> StoreResult<()> {
        let mut slot = self.owned_slot("commit")?;
        *slot = None;
        drop(slot);
        self.released.notify_all();
        Ok(())
    }

    fn rollback(&self) -> StoreResult<()> {
        let mut slot = self.owned_slot("roll back")?;
        // Restore before releasing the slot so no other thread begins first
        let restored = match slot.take() {
            Some(open) => self.state.write().map(|mut state| *state = open.snapshot),
            None => Ok(()),
        };
        drop(slot);
        self.released.notify_all();
        Ok(restored?)
    }
}
