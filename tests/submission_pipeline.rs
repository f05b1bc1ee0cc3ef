//! Submission Pipeline Tests
//!
//! Drives the pipeline through hand-written collaborators:
//! - Missing form fails before any validation or storage call
//! - Rejected and non-persisting submissions never touch storage
//! - Declined writes roll back and report failure
//! - Raised storage errors roll back and propagate
//! - Only a transaction opened by the submission is closed by it
//! - Concurrent submissions on one store never share a transaction

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use formentry::config::PipelineConfig;
use formentry::schema::{
    CheckboxRule, EntryId, FieldDef, FieldId, FormDef, FormId, FormLoader, LayoutField,
    RawSubmission,
};
use formentry::store::{
    ElementStore, FieldRepository, FormRepository, MemoryStore, RecordStore, StorageError,
    StoreResult, TransactionManager,
};
use formentry::submission::{
    EntryService, HookDecision, PipelineBuilder, ProcessOutcome, SubmissionEntry,
    SubmissionError, SubmissionPipeline, SubmissionRecord,
};
use serde_json::json;

// =============================================================================
// Fakes
// =============================================================================

/// Form and field lookups that count every call.
struct CountingDefinitions {
    loader: FormLoader,
    form_lookups: AtomicUsize,
    field_lookups: AtomicUsize,
}

impl CountingDefinitions {
    fn new(loader: FormLoader) -> Self {
        Self {
            loader,
            form_lookups: AtomicUsize::new(0),
            field_lookups: AtomicUsize::new(0),
        }
    }
}

impl FormRepository for CountingDefinitions {
    fn form_by_id(&self, id: FormId) -> StoreResult<Option<FormDef>> {
        self.form_lookups.fetch_add(1, Ordering::SeqCst);
        self.loader.form_by_id(id)
    }

    fn form_by_handle(&self, handle: &str) -> StoreResult<Option<FormDef>> {
        self.form_lookups.fetch_add(1, Ordering::SeqCst);
        self.loader.form_by_handle(handle)
    }
}

impl FieldRepository for CountingDefinitions {
    fn field_by_id(&self, id: FieldId) -> StoreResult<Option<FieldDef>> {
        self.field_lookups.fetch_add(1, Ordering::SeqCst);
        self.loader.field_by_id(id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WriteMode {
    Accept,
    DeclineElement,
    DeclineRecord,
    RaiseOnElement,
    RaiseOnRecord,
    FailCommit,
}

/// Storage double that records every call it receives.
struct ScriptedStore {
    mode: WriteMode,
    next_id: AtomicUsize,
    open: Mutex<bool>,
    calls: Mutex<Vec<&'static str>>,
    records: Mutex<Vec<SubmissionRecord>>,
}

impl ScriptedStore {
    fn new(mode: WriteMode) -> Self {
        Self {
            mode,
            next_id: AtomicUsize::new(100),
            open: Mutex::new(false),
            calls: Mutex::new(Vec::new()),
            records: Mutex::new(Vec::new()),
        }
    }

    fn record(&self, call: &'static str) {
        self.calls.lock().unwrap().push(call);
    }

    fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().unwrap().clone()
    }

    fn writes(&self) -> usize {
        self.calls()
            .into_iter()
            .filter(|c| matches!(*c, "save_element" | "save_record"))
            .count()
    }
}

impl ElementStore for ScriptedStore {
    fn save_element(&self, entry: &mut SubmissionEntry) -> StoreResult<bool> {
        self.record("save_element");
        match self.mode {
            WriteMode::DeclineElement => Ok(false),
            WriteMode::RaiseOnElement => Err(StorageError::unavailable("element store offline")),
            _ => {
                let id = self.next_id.fetch_add(1, Ordering::SeqCst) as EntryId;
                entry.id = Some(id);
                Ok(true)
            }
        }
    }

    fn element_by_id(&self, _id: EntryId) -> StoreResult<Option<SubmissionEntry>> {
        Ok(None)
    }
}

impl RecordStore for ScriptedStore {
    fn save(&self, record: &SubmissionRecord, run_validation: bool) -> StoreResult<bool> {
        self.record("save_record");
        assert!(!run_validation, "record rules already ran in the pipeline");
        match self.mode {
            WriteMode::DeclineRecord => Ok(false),
            WriteMode::RaiseOnRecord => Err(StorageError::write_failed("disk full")),
            _ => {
                self.records.lock().unwrap().push(record.clone());
                Ok(true)
            }
        }
    }

    fn find_all(&self) -> StoreResult<Vec<SubmissionRecord>> {
        Ok(self.records.lock().unwrap().clone())
    }

    fn find_by_form(&self, form_id: FormId) -> StoreResult<Vec<SubmissionRecord>> {
        Ok(self
            .find_all()?
            .into_iter()
            .filter(|r| r.form_id == form_id)
            .collect())
    }
}

impl TransactionManager for ScriptedStore {
    fn in_transaction(&self) -> bool {
        *self.open.lock().unwrap()
    }

    fn begin(&self) -> StoreResult<()> {
        self.record("begin");
        *self.open.lock().unwrap() = true;
        Ok(())
    }

    fn commit(&self) -> StoreResult<()> {
        self.record("commit");
        if self.mode == WriteMode::FailCommit {
            return Err(StorageError::transaction("commit refused"));
        }
        *self.open.lock().unwrap() = false;
        Ok(())
    }

    fn rollback(&self) -> StoreResult<()> {
        self.record("rollback");
        *self.open.lock().unwrap() = false;
        Ok(())
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

const CONTACT: FormId = 1;
const SURVEY: FormId = 2;

fn loader() -> FormLoader {
    let mut loader = FormLoader::in_memory();
    loader
        .register_field(FieldDef::required(1, "email", "Email", "PlainText"))
        .unwrap();
    loader
        .register_field(FieldDef::optional(2, "age", "Age", "Number"))
        .unwrap();
    loader
        .register_field(FieldDef::required(3, "opts", "Options", "Checkboxes"))
        .unwrap();
    loader
        .register_form(
            FormDef::new(CONTACT, "contact", true)
                .with_field(LayoutField::new(1))
                .with_field(LayoutField::new(2)),
        )
        .unwrap();
    loader
        .register_form(
            FormDef::new(SURVEY, "survey", false)
                .with_field(LayoutField::new(1))
                .with_field(LayoutField::new(3)),
        )
        .unwrap();
    loader
}

fn pipeline_with(store: Arc<ScriptedStore>) -> SubmissionPipeline {
    PipelineBuilder::with_store(Arc::new(loader()), store).build()
}

fn entry(form_id: FormId, data: serde_json::Value) -> SubmissionEntry {
    let raw: RawSubmission = serde_json::from_value(data).unwrap();
    SubmissionEntry::new(form_id, "Website enquiry", raw)
}

fn valid_contact() -> SubmissionEntry {
    entry(CONTACT, json!({"email": "a@b.c", "age": "30"}))
}

// =============================================================================
// Form Resolution
// =============================================================================

/// Unknown form fails before any validation or storage call.
#[test]
fn test_missing_form_fails_before_validation_and_storage() {
    let definitions = Arc::new(CountingDefinitions::new(loader()));
    let store = Arc::new(ScriptedStore::new(WriteMode::Accept));
    let pipeline = PipelineBuilder::with_store(definitions.clone(), store.clone()).build();

    let mut candidate = entry(42, json!({"email": ""}));
    let err = pipeline.process(&mut candidate).unwrap_err();

    assert_eq!(err, SubmissionError::FormNotFound { form_id: 42 });
    assert_eq!(err.code(), "FORMENTRY_FORM_NOT_FOUND");
    assert_eq!(definitions.form_lookups.load(Ordering::SeqCst), 1);
    assert_eq!(definitions.field_lookups.load(Ordering::SeqCst), 0);
    assert!(store.calls().is_empty());
    assert!(!candidate.has_errors());
    assert_eq!(pipeline.metrics().form_not_found, 1);
}

// =============================================================================
// Validation Stage
// =============================================================================

#[test]
fn test_validation_failure_is_an_outcome_without_writes() {
    let store = Arc::new(ScriptedStore::new(WriteMode::Accept));
    let pipeline = pipeline_with(store.clone());

    let mut candidate = entry(CONTACT, json!({"email": "", "age": "30x"}));
    let outcome = pipeline.process(&mut candidate).unwrap();

    assert_eq!(
        outcome.errors().unwrap().messages(),
        ["Email cannot be blank.", "Age needs to contain only numbers."]
    );
    assert!(!outcome.is_accepted());
    assert_eq!(candidate.id, None);
    assert!(store.calls().is_empty());
}

#[test]
fn test_record_rules_run_after_field_rules() {
    let store = Arc::new(ScriptedStore::new(WriteMode::Accept));
    let pipeline = pipeline_with(store.clone());

    let mut candidate = entry(CONTACT, json!({"email": ""}));
    candidate.title = "x".repeat(300);
    let outcome = pipeline.process(&mut candidate).unwrap();

    assert_eq!(
        outcome.errors().unwrap().messages(),
        [
            "Email cannot be blank.",
            "Title is too long (maximum is 255 characters).",
        ]
    );
    assert_eq!(store.writes(), 0);
}

#[test]
fn test_title_limit_comes_from_config() {
    let store = Arc::new(ScriptedStore::new(WriteMode::Accept));
    let config = PipelineConfig {
        title_max_length: 10,
        ..PipelineConfig::default()
    };
    let pipeline = PipelineBuilder::with_store(Arc::new(loader()), store)
        .with_config(config)
        .unwrap()
        .build();

    let mut candidate = valid_contact();
    let outcome = pipeline.process(&mut candidate).unwrap();
    assert_eq!(
        outcome.errors().unwrap().messages(),
        ["Title is too long (maximum is 10 characters)."]
    );
}

#[test]
fn test_non_persisting_form_accepts_without_writes() {
    let store = Arc::new(ScriptedStore::new(WriteMode::Accept));
    let pipeline = pipeline_with(store.clone());

    let mut candidate = entry(SURVEY, json!({"email": "a@b.c", "opts": ["", "blue"]}));
    let outcome = pipeline.process(&mut candidate).unwrap();

    assert_eq!(outcome, ProcessOutcome::AcceptedWithoutPersist);
    assert_eq!(outcome.entry_id(), None);
    assert_eq!(candidate.id, None);
    assert!(store.calls().is_empty());
}

/// Errors reject even when the form would not persist the submission.
#[test]
fn test_non_persisting_form_still_rejects_errors() {
    let store = Arc::new(ScriptedStore::new(WriteMode::Accept));
    let pipeline = pipeline_with(store.clone());

    let mut candidate = entry(SURVEY, json!({"email": "a@b.c", "opts": [""]}));
    let outcome = pipeline.process(&mut candidate).unwrap();

    assert_eq!(
        outcome.errors().unwrap().messages(),
        ["Options please select at least one."]
    );
    assert!(store.calls().is_empty());
}

#[test]
fn test_checkbox_rule_from_config() {
    let config = PipelineConfig {
        checkbox_rule: CheckboxRule::NoSelection,
        ..PipelineConfig::default()
    };
    let pipeline = PipelineBuilder::with_store(
        Arc::new(loader()),
        Arc::new(ScriptedStore::new(WriteMode::Accept)),
    )
    .with_config(config)
    .unwrap()
    .build();

    let mut candidate = entry(SURVEY, json!({"email": "a@b.c"}));
    let outcome = pipeline.process(&mut candidate).unwrap();
    assert_eq!(outcome.errors().map(|e| e.len()), Some(1));
}

// =============================================================================
// Before-save Hooks
// =============================================================================

#[test]
fn test_hook_mutation_is_validated() {
    let store = Arc::new(ScriptedStore::new(WriteMode::Accept));
    let pipeline = PipelineBuilder::with_store(Arc::new(loader()), store.clone())
        .with_hook(|e: &mut SubmissionEntry| {
            e.data.insert("email", "filled@by.hook");
            HookDecision::Allow
        })
        .build();

    let mut candidate = entry(CONTACT, json!({"email": ""}));
    let outcome = pipeline.process(&mut candidate).unwrap();

    assert_eq!(outcome, ProcessOutcome::Persisted { entry_id: 100 });
    assert_eq!(
        store.find_all().unwrap()[0].data,
        json!({"email": "filled@by.hook"})
    );
}

#[test]
fn test_hook_veto_stops_before_form_lookup() {
    let definitions = Arc::new(CountingDefinitions::new(loader()));
    let store = Arc::new(ScriptedStore::new(WriteMode::Accept));
    let pipeline = PipelineBuilder::with_store(definitions.clone(), store.clone())
        .with_hook(|_: &mut SubmissionEntry| HookDecision::deny("honeypot filled"))
        .build();

    let outcome = pipeline.process(&mut valid_contact()).unwrap();

    assert_eq!(
        outcome,
        ProcessOutcome::Vetoed {
            reason: "honeypot filled".into()
        }
    );
    assert_eq!(definitions.form_lookups.load(Ordering::SeqCst), 0);
    assert!(store.calls().is_empty());
    assert_eq!(pipeline.metrics().vetoed, 1);
}

// =============================================================================
// Persistence
// =============================================================================

#[test]
fn test_persist_opens_and_commits() {
    let store = Arc::new(ScriptedStore::new(WriteMode::Accept));
    let pipeline = pipeline_with(store.clone());

    let mut candidate = valid_contact();
    let outcome = pipeline.process(&mut candidate).unwrap();

    assert_eq!(outcome.entry_id(), Some(100));
    assert_eq!(candidate.id, Some(100));
    assert_eq!(
        store.calls(),
        vec!["begin", "save_element", "save_record", "commit"]
    );

    let record = &store.find_all().unwrap()[0];
    assert_eq!(record.id, Some(100));
    assert_eq!(record.form_id, CONTACT);
    assert_eq!(record.title, "Website enquiry");
}

#[test]
fn test_declined_writes_roll_back() {
    for mode in [WriteMode::DeclineElement, WriteMode::DeclineRecord] {
        let store = Arc::new(ScriptedStore::new(mode));
        let pipeline = pipeline_with(store.clone());

        let mut candidate = valid_contact();
        let outcome = pipeline.process(&mut candidate).unwrap();

        assert_eq!(outcome, ProcessOutcome::PersistFailed, "mode {:?}", mode);
        assert_eq!(candidate.id, None);
        assert_eq!(store.calls().last(), Some(&"rollback"));
        assert!(!store.calls().contains(&"commit"));
        assert!(store.find_all().unwrap().is_empty());
        assert_eq!(pipeline.metrics().persist_failures, 1);
    }
}

#[test]
fn test_declined_element_skips_record_write() {
    let store = Arc::new(ScriptedStore::new(WriteMode::DeclineElement));
    let pipeline = pipeline_with(store.clone());

    pipeline.process(&mut valid_contact()).unwrap();
    assert_eq!(store.calls(), vec!["begin", "save_element", "rollback"]);
}

#[test]
fn test_storage_error_rolls_back_and_propagates() {
    for mode in [WriteMode::RaiseOnElement, WriteMode::RaiseOnRecord] {
        let store = Arc::new(ScriptedStore::new(mode));
        let pipeline = pipeline_with(store.clone());

        let mut candidate = valid_contact();
        let err = pipeline.process(&mut candidate).unwrap_err();

        assert!(err.is_storage(), "mode {:?}", mode);
        assert_eq!(candidate.id, None);
        assert_eq!(store.calls().last(), Some(&"rollback"));
        assert!(store.find_all().unwrap().is_empty());
        assert_eq!(pipeline.metrics().storage_errors, 1);
    }
}

/// A refused commit leaves the owned transaction to the scope's drop.
#[test]
fn test_failed_commit_rolls_back_and_propagates() {
    let store = Arc::new(ScriptedStore::new(WriteMode::FailCommit));
    let pipeline = pipeline_with(store.clone());

    let mut candidate = valid_contact();
    let err = pipeline.process(&mut candidate).unwrap_err();

    assert!(err.is_storage());
    assert_eq!(err.code(), "FORMENTRY_STORAGE_TRANSACTION");
    assert_eq!(candidate.id, None);
    assert_eq!(
        store.calls(),
        vec!["begin", "save_element", "save_record", "commit", "rollback"]
    );
    assert!(!store.in_transaction());
    assert_eq!(pipeline.metrics().storage_errors, 1);
    assert_eq!(pipeline.metrics().persisted, 0);
}

/// A caller's open transaction is joined and left open.
#[test]
fn test_nested_submission_never_closes_outer_transaction() {
    let store = Arc::new(ScriptedStore::new(WriteMode::Accept));
    let pipeline = pipeline_with(store.clone());

    store.begin().unwrap();
    let outcome = pipeline.process(&mut valid_contact()).unwrap();

    assert!(matches!(outcome, ProcessOutcome::Persisted { .. }));
    assert!(store.in_transaction());
    assert_eq!(store.calls(), vec!["begin", "save_element", "save_record"]);
}

#[test]
fn test_nested_failure_leaves_rollback_to_caller() {
    let store = Arc::new(ScriptedStore::new(WriteMode::RaiseOnRecord));
    let pipeline = pipeline_with(store.clone());

    store.begin().unwrap();
    assert!(pipeline.process(&mut valid_contact()).is_err());

    assert!(store.in_transaction());
    assert!(!store.calls().contains(&"rollback"));
}

// =============================================================================
// Against the in-memory backend
// =============================================================================

#[test]
fn test_memory_store_outer_rollback_discards_nested_submission() {
    let store = Arc::new(MemoryStore::new());
    let pipeline = PipelineBuilder::with_store(Arc::new(loader()), store.clone()).build();
    let service = EntryService::new(pipeline);

    store.begin().unwrap();
    let outcome = service.process_submission(&mut valid_contact()).unwrap();
    assert_eq!(outcome.entry_id(), Some(1));
    store.rollback().unwrap();

    assert_eq!(service.total_entries().unwrap(), 0);
    assert!(service.entry_by_id(1).unwrap().is_none());
}

#[test]
fn test_memory_store_sequential_ids() {
    let store = Arc::new(MemoryStore::new());
    let pipeline = PipelineBuilder::with_store(Arc::new(loader()), store).build();
    let service = EntryService::new(pipeline);

    for expected in 1..=3 {
        let outcome = service.process_submission(&mut valid_contact()).unwrap();
        assert_eq!(outcome.entry_id(), Some(expected));
    }
    assert_eq!(service.all_entry_ids().unwrap(), vec![1, 2, 3]);
    assert_eq!(service.entries_for_form(CONTACT).unwrap().len(), 3);
    assert_eq!(service.metrics().received, 3);
}

// =============================================================================
// Concurrent Submissions
// =============================================================================

/// Memory store whose record write parks until released, then fails.
struct StalledRecordStore {
    inner: Arc<MemoryStore>,
    reached: Mutex<Sender<()>>,
    resume: Mutex<Receiver<()>>,
}

impl ElementStore for StalledRecordStore {
    fn save_element(&self, entry: &mut SubmissionEntry) -> StoreResult<bool> {
        self.inner.save_element(entry)
    }

    fn element_by_id(&self, id: EntryId) -> StoreResult<Option<SubmissionEntry>> {
        self.inner.element_by_id(id)
    }
}

impl RecordStore for StalledRecordStore {
    fn save(&self, _record: &SubmissionRecord, _run_validation: bool) -> StoreResult<bool> {
        self.reached.lock().unwrap().send(()).unwrap();
        self.resume.lock().unwrap().recv().unwrap();
        Err(StorageError::write_failed("record store went away"))
    }

    fn find_all(&self) -> StoreResult<Vec<SubmissionRecord>> {
        self.inner.find_all()
    }

    fn find_by_form(&self, form_id: FormId) -> StoreResult<Vec<SubmissionRecord>> {
        self.inner.find_by_form(form_id)
    }
}

impl TransactionManager for StalledRecordStore {
    fn in_transaction(&self) -> bool {
        self.inner.in_transaction()
    }

    fn begin(&self) -> StoreResult<()> {
        self.inner.begin()
    }

    fn commit(&self) -> StoreResult<()> {
        self.inner.commit()
    }

    fn rollback(&self) -> StoreResult<()> {
        self.inner.rollback()
    }
}

/// A failing submission's rollback must not discard a submission made
/// from another thread while its transaction was open.
#[test]
fn test_concurrent_submission_survives_other_rollback() {
    let store = Arc::new(MemoryStore::new());
    let (reached_tx, reached_rx) = mpsc::channel();
    let (resume_tx, resume_rx) = mpsc::channel();
    let stalled = Arc::new(StalledRecordStore {
        inner: store.clone(),
        reached: Mutex::new(reached_tx),
        resume: Mutex::new(resume_rx),
    });

    let failing = PipelineBuilder::with_store(Arc::new(loader()), stalled).build();
    let healthy = PipelineBuilder::with_store(Arc::new(loader()), store.clone()).build();

    let first = thread::spawn(move || failing.process(&mut valid_contact()));
    reached_rx.recv().unwrap();

    let second = thread::spawn(move || healthy.process(&mut valid_contact()));
    thread::sleep(Duration::from_millis(100));
    assert!(!second.is_finished(), "second submission must wait for the open transaction");

    resume_tx.send(()).unwrap();
    let err = first.join().unwrap().unwrap_err();
    assert!(err.is_storage());

    let outcome = second.join().unwrap().unwrap();
    let entry_id = outcome.entry_id().unwrap();
    assert!(store.record_by_id(entry_id).unwrap().is_some());
    assert_eq!(store.record_count().unwrap(), 1);
    assert_eq!(store.element_count().unwrap(), 1);
    assert!(!store.in_transaction());
}
