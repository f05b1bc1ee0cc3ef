//! Submission pipeline
//!
//! Stages, in order, each a possible exit:
//! 1. Before-save observers (may mutate or deny)
//! 2. Resolve the owning form (missing form is fatal)
//! 3. Build the storage record
//! 4. Validation stage: field rules, then record rules
//! 5. Reject on any accumulated message
//! 6. Accept without writing when the form does not persist submissions
//! 7. Acquire-or-join a transaction, save element then record, commit
//!
//! Field rules run inside `process()` unless `validate_fields` is turned off
//! in the configuration. Messages already on the entry when it arrives are
//! kept and also reject it.

use std::sync::Arc;

use serde::Serialize;
use uuid::Uuid;

use super::entry::{SubmissionEntry, SubmissionRecord};
use super::error::{SubmissionError, SubmissionResult};
use super::hooks::{BeforeSaveHook, HookDecision, NotificationBus};
use super::transaction::TransactionScope;
use crate::config::{ConfigResult, PipelineConfig};
use crate::observability::{
    log_event, Event, Logger, MetricsSnapshot, ObservationScope, SubmissionMetrics,
};
use crate::schema::{
    BoundField, EntryId, FieldValidator, FormDef, FormId, RawSubmission, ValidationErrors,
};
use crate::store::{
    ElementStore, FieldRepository, FormRepository, RecordStore, StorageError, StoreResult,
    TransactionManager,
};

/// Where a submission attempt is in the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionState {
    Received,
    BeforeSaveNotified,
    FormResolved,
    RecordBuilt,
    /// An observer denied the submission
    Vetoed,
    RejectedNoForm,
    RejectedValidation,
    AcceptedNoPersist,
    PersistFailed,
    PersistedWithId,
}

impl SubmissionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Received => "RECEIVED",
            Self::BeforeSaveNotified => "BEFORE_SAVE_NOTIFIED",
            Self::FormResolved => "FORM_RESOLVED",
            Self::RecordBuilt => "RECORD_BUILT",
            Self::Vetoed => "VETOED",
            Self::RejectedNoForm => "REJECTED_NO_FORM",
            Self::RejectedValidation => "REJECTED_VALIDATION",
            Self::AcceptedNoPersist => "ACCEPTED_NO_PERSIST",
            Self::PersistFailed => "PERSIST_FAILED",
            Self::PersistedWithId => "PERSISTED_WITH_ID",
        }
    }

    /// Terminal states end the attempt; there are no retries
    pub fn is_terminal(&self) -> bool {
        !matches!(
            self,
            Self::Received | Self::BeforeSaveNotified | Self::FormResolved | Self::RecordBuilt
        )
    }

    /// Whether `next` directly follows this state
    pub fn can_transition_to(&self, next: SubmissionState) -> bool {
        use SubmissionState::*;
        matches!(
            (self, next),
            (Received, BeforeSaveNotified)
                | (BeforeSaveNotified, Vetoed | FormResolved | RejectedNoForm)
                | (FormResolved, RecordBuilt)
                | (
                    RecordBuilt,
                    RejectedValidation | AcceptedNoPersist | PersistFailed | PersistedWithId
                )
        )
    }
}

/// Terminal result of a submission attempt that did not raise
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ProcessOutcome {
    /// Written and committed
    Persisted { entry_id: EntryId },
    /// Valid, but the form does not persist submissions
    AcceptedWithoutPersist,
    /// Field or record rules failed
    Rejected { errors: ValidationErrors },
    /// A store declined a write; nothing was committed
    PersistFailed,
    /// A before-save observer denied the submission
    Vetoed { reason: String },
}

impl ProcessOutcome {
    pub fn entry_id(&self) -> Option<EntryId> {
        match self {
            Self::Persisted { entry_id } => Some(*entry_id),
            _ => None,
        }
    }

    /// Persisted or accepted without persisting
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Persisted { .. } | Self::AcceptedWithoutPersist)
    }

    pub fn errors(&self) -> Option<&ValidationErrors> {
        match self {
            Self::Rejected { errors } => Some(errors),
            _ => None,
        }
    }

    pub fn state(&self) -> SubmissionState {
        match self {
            Self::Persisted { .. } => SubmissionState::PersistedWithId,
            Self::AcceptedWithoutPersist => SubmissionState::AcceptedNoPersist,
            Self::Rejected { .. } => SubmissionState::RejectedValidation,
            Self::PersistFailed => SubmissionState::PersistFailed,
            Self::Vetoed { .. } => SubmissionState::Vetoed,
        }
    }
}

/// Per-attempt bookkeeping for logs
struct Attempt {
    id: String,
    form_id: String,
    state: SubmissionState,
}

impl Attempt {
    fn new(form_id: FormId) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            form_id: form_id.to_string(),
            state: SubmissionState::Received,
        }
    }

    fn advance(&mut self, next: SubmissionState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "invalid submission transition {:?} -> {:?}",
            self.state,
            next
        );
        self.state = next;
        Logger::trace(
            Event::StateChanged.as_str(),
            &[("attempt", self.id.as_str()), ("state", next.as_str())],
        );
    }
}

/// Validates and persists submissions through injected collaborators
pub struct SubmissionPipeline {
    forms: Arc<dyn FormRepository>,
    fields: Arc<dyn FieldRepository>,
    elements: Arc<dyn ElementStore>,
    records: Arc<dyn RecordStore>,
    transactions: Arc<dyn TransactionManager>,
    bus: NotificationBus,
    validator: FieldValidator,
    config: PipelineConfig,
    metrics: Arc<SubmissionMetrics>,
}

impl SubmissionPipeline {
    /// Process one submission.
    ///
    /// Field rules run here unless `validate_fields` is off. Messages are
    /// left on `entry`; its id is set only when the outcome is `Persisted`.
    ///
    /// Messages reject the submission before `persist_submissions` is
    /// consulted, so a form that does not store submissions still returns
    /// `Rejected` for invalid input instead of `AcceptedWithoutPersist`.
    ///
    /// # Errors
    ///
    /// - `FormNotFound` before any validation or storage write
    /// - `FieldNotFound` if the form layout cannot be resolved
    /// - `Storage` if a collaborator raised; an owned transaction is rolled back first
    pub fn process(&self, entry: &mut SubmissionEntry) -> SubmissionResult<ProcessOutcome> {
        let mut attempt = Attempt::new(entry.form_id);
        self.metrics.increment_received();
        Logger::info(
            Event::SubmissionBegin.as_str(),
            &[("attempt", attempt.id.as_str()), ("form_id", attempt.form_id.as_str())],
        );

        let decision = self.bus.emit_before_save(entry);
        attempt.advance(SubmissionState::BeforeSaveNotified);
        let observers = self.bus.len().to_string();
        Logger::trace(
            Event::BeforeSaveNotified.as_str(),
            &[("attempt", attempt.id.as_str()), ("observers", observers.as_str())],
        );

        if let HookDecision::Deny(reason) = decision {
            attempt.advance(SubmissionState::Vetoed);
            self.metrics.increment_vetoed();
            Logger::warn(
                Event::SubmissionVetoed.as_str(),
                &[("attempt", attempt.id.as_str()), ("reason", reason.as_str())],
            );
            return Ok(ProcessOutcome::Vetoed { reason });
        }

        let form = match self.forms.form_by_id(entry.form_id)? {
            Some(form) => form,
            None => {
                attempt.advance(SubmissionState::RejectedNoForm);
                self.metrics.increment_form_not_found();
                log_event(
                    Event::FormNotFound,
                    &[("attempt", attempt.id.as_str()), ("form_id", attempt.form_id.as_str())],
                );
                return Err(SubmissionError::FormNotFound {
                    form_id: entry.form_id,
                });
            }
        };
        attempt.advance(SubmissionState::FormResolved);

        let record = SubmissionRecord::from_entry(entry);
        attempt.advance(SubmissionState::RecordBuilt);

        if self.config.validate_fields {
            let errors = self.validate_entry(&form, &entry.data)?;
            entry.add_errors(errors);
        }
        entry.add_errors(record.validate(&self.config.record_rules()));

        if entry.has_errors() {
            attempt.advance(SubmissionState::RejectedValidation);
            self.metrics.increment_rejected();
            let count = entry.errors().len().to_string();
            Logger::info(
                Event::ValidationFailed.as_str(),
                &[("attempt", attempt.id.as_str()), ("errors", count.as_str())],
            );
            return Ok(ProcessOutcome::Rejected {
                errors: entry.errors().clone(),
            });
        }

        if !form.persist_submissions {
            attempt.advance(SubmissionState::AcceptedNoPersist);
            self.metrics.increment_accepted_without_persist();
            Logger::info(
                Event::AcceptedNoPersist.as_str(),
                &[("attempt", attempt.id.as_str()), ("form", form.handle.as_str())],
            );
            return Ok(ProcessOutcome::AcceptedWithoutPersist);
        }

        self.persist(entry, record, &mut attempt)
    }

    /// Field rules for a submission against a form, with layout overrides applied
    pub fn validate_entry(
        &self,
        form: &FormDef,
        raw: &RawSubmission,
    ) -> SubmissionResult<ValidationErrors> {
        let fields = self.bind_fields(form)?;
        Ok(self.validator.validate(&fields, raw))
    }

    /// Resolve a form's layout into bound fields, in layout order
    pub fn bind_fields(&self, form: &FormDef) -> SubmissionResult<Vec<BoundField>> {
        form.layout
            .iter()
            .map(|slot| -> SubmissionResult<BoundField> {
                let field = self
                    .fields
                    .field_by_id(slot.field_id)?
                    .ok_or(SubmissionError::FieldNotFound {
                        field_id: slot.field_id,
                    })?;
                Ok(BoundField::new(field, slot.required))
            })
            .collect()
    }

    fn persist(
        &self,
        entry: &mut SubmissionEntry,
        mut record: SubmissionRecord,
        attempt: &mut Attempt,
    ) -> SubmissionResult<ProcessOutcome> {
        let scope = TransactionScope::acquire(self.transactions.as_ref())?;
        let observation =
            ObservationScope::with_fields("PERSIST", &[("attempt", attempt.id.as_str())]);

        match self.write_entry(entry, &mut record) {
            Ok(Some(entry_id)) => {
                if let Err(e) = scope.commit() {
                    entry.id = None;
                    attempt.advance(SubmissionState::PersistFailed);
                    self.metrics.increment_storage_errors();
                    observation.fail(&e.to_string());
                    return Err(e.into());
                }

                attempt.advance(SubmissionState::PersistedWithId);
                self.metrics.increment_persisted();
                let id = entry_id.to_string();
                observation.complete_with_fields(&[("entry_id", id.as_str())]);
                Logger::info(
                    Event::SubmissionPersisted.as_str(),
                    &[
                        ("attempt", attempt.id.as_str()),
                        ("entry_id", id.as_str()),
                        ("form_id", attempt.form_id.as_str()),
                    ],
                );
                Ok(ProcessOutcome::Persisted { entry_id })
            }
            Ok(None) => {
                entry.id = None;
                attempt.advance(SubmissionState::PersistFailed);
                if let Err(e) = scope.rollback() {
                    self.metrics.increment_storage_errors();
                    observation.fail(&e.to_string());
                    return Err(e.into());
                }

                self.metrics.increment_persist_failures();
                observation.fail("store declined the write");
                log_event(Event::PersistFailed, &[("attempt", attempt.id.as_str())]);
                Ok(ProcessOutcome::PersistFailed)
            }
            Err(e) => {
                entry.id = None;
                attempt.advance(SubmissionState::PersistFailed);
                let reason = e.to_string();
                log_event(
                    Event::PersistError,
                    &[("attempt", attempt.id.as_str()), ("reason", reason.as_str())],
                );
                if let Err(rollback_err) = scope.rollback() {
                    let rollback_reason = rollback_err.to_string();
                    Logger::error(
                        Event::TransactionRollback.as_str(),
                        &[
                            ("attempt", attempt.id.as_str()),
                            ("reason", rollback_reason.as_str()),
                        ],
                    );
                }

                self.metrics.increment_storage_errors();
                observation.fail(&reason);
                Err(e.into())
            }
        }
    }

    /// Element first, then the record carrying the element's id.
    ///
    /// `Ok(None)` means a store declined without raising.
    fn write_entry(
        &self,
        entry: &mut SubmissionEntry,
        record: &mut SubmissionRecord,
    ) -> StoreResult<Option<EntryId>> {
        if !self.elements.save_element(entry)? {
            return Ok(None);
        }

        let entry_id = entry.id.ok_or_else(|| {
            StorageError::write_failed("element store accepted the submission without an id")
        })?;
        record.id = Some(entry_id);

        if !self.records.save(record, false)? {
            return Ok(None);
        }

        Ok(Some(entry_id))
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    pub fn observer_count(&self) -> usize {
        self.bus.len()
    }

    pub(crate) fn forms(&self) -> &dyn FormRepository {
        self.forms.as_ref()
    }

    pub(crate) fn elements(&self) -> &dyn ElementStore {
        self.elements.as_ref()
    }

    pub(crate) fn records(&self) -> &dyn RecordStore {
        self.records.as_ref()
    }
}

/// Builder for pipeline construction
pub struct PipelineBuilder {
    forms: Arc<dyn FormRepository>,
    fields: Arc<dyn FieldRepository>,
    elements: Arc<dyn ElementStore>,
    records: Arc<dyn RecordStore>,
    transactions: Arc<dyn TransactionManager>,
    bus: NotificationBus,
    config: PipelineConfig,
    metrics: Arc<SubmissionMetrics>,
}

impl PipelineBuilder {
    /// Start from individually injected collaborators
    pub fn new(
        forms: Arc<dyn FormRepository>,
        fields: Arc<dyn FieldRepository>,
        elements: Arc<dyn ElementStore>,
        records: Arc<dyn RecordStore>,
        transactions: Arc<dyn TransactionManager>,
    ) -> Self {
        Self {
            forms,
            fields,
            elements,
            records,
            transactions,
            bus: NotificationBus::new(),
            config: PipelineConfig::default(),
            metrics: Arc::new(SubmissionMetrics::new()),
        }
    }

    /// Start from one definitions source and one storage backend
    pub fn with_store<D, S>(definitions: Arc<D>, store: Arc<S>) -> Self
    where
        D: FormRepository + FieldRepository + 'static,
        S: ElementStore + RecordStore + TransactionManager + 'static,
    {
        Self::new(
            definitions.clone(),
            definitions,
            store.clone(),
            store.clone(),
            store,
        )
    }

    /// Add a before-save observer
    pub fn with_hook(mut self, hook: impl BeforeSaveHook + 'static) -> Self {
        self.bus.subscribe(hook);
        self
    }

    pub fn with_bus(mut self, bus: NotificationBus) -> Self {
        self.bus = bus;
        self
    }

    /// Use `config` after checking it the same way `PipelineConfig::load` does
    pub fn with_config(mut self, config: PipelineConfig) -> ConfigResult<Self> {
        config.validate()?;
        self.config = config;
        Ok(self)
    }

    /// Share counters with other pipelines
    pub fn with_metrics(mut self, metrics: Arc<SubmissionMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn build(self) -> SubmissionPipeline {
        SubmissionPipeline {
            forms: self.forms,
            fields: self.fields,
            elements: self.elements,
            records: self.records,
            transactions: self.transactions,
            bus: self.bus,
            validator: FieldValidator::with_checkbox_rule(self.config.checkbox_rule),
            config: self.config,
            metrics: self.metrics,
        }
    }
}
