//! Entry service
//!
//! Facade over the pipeline for callers that only want to submit and read
//! entries back. Reads are plain pass-throughs to the injected stores.

use super::entry::{SubmissionEntry, SubmissionRecord};
use super::error::{SubmissionError, SubmissionResult};
use super::pipeline::{ProcessOutcome, SubmissionPipeline};
use crate::observability::MetricsSnapshot;
use crate::schema::{EntryId, FormDef, FormId, RawSubmission, ValidationErrors};

pub struct EntryService {
    pipeline: SubmissionPipeline,
}

impl EntryService {
    pub fn new(pipeline: SubmissionPipeline) -> Self {
        Self { pipeline }
    }

    pub fn pipeline(&self) -> &SubmissionPipeline {
        &self.pipeline
    }

    /// See [`SubmissionPipeline::process`]
    pub fn process_submission(
        &self,
        entry: &mut SubmissionEntry,
    ) -> SubmissionResult<ProcessOutcome> {
        self.pipeline.process(entry)
    }

    /// Field rules for `raw` against the form with id `form_id`
    pub fn validate_entry(
        &self,
        form_id: FormId,
        raw: &RawSubmission,
    ) -> SubmissionResult<ValidationErrors> {
        let form = self
            .form_by_id(form_id)?
            .ok_or(SubmissionError::FormNotFound { form_id })?;
        self.pipeline.validate_entry(&form, raw)
    }

    pub fn form_by_id(&self, form_id: FormId) -> SubmissionResult<Option<FormDef>> {
        Ok(self.pipeline.forms().form_by_id(form_id)?)
    }

    pub fn form_by_handle(&self, handle: &str) -> SubmissionResult<Option<FormDef>> {
        Ok(self.pipeline.forms().form_by_handle(handle)?)
    }

    /// A stored entry by id, or `None` if no element has that id
    pub fn entry_by_id(&self, id: EntryId) -> SubmissionResult<Option<SubmissionEntry>> {
        Ok(self.pipeline.elements().element_by_id(id)?)
    }

    pub fn all_entry_ids(&self) -> SubmissionResult<Vec<EntryId>> {
        Ok(self.pipeline.records().all_ids()?)
    }

    pub fn all_entries(&self) -> SubmissionResult<Vec<SubmissionRecord>> {
        Ok(self.pipeline.records().find_all()?)
    }

    pub fn total_entries(&self) -> SubmissionResult<usize> {
        Ok(self.pipeline.records().find_all()?.len())
    }

    pub fn entries_for_form(&self, form_id: FormId) -> SubmissionResult<Vec<SubmissionRecord>> {
        Ok(self.pipeline.records().find_by_form(form_id)?)
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.pipeline.metrics()
    }
}
