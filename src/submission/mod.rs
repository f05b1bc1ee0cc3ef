//! Submission processing
//!
//! - `SubmissionEntry` / `SubmissionRecord`: the candidate and its storage shape
//! - `SubmissionPipeline`: before-save hooks, form resolution, validation, persistence
//! - `EntryService`: pipeline facade plus read pass-throughs
//!
//! Collaborators are injected as trait objects from `crate::store`.

mod entry;
mod error;
mod hooks;
mod pipeline;
mod service;
mod transaction;

pub use entry::{RecordRules, SubmissionEntry, SubmissionRecord, DEFAULT_TITLE_MAX_LENGTH};
pub use error::{SubmissionError, SubmissionResult};
pub use hooks::{BeforeSaveHook, HookDecision, NotificationBus};
pub use pipeline::{PipelineBuilder, ProcessOutcome, SubmissionPipeline, SubmissionState};
pub use service::EntryService;
pub use transaction::TransactionScope;
