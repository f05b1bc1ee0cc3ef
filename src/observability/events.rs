//! Observable events
//!
//! Every line the submission pipeline logs is named by one of these.

use std::fmt;

/// Observable events
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    // Startup
    /// Pipeline configuration loaded
    ConfigLoaded,
    /// Form and field definitions loaded
    FormsLoaded,

    // Submission lifecycle
    /// Submission received
    SubmissionBegin,
    /// Before-save observers have run
    BeforeSaveNotified,
    /// An observer denied the submission
    SubmissionVetoed,
    /// Owning form could not be resolved
    FormNotFound,
    /// Submission failed validation
    ValidationFailed,
    /// Valid submission accepted without a storage write
    AcceptedNoPersist,
    /// Submission written and committed
    SubmissionPersisted,
    /// Submission moved to a new pipeline state
    StateChanged,

    // Persistence
    /// Transaction opened by this submission
    TransactionBegin,
    /// Submission joined a caller's transaction
    TransactionJoined,
    /// Owned transaction committed
    TransactionCommit,
    /// Owned transaction rolled back
    TransactionRollback,
    /// A store rejected a write
    PersistFailed,
    /// A store raised during a write
    PersistError,
}

impl Event {
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::ConfigLoaded => "CONFIG_LOADED",
            Event::FormsLoaded => "FORMS_LOADED",

            Event::SubmissionBegin => "SUBMISSION_BEGIN",
            Event::BeforeSaveNotified => "BEFORE_SAVE_NOTIFIED",
            Event::SubmissionVetoed => "SUBMISSION_VETOED",
            Event::FormNotFound => "FORM_NOT_FOUND",
            Event::ValidationFailed => "VALIDATION_FAILED",
            Event::AcceptedNoPersist => "SUBMISSION_ACCEPTED_NO_PERSIST",
            Event::SubmissionPersisted => "SUBMISSION_PERSISTED",
            Event::StateChanged => "SUBMISSION_STATE",

            Event::TransactionBegin => "TRANSACTION_BEGIN",
            Event::TransactionJoined => "TRANSACTION_JOINED",
            Event::TransactionCommit => "TRANSACTION_COMMIT",
            Event::TransactionRollback => "TRANSACTION_ROLLBACK",
            Event::PersistFailed => "PERSIST_FAILED",
            Event::PersistError => "PERSIST_ERROR",
        }
    }

    /// Returns true if this event reports a failed operation
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            Event::FormNotFound | Event::PersistFailed | Event::PersistError
        )
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
