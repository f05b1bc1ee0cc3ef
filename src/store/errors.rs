//! Storage error types
//!
//! Any `StorageError` raised while persisting a submission triggers a
//! rollback and is then handed back to the caller unchanged.

use thiserror::Error;

/// Result type for storage operations
pub type StoreResult<T> = Result<T, StorageError>;

/// Errors raised by storage collaborators
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StorageError {
    /// Backend could not be reached
    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    /// A write was attempted and raised
    #[error("Write failed: {0}")]
    WriteFailed(String),

    /// Transaction misuse or backend transaction failure
    #[error("Transaction error: {0}")]
    Transaction(String),

    /// A lock guarding in-process state was poisoned
    #[error("Storage lock poisoned: {0}")]
    Poisoned(String),
}

impl StorageError {
    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::Unavailable(msg.into())
    }

    pub fn write_failed(msg: impl Into<String>) -> Self {
        Self::WriteFailed(msg.into())
    }

    pub fn transaction(msg: impl Into<String>) -> Self {
        Self::Transaction(msg.into())
    }

    /// Stable error code
    pub fn code(&self) -> &'static str {
        match self {
            Self::Unavailable(_) => "FORMENTRY_STORAGE_UNAVAILABLE",
            Self::WriteFailed(_) => "FORMENTRY_STORAGE_WRITE_FAILED",
            Self::Transaction(_) => "FORMENTRY_STORAGE_TRANSACTION",
            Self::Poisoned(_) => "FORMENTRY_STORAGE_POISONED",
        }
    }
}

impl<T> From<std::sync::PoisonError<T>> for StorageError {
    fn from(e: std::sync::PoisonError<T>) -> Self {
        Self::Poisoned(e.to_string())
    }
}
