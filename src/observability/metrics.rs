//! Submission metrics
//!
//! - Counters only, monotonic
//! - One counter per terminal outcome, plus received
//! - Thread-safe via relaxed atomics

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Counters for submission outcomes
#[derive(Debug, Default)]
pub struct SubmissionMetrics {
    received: AtomicU64,
    vetoed: AtomicU64,
    form_not_found: AtomicU64,
    rejected: AtomicU64,
    accepted_without_persist: AtomicU64,
    persisted: AtomicU64,
    persist_failures: AtomicU64,
    storage_errors: AtomicU64,
}

impl SubmissionMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment_received(&self) {
        self.received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_vetoed(&self) {
        self.vetoed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_form_not_found(&self) {
        self.form_not_found.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_rejected(&self) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_accepted_without_persist(&self) {
        self.accepted_without_persist.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_persisted(&self) {
        self.persisted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_persist_failures(&self) {
        self.persist_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_storage_errors(&self) {
        self.storage_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Point-in-time copy of every counter
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            received: self.received.load(Ordering::Relaxed),
            vetoed: self.vetoed.load(Ordering::Relaxed),
            form_not_found: self.form_not_found.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            accepted_without_persist: self.accepted_without_persist.load(Ordering::Relaxed),
            persisted: self.persisted.load(Ordering::Relaxed),
            persist_failures: self.persist_failures.load(Ordering::Relaxed),
            storage_errors: self.storage_errors.load(Ordering::Relaxed),
        }
    }
}

/// A point-in-time snapshot of submission metrics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub received: u64,
    pub vetoed: u64,
    pub form_not_found: u64,
    pub rejected: u64,
    pub accepted_without_persist: u64,
    pub persisted: u64,
    pub persist_failures: u64,
    pub storage_errors: u64,
}

impl MetricsSnapshot {
    /// Attempts that reached a terminal outcome
    pub fn completed(&self) -> u64 {
        self.vetoed
            + self.form_not_found
            + self.rejected
            + self.accepted_without_persist
            + self.persisted
            + self.persist_failures
            + self.storage_errors
    }
}
