//! Observability subsystem
//!
//! - Structured logging (JSON lines)
//! - Typed lifecycle events
//! - Submission outcome counters
//!
//! # Principles
//!
//! 1. Observability is read-only
//! 2. No side effects on submission handling
//! 3. No background threads
//! 4. Deterministic output
//!
//! # Usage
//!
//! ```ignore
//! use formentry::observability::{Event, Logger, SubmissionMetrics};
//!
//! Logger::info(Event::SubmissionBegin.as_str(), &[("form_id", "3")]);
//!
//! let metrics = SubmissionMetrics::new();
//! metrics.increment_received();
//! ```

mod events;
mod logger;
mod metrics;
mod scope;

pub use events::Event;
pub use logger::{LogTarget, Logger, Severity};
pub use metrics::{MetricsSnapshot, SubmissionMetrics};
pub use scope::{ObservationScope, Timer};

/// Log an event at the severity its kind implies
pub fn log_event(event: Event, fields: &[(&str, &str)]) {
    if event.is_failure() {
        Logger::error(event.as_str(), fields);
    } else {
        Logger::info(event.as_str(), fields);
    }
}
