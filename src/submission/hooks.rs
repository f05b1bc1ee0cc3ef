//! Before-save hooks
//!
//! Observers run synchronously before a submission is resolved against its
//! form. They may mutate the candidate and return an explicit decision.

use std::sync::Arc;

use super::entry::SubmissionEntry;

/// An observer's verdict on a candidate submission
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HookDecision {
    Allow,
    /// Stop the submission with a reason
    Deny(String),
}

impl HookDecision {
    pub fn deny(reason: impl Into<String>) -> Self {
        Self::Deny(reason.into())
    }

    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allow)
    }
}

/// Observer invoked before a submission is saved
pub trait BeforeSaveHook: Send + Sync {
    fn before_save(&self, entry: &mut SubmissionEntry) -> HookDecision;
}

impl<F> BeforeSaveHook for F
where
    F: Fn(&mut SubmissionEntry) -> HookDecision + Send + Sync,
{
    fn before_save(&self, entry: &mut SubmissionEntry) -> HookDecision {
        self(entry)
    }
}

/// Ordered set of before-save observers
#[derive(Clone, Default)]
pub struct NotificationBus {
    hooks: Vec<Arc<dyn BeforeSaveHook>>,
}

impl NotificationBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, hook: impl BeforeSaveHook + 'static) {
        self.hooks.push(Arc::new(hook));
    }

    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }

    /// Runs every observer in subscription order.
    ///
    /// All observers run even after a denial; the first denial wins.
    pub fn emit_before_save(&self, entry: &mut SubmissionEntry) -> HookDecision {
        let mut decision = HookDecision::Allow;
        for hook in &self.hooks {
            let verdict = hook.before_save(entry);
            if decision.is_allowed() {
                decision = verdict;
            }
        }
        decision
    }
}
