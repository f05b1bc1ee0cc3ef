//! Acquire-or-join transaction scope
//!
//! If the backend already has an open transaction the scope joins it and
//! leaves commit/rollback to whoever opened it. Otherwise the scope opens one
//! and owns it. An owned transaction that is dropped without being closed is
//! rolled back.

use crate::observability::{Event, Logger};
use crate::store::{StoreResult, TransactionManager};

/// Transaction handle for one submission attempt
pub struct TransactionScope<'a> {
    manager: &'a dyn TransactionManager,
    owned: bool,
    finished: bool,
}

impl<'a> TransactionScope<'a> {
    /// Join the open transaction, or begin and own a new one
    pub fn acquire(manager: &'a dyn TransactionManager) -> StoreResult<Self> {
        let owned = if manager.in_transaction() {
            Logger::trace(Event::TransactionJoined.as_str(), &[]);
            false
        } else {
            manager.begin()?;
            Logger::trace(Event::TransactionBegin.as_str(), &[]);
            true
        };

        Ok(Self {
            manager,
            owned,
            finished: false,
        })
    }

    /// Whether this scope opened the transaction
    pub fn is_owner(&self) -> bool {
        self.owned
    }

    /// Commit if owned; a joined scope leaves the outer transaction open.
    ///
    /// If the commit itself fails the scope stays unfinished and is rolled
    /// back on drop.
    pub fn commit(mut self) -> StoreResult<()> {
        if self.owned {
            self.manager.commit()?;
            Logger::trace(Event::TransactionCommit.as_str(), &[]);
        }
        self.finished = true;
        Ok(())
    }

    /// Roll back if owned; a joined scope defers to the outer owner.
    pub fn rollback(mut self) -> StoreResult<()> {
        self.finished = true;
        if self.owned {
            self.manager.rollback()?;
            Logger::trace(Event::TransactionRollback.as_str(), &[]);
        }
        Ok(())
    }
}

impl Drop for TransactionScope<'_> {
    fn drop(&mut self) {
        if self.owned && !self.finished {
            let outcome = match self.manager.rollback() {
                Ok(()) => "rolled back".to_string(),
                Err(e) => e.to_string(),
            };
            Logger::warn(
                Event::TransactionRollback.as_str(),
                &[("reason", "scope dropped while open"), ("outcome", &outcome)],
            );
        }
    }
}
