use std::mem;

use tracing::debug;

use super::ViewManager;
use crate::adapter::Criteria;
use crate::error::ViewResult;
use crate::session::{CommitStats, Session};
use crate::view::{View, ViewRef};

/// A transaction-scoped session bound to its manager.
///
/// Call [`flush`](Self::flush) right before committing the surrounding
/// transaction, or [`discard`](Self::discard) on rollback. Dropping a unit of
/// work without flushing discards it.
pub struct UnitOfWork<'m, V: View> {
    manager: &'m ViewManager<V>,
    session: Session<V>,
}

impl<'m, V: View> UnitOfWork<'m, V> {
    pub(super) fn new(manager: &'m ViewManager<V>) -> Self {
        UnitOfWork {
            manager,
            session: Session::new(),
        }
    }

    pub fn manager(&self) -> &'m ViewManager<V> {
        self.manager
    }

    pub fn session(&self) -> &Session<V> {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut Session<V> {
        &mut self.session
    }

    pub fn require(&mut self, id: &str) -> ViewResult<ViewRef<V>> {
        self.manager.require(&mut self.session, id)
    }

    pub fn load(&mut self, id: &str) -> ViewResult<Option<ViewRef<V>>> {
        self.manager.load(&mut self.session, id)
    }

    pub fn create(&mut self, id: impl Into<String>, payload: V::Payload) -> ViewResult<ViewRef<V>> {
        self.manager.create(&mut self.session, id, payload)
    }

    pub fn persist(&mut self, view: V) -> ViewResult<ViewRef<V>> {
        self.manager.persist(&mut self.session, view)
    }

    pub fn remove(&mut self, id: &str) {
        self.manager.remove(&mut self.session, id)
    }

    pub fn find_by<F>(&mut self, criteria: &Criteria, matcher: F) -> ViewResult<Vec<ViewRef<V>>>
    where
        F: Fn(&V) -> bool,
    {
        self.manager.find_by(&mut self.session, criteria, matcher)
    }

    pub fn merge<F>(&mut self, db_results: Vec<V>, matcher: F) -> ViewResult<Vec<ViewRef<V>>>
    where
        F: Fn(&V) -> bool,
    {
        self.manager.merge(&mut self.session, db_results, matcher)
    }

    /// Write all pending changes. The unit of work is consumed either way.
    pub fn flush(mut self) -> ViewResult<CommitStats> {
        let mut session = mem::take(&mut self.session);
        self.manager.flush(&mut session)
    }

    /// Drop all pending changes without touching storage.
    pub fn discard(self) {}
}

impl<V: View> Drop for UnitOfWork<'_, V> {
    fn drop(&mut self) {
        if self.session.is_empty() {
            return;
        }
        let pending = self.session.pending();
        debug!(
            target: "view_cache::manager",
            table = V::TABLE,
            added = pending.added,
            loaded = pending.loaded,
            removed = pending.removed,
            "unit of work discarded"
        );
    }
}
