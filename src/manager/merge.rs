use std::collections::BTreeSet;

use tracing::trace;

use super::ViewManager;
use crate::error::ViewResult;
use crate::session::{Lookup, Session};
use crate::view::{View, ViewRef};

impl<V: View> ViewManager<V> {
    /// Reconcile the result of a derived query with the session.
    ///
    /// `matcher` must be equivalent to the query that produced `db_results`.
    /// The result holds every tracked view that matches right now, followed by
    /// the fetched views whose ids the session did not know yet; those are
    /// attached as Loaded. Fetched rows shadowed by a tracked view (edited so it
    /// no longer matches, or removed) are dropped.
    pub fn merge<F>(
        &self,
        session: &mut Session<V>,
        db_results: Vec<V>,
        matcher: F,
    ) -> ViewResult<Vec<ViewRef<V>>>
    where
        F: Fn(&V) -> bool,
    {
        let mut results = session.find_matching(&matcher)?;
        let matched: BTreeSet<String> = results.iter().map(|view| view.id().to_string()).collect();

        for mut view in db_results {
            if matched.contains(view.id()) {
                continue;
            }
            match session.find(view.id()) {
                Lookup::Found(_) => {
                    trace!(
                        target: "view_cache::manager",
                        table = V::TABLE,
                        id = view.id(),
                        "stored row shadowed by non-matching session view"
                    );
                    continue;
                }
                Lookup::Deleted => {
                    trace!(
                        target: "view_cache::manager",
                        table = V::TABLE,
                        id = view.id(),
                        "stored row removed in session"
                    );
                    continue;
                }
                Lookup::Absent => {}
            }

            if !view.document().has_codec() {
                view.document_mut().attach_codec(self.codec());
            }
            let version = view.version();
            let view = ViewRef::new(view);
            session.add_loaded(view.clone(), version)?;
            results.push(view);
        }

        Ok(results)
    }
}
