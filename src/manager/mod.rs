//! View manager - The application-facing façade over sessions and storage.
//!
//! A [`ViewManager`] is built once per view type from a persistence adapter
//! and a payload codec, and shared freely between threads. Each transaction
//! gets its own [`UnitOfWork`] (or a caller-owned [`Session`]); every lookup
//! goes through that session's identity map before touching storage.
//!
//! ## Example
//!
//! ```ignore
//! let manager = ViewManager::<OrderView>::json(adapter);
//!
//! manager.transaction(|uow| {
//!     let order = uow.require("order-1")?;
//!     order.borrow_mut().customer_id = "c-2".into();
//!     Ok::<_, ViewError>(())
//! })?;
//! ```

mod merge;
mod unit_of_work;

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, trace, warn};

use crate::adapter::{Criteria, PersistenceAdapter, Row};
use crate::codec::{Codec, JsonCodec};
use crate::error::{ViewError, ViewResult};
use crate::session::{CommitStats, Lookup, Session};
use crate::view::{Document, View, ViewRef};

pub use unit_of_work::UnitOfWork;

/// Entry point for reading and writing views of type `V`.
pub struct ViewManager<V: View> {
    adapter: Arc<dyn PersistenceAdapter>,
    codec: Arc<dyn Codec<V::Payload>>,
    _marker: PhantomData<fn() -> V>,
}

impl<V: View> Clone for ViewManager<V> {
    fn clone(&self) -> Self {
        ViewManager {
            adapter: Arc::clone(&self.adapter),
            codec: Arc::clone(&self.codec),
            _marker: PhantomData,
        }
    }
}

impl<V: View> fmt::Debug for ViewManager<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ViewManager")
            .field("table", &V::TABLE)
            .field("schema", self.adapter.schema())
            .finish()
    }
}

impl<V: View> ViewManager<V> {
    pub fn new<A, C>(adapter: A, codec: C) -> Self
    where
        A: PersistenceAdapter + 'static,
        C: Codec<V::Payload> + 'static,
    {
        Self::from_shared(Arc::new(adapter), Arc::new(codec))
    }

    /// Build from an adapter and codec that are already shared elsewhere.
    pub fn from_shared(
        adapter: Arc<dyn PersistenceAdapter>,
        codec: Arc<dyn Codec<V::Payload>>,
    ) -> Self {
        if adapter.schema().table() != V::TABLE {
            warn!(
                target: "view_cache::manager",
                view_table = V::TABLE,
                adapter_table = adapter.schema().table(),
                "adapter table does not match view table"
            );
        }
        ViewManager {
            adapter,
            codec,
            _marker: PhantomData,
        }
    }

    /// A manager storing payloads as JSON.
    pub fn json<A>(adapter: A) -> Self
    where
        A: PersistenceAdapter + 'static,
        V::Payload: Serialize + DeserializeOwned,
    {
        Self::new(adapter, JsonCodec)
    }

    pub fn adapter(&self) -> &dyn PersistenceAdapter {
        self.adapter.as_ref()
    }

    pub fn codec(&self) -> Arc<dyn Codec<V::Payload>> {
        Arc::clone(&self.codec)
    }

    /// Open a unit of work with a fresh session.
    pub fn begin(&self) -> UnitOfWork<'_, V> {
        UnitOfWork::new(self)
    }

    /// Run `work` in a unit of work, flushing on `Ok` and discarding on `Err`.
    pub fn transaction<T, E, F>(&self, work: F) -> Result<T, E>
    where
        F: FnOnce(&mut UnitOfWork<'_, V>) -> Result<T, E>,
        E: From<ViewError>,
    {
        let mut uow = self.begin();
        match work(&mut uow) {
            Ok(value) => {
                uow.flush()?;
                Ok(value)
            }
            Err(err) => {
                uow.discard();
                Err(err)
            }
        }
    }

    /// Resolve `id` through the session, falling back to storage.
    ///
    /// Fails with `NotFound` when the id is unknown to both, or was removed
    /// earlier in this session.
    pub fn require(&self, session: &mut Session<V>, id: &str) -> ViewResult<ViewRef<V>> {
        match session.find(id) {
            Lookup::Found(view) => {
                trace!(target: "view_cache::manager", table = V::TABLE, id, "identity map hit");
                return Ok(view);
            }
            Lookup::Deleted => return Err(ViewError::not_found(V::TABLE, id)),
            Lookup::Absent => {}
        }

        let row = self
            .adapter
            .select(id)?
            .ok_or_else(|| ViewError::not_found(V::TABLE, id))?;
        let version = row.version;
        let view = ViewRef::new(self.restore(row)?);
        session.add_loaded(view.clone(), version)?;
        Ok(view)
    }

    /// Like [`require`](Self::require), but `None` when the view does not exist.
    pub fn load(&self, session: &mut Session<V>, id: &str) -> ViewResult<Option<ViewRef<V>>> {
        match self.require(session, id) {
            Ok(view) => Ok(Some(view)),
            Err(err) if err.is_not_found() => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// Build a new view around `payload` and persist it.
    pub fn create(
        &self,
        session: &mut Session<V>,
        id: impl Into<String>,
        payload: V::Payload,
    ) -> ViewResult<ViewRef<V>> {
        let view = V::from_new(Document::new(id, payload))?;
        self.persist(session, view)
    }

    /// Attach a new view to the session as Added. It is inserted at flush.
    pub fn persist(&self, session: &mut Session<V>, mut view: V) -> ViewResult<ViewRef<V>> {
        if view.id().is_empty() {
            return Err(ViewError::Schema {
                table: V::TABLE.to_string(),
                message: "cannot persist a view with an empty id".to_string(),
            });
        }
        if !view.document().has_codec() {
            view.document_mut().attach_codec(self.codec());
        }

        let view = ViewRef::new(view);
        session.add(view.clone());
        Ok(view)
    }

    /// Mark `id` for deletion at flush. Storage is not touched.
    pub fn remove(&self, session: &mut Session<V>, id: &str) {
        session.add_removed(id);
    }

    /// Truncate the table immediately, bypassing every session.
    pub fn delete_all(&self) -> ViewResult<()> {
        debug!(target: "view_cache::manager", table = V::TABLE, "deleting all rows");
        self.adapter.delete_all()
    }

    /// Query storage by index columns and reconcile the rows with the session.
    ///
    /// `matcher` must accept every view `criteria` selects.
    pub fn find_by<F>(
        &self,
        session: &mut Session<V>,
        criteria: &Criteria,
        matcher: F,
    ) -> ViewResult<Vec<ViewRef<V>>>
    where
        F: Fn(&V) -> bool,
    {
        let fetched = self
            .adapter
            .select_by(criteria)?
            .into_iter()
            .map(|row| self.restore(row))
            .collect::<ViewResult<Vec<_>>>()?;
        self.merge(session, fetched, matcher)
    }

    /// Commit `session` as one physical transaction and settle it.
    pub fn flush(&self, session: &mut Session<V>) -> ViewResult<CommitStats> {
        let mut stats = CommitStats::default();
        self.adapter
            .atomically(&mut |tx: &dyn PersistenceAdapter| {
                stats = session.commit(tx)?;
                Ok(())
            })?;
        session.complete()?;

        debug!(
            target: "view_cache::manager",
            table = V::TABLE,
            deleted = stats.deleted,
            updated = stats.updated,
            inserted = stats.inserted,
            "session flushed"
        );
        Ok(stats)
    }

    /// Rebuild a detached view from a stored row.
    pub fn restore(&self, row: Row) -> ViewResult<V> {
        let Row {
            id,
            version,
            data,
            index,
        } = row;
        let document = Document::stored(id, version, data, self.codec());
        V::from_row(document, &index)
    }
}
