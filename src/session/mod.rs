//! Sessions - The per-transaction identity map.
//!
//! A session tracks every view touched by one unit of work as Added, Loaded or
//! Removed, hands out the same [`ViewRef`] for repeated lookups, and flushes
//! all three buckets to a [`PersistenceAdapter`](crate::PersistenceAdapter)
//! at commit. Sessions are single-threaded and never outlive their unit of work.

mod commit;

use std::collections::BTreeMap;

use crate::error::ViewError;
use crate::view::{IndexColumns, View, ViewRef};

pub use commit::CommitStats;

/// Session status of a tracked id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    Added,
    Loaded,
    Removed,
}

/// Result of a session lookup by id.
#[derive(Debug)]
pub enum Lookup<V> {
    /// The id is tracked and live.
    Found(ViewRef<V>),
    /// The id was removed in this session. Must not fall through to storage.
    Deleted,
    /// The session knows nothing about the id.
    Absent,
}

struct Tracked<V> {
    status: Status,
    item: Option<ViewRef<V>>,
    /// Version observed when the view was loaded; the update token at flush.
    version: u64,
    /// A storage row is known to exist for this id: it was loaded, or removed
    /// without being looked up. Deleting it must affect exactly one row.
    stored: bool,
    /// The id was removed in this session, so any stored row is deleted at
    /// commit even if the id was added again afterwards.
    delete_pending: bool,
    /// Index attributes captured at load, for modification checks.
    loaded_index: IndexColumns,
    /// Version written by the last commit, applied once the flush completes.
    flushed_version: Option<u64>,
}

/// Counts of pending work per status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Pending {
    pub added: usize,
    pub loaded: usize,
    pub removed: usize,
}

/// Per-transaction identity map for views of type `V`.
pub struct Session<V: View> {
    entries: BTreeMap<String, Tracked<V>>,
}

impl<V: View> Default for Session<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: View> Session<V> {
    pub fn new() -> Self {
        Session {
            entries: BTreeMap::new(),
        }
    }

    /// Track a new view as Added, replacing whatever the id had before.
    ///
    /// Re-adding an id removed earlier in this session is allowed; the old
    /// stored row is then deleted before the new one is inserted. Adding over
    /// a Loaded id without removing it first collides at insert.
    pub fn add(&mut self, view: ViewRef<V>) {
        let id = view.id().to_string();
        let (stored, delete_pending) = self
            .entries
            .get(&id)
            .map(|prior| (prior.stored, prior.delete_pending))
            .unwrap_or((false, false));

        self.entries.insert(
            id,
            Tracked {
                status: Status::Added,
                item: Some(view),
                version: 0,
                stored,
                delete_pending,
                loaded_index: IndexColumns::new(),
                flushed_version: None,
            },
        );
    }

    /// Track a view fetched from storage as Loaded at `observed_version`.
    ///
    /// Ids that are already tracked are left alone, so an Added, Loaded or
    /// Removed entry is never downgraded. Returns whether the view was attached.
    pub fn add_loaded(&mut self, view: ViewRef<V>, observed_version: u64) -> Result<bool, ViewError> {
        if self.entries.contains_key(view.id()) {
            return Ok(false);
        }

        let loaded_index = view
            .try_borrow()
            .map_err(|_| borrowed::<V>(view.id()))?
            .index();

        self.entries.insert(
            view.id().to_string(),
            Tracked {
                status: Status::Loaded,
                item: Some(view),
                version: observed_version,
                stored: true,
                delete_pending: false,
                loaded_index,
                flushed_version: None,
            },
        );
        Ok(true)
    }

    /// Mark `id` Removed. Untracked ids get a bare marker, which expects the
    /// stored row to exist at commit.
    pub fn add_removed(&mut self, id: &str) {
        match self.entries.get_mut(id) {
            Some(tracked) => {
                tracked.status = Status::Removed;
                tracked.item = None;
                tracked.delete_pending = true;
            }
            None => {
                self.entries.insert(
                    id.to_string(),
                    Tracked {
                        status: Status::Removed,
                        item: None,
                        version: 0,
                        stored: true,
                        delete_pending: true,
                        loaded_index: IndexColumns::new(),
                        flushed_version: None,
                    },
                );
            }
        }
    }

    /// Look up a tracked view by id.
    pub fn find(&self, id: &str) -> Lookup<V> {
        match self.entries.get(id) {
            None => Lookup::Absent,
            Some(tracked) if tracked.status == Status::Removed => Lookup::Deleted,
            Some(tracked) => match &tracked.item {
                Some(item) => Lookup::Found(item.clone()),
                None => Lookup::Absent,
            },
        }
    }

    /// Every live tracked view that currently satisfies `matcher`, in id order.
    ///
    /// The matcher sees live state, including edits made in this session.
    pub fn find_matching<F>(&self, matcher: F) -> Result<Vec<ViewRef<V>>, ViewError>
    where
        F: Fn(&V) -> bool,
    {
        let mut matches = Vec::new();
        for (id, tracked) in &self.entries {
            if tracked.status == Status::Removed {
                continue;
            }
            if let Some(item) = &tracked.item {
                let view = item.try_borrow().map_err(|_| borrowed::<V>(id))?;
                if matcher(&view) {
                    matches.push(item.clone());
                }
            }
        }
        Ok(matches)
    }

    pub fn status(&self, id: &str) -> Option<Status> {
        self.entries.get(id).map(|tracked| tracked.status)
    }

    /// The version observed when `id` was loaded.
    pub fn observed_version(&self, id: &str) -> Option<u64> {
        self.entries
            .get(id)
            .filter(|tracked| tracked.status == Status::Loaded)
            .map(|tracked| tracked.version)
    }

    pub fn pending(&self) -> Pending {
        let mut pending = Pending::default();
        for tracked in self.entries.values() {
            match tracked.status {
                Status::Added => pending.added += 1,
                Status::Loaded => pending.loaded += 1,
                Status::Removed => pending.removed += 1,
            }
        }
        pending
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn borrowed<V: View>(id: &str) -> ViewError {
    ViewError::Borrowed {
        table: V::TABLE.to_string(),
        id: id.to_string(),
    }
}
