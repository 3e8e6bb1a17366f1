use std::collections::BTreeSet;

use tracing::warn;

use super::{borrowed, Session, Status};
use crate::adapter::{PersistenceAdapter, Row};
use crate::error::{OptimisticConflict, ViewError};
use crate::view::View;

/// Statement counts of one commit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CommitStats {
    pub deleted: usize,
    pub updated: usize,
    pub inserted: usize,
}

impl CommitStats {
    /// True when the commit issued no writes.
    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }

    pub fn total(&self) -> usize {
        self.deleted + self.updated + self.inserted
    }
}

impl<V: View> Session<V> {
    /// Write the session to `adapter`: delete removed ids, update modified
    /// loaded views, then insert added views.
    ///
    /// Updates carry the version observed at load as the concurrency token and
    /// write `observed + 1`. Nothing in memory changes until [`complete`] runs,
    /// so a failed commit leaves the session exactly as it was. The caller is
    /// responsible for rolling back statements already issued; run the commit
    /// inside [`PersistenceAdapter::atomically`] to get that for free.
    ///
    /// [`complete`]: Session::complete
    pub fn commit(&mut self, adapter: &dyn PersistenceAdapter) -> Result<CommitStats, ViewError> {
        let mut stats = CommitStats::default();
        for tracked in self.entries.values_mut() {
            tracked.flushed_version = None;
        }

        // Rows known to exist must all go; rows that may exist are deleted
        // without a count check.
        let mut doomed: BTreeSet<String> = BTreeSet::new();
        let mut maybe_stored: BTreeSet<String> = BTreeSet::new();
        for (id, tracked) in &self.entries {
            if !tracked.delete_pending || tracked.status == Status::Loaded {
                continue;
            }
            if tracked.stored {
                doomed.insert(id.clone());
            } else {
                maybe_stored.insert(id.clone());
            }
        }

        if !doomed.is_empty() {
            let affected = adapter.delete(&doomed)?;
            if affected != doomed.len() {
                warn!(
                    target: "view_cache::session",
                    table = V::TABLE,
                    expected = doomed.len(),
                    affected,
                    "bulk delete count mismatch"
                );
                return Err(OptimisticConflict::DeleteCount {
                    table: V::TABLE.to_string(),
                    expected: doomed.len(),
                    affected,
                    ids: doomed.into_iter().collect(),
                }
                .into());
            }
            stats.deleted = affected;
        }
        if !maybe_stored.is_empty() {
            stats.deleted += adapter.delete(&maybe_stored)?;
        }

        for (id, tracked) in self.entries.iter_mut() {
            if tracked.status != Status::Loaded {
                continue;
            }
            let Some(item) = &tracked.item else {
                continue;
            };
            let mut view = item.try_borrow_mut().map_err(|_| borrowed::<V>(id))?;
            if !view.is_modified(&tracked.loaded_index) {
                continue;
            }

            let next = tracked.version + 1;
            let mut row = Row::from_view(&mut *view)?;
            row.version = next;

            if adapter.update(row, tracked.version)? != 1 {
                warn!(
                    target: "view_cache::session",
                    table = V::TABLE,
                    id = %id,
                    expected = tracked.version,
                    "optimistic lock failure"
                );
                return Err(OptimisticConflict::StaleVersion {
                    table: V::TABLE.to_string(),
                    id: id.clone(),
                    expected: tracked.version,
                }
                .into());
            }
            drop(view);
            tracked.flushed_version = Some(next);
            stats.updated += 1;
        }

        for (id, tracked) in self.entries.iter_mut() {
            if tracked.status != Status::Added {
                continue;
            }
            let Some(item) = &tracked.item else {
                continue;
            };
            let mut view = item.try_borrow_mut().map_err(|_| borrowed::<V>(id))?;
            let row = Row::from_view(&mut *view)?;
            let version = row.version;
            adapter.insert(row)?;
            drop(view);
            tracked.flushed_version = Some(version);
            stats.inserted += 1;
        }

        Ok(stats)
    }

    /// Settle the session after its commit reached storage.
    ///
    /// Removed entries are retired, written views take their new version,
    /// added views become Loaded and every document is marked flushed.
    pub fn complete(&mut self) -> Result<(), ViewError> {
        self.entries
            .retain(|_, tracked| tracked.status != Status::Removed);

        for (id, tracked) in self.entries.iter_mut() {
            let Some(item) = tracked.item.clone() else {
                continue;
            };
            let mut view = item.try_borrow_mut().map_err(|_| borrowed::<V>(id))?;
            if let Some(version) = tracked.flushed_version.take() {
                view.document_mut().set_version(version);
            }
            view.document_mut().mark_flushed();

            tracked.status = Status::Loaded;
            tracked.stored = true;
            tracked.delete_pending = false;
            tracked.version = view.version();
            tracked.loaded_index = view.index();
        }
        Ok(())
    }
}
