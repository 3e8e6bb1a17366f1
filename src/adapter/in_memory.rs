//! InMemoryAdapter - BTreeMap-backed persistence adapter for testing and development.

use std::collections::{BTreeMap, BTreeSet};
use std::mem;
use std::sync::{Arc, RwLock};

use super::{Criteria, PersistenceAdapter, Row, TableSchema};
use crate::error::ViewError;

/// In-memory table backed by a `BTreeMap` keyed by id.
///
/// Clone-friendly via Arc: clones share the same rows. `atomically` stages all
/// writes on a private copy and publishes it only when the work succeeds.
#[derive(Clone)]
pub struct InMemoryAdapter {
    schema: TableSchema,
    rows: Arc<RwLock<BTreeMap<String, Row>>>,
}

impl InMemoryAdapter {
    /// Create a new empty table.
    pub fn new(schema: TableSchema) -> Self {
        Self {
            schema,
            rows: Arc::new(RwLock::new(BTreeMap::new())),
        }
    }

    /// Number of stored rows.
    pub fn len(&self) -> Result<usize, ViewError> {
        Ok(self.read_rows()?.len())
    }

    pub fn is_empty(&self) -> Result<bool, ViewError> {
        Ok(self.read_rows()?.is_empty())
    }

    /// All stored ids, in key order.
    pub fn ids(&self) -> Result<Vec<String>, ViewError> {
        Ok(self.read_rows()?.keys().cloned().collect())
    }

    fn read_rows(
        &self,
    ) -> Result<std::sync::RwLockReadGuard<'_, BTreeMap<String, Row>>, ViewError> {
        self.rows
            .read()
            .map_err(|_| ViewError::Storage("lock poisoned".into()))
    }

    fn write_rows(
        &self,
    ) -> Result<std::sync::RwLockWriteGuard<'_, BTreeMap<String, Row>>, ViewError> {
        self.rows
            .write()
            .map_err(|_| ViewError::Storage("lock poisoned".into()))
    }
}

impl PersistenceAdapter for InMemoryAdapter {
    fn schema(&self) -> &TableSchema {
        &self.schema
    }

    fn select(&self, id: &str) -> Result<Option<Row>, ViewError> {
        Ok(self.read_rows()?.get(id).cloned())
    }

    fn select_by(&self, criteria: &Criteria) -> Result<Vec<Row>, ViewError> {
        self.schema.check_criteria(criteria)?;
        Ok(self
            .read_rows()?
            .values()
            .filter(|row| criteria.matches(&row.index))
            .cloned()
            .collect())
    }

    fn insert(&self, row: Row) -> Result<(), ViewError> {
        self.schema.check_row(&row)?;
        let mut rows = self.write_rows()?;

        if rows.contains_key(&row.id) {
            return Err(ViewError::DuplicateKey {
                table: self.schema.table().to_string(),
                id: row.id,
            });
        }

        rows.insert(row.id.clone(), row);
        Ok(())
    }

    fn update(&self, row: Row, expected_version: u64) -> Result<usize, ViewError> {
        self.schema.check_row(&row)?;
        let mut rows = self.write_rows()?;

        match rows.get_mut(&row.id) {
            Some(stored) if stored.version == expected_version => {
                *stored = row;
                Ok(1)
            }
            _ => Ok(0),
        }
    }

    fn delete(&self, ids: &BTreeSet<String>) -> Result<usize, ViewError> {
        let mut rows = self.write_rows()?;
        Ok(ids.iter().filter(|id| rows.remove(*id).is_some()).count())
    }

    fn delete_all(&self) -> Result<(), ViewError> {
        self.write_rows()?.clear();
        Ok(())
    }

    fn atomically(
        &self,
        work: &mut dyn FnMut(&dyn PersistenceAdapter) -> Result<(), ViewError>,
    ) -> Result<(), ViewError> {
        // Holding the write guard serializes flushes against each other and
        // against direct writes for the duration of the work.
        let mut rows = self.write_rows()?;
        let staged = InMemoryAdapter {
            schema: self.schema.clone(),
            rows: Arc::new(RwLock::new(rows.clone())),
        };

        work(&staged)?;

        *rows = mem::take(&mut *staged.write_rows()?);
        Ok(())
    }
}
