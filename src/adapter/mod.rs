//! Persistence adapters - Physical reads and writes behind the session.
//!
//! The session never builds statements itself. It hands fully formed [`Row`]s
//! to a [`PersistenceAdapter`], which is built once per table from an explicit
//! [`TableSchema`] and enforces the version check on update.

mod in_memory;
mod schema;

use std::collections::BTreeSet;

use serde_json::Value;

use crate::error::ViewError;
use crate::view::{IndexColumns, View};

pub use in_memory::InMemoryAdapter;
pub use schema::TableSchema;

/// One stored record: primary key, version, serialized payload and index columns.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    pub id: String,
    pub version: u64,
    pub data: Option<Vec<u8>>,
    pub index: IndexColumns,
}

impl Row {
    /// Build the row to write for `view`, serializing its payload if dirty.
    pub fn from_view<V: View>(view: &mut V) -> Result<Row, ViewError> {
        let data = view.document_mut().serialize()?;
        Ok(Row {
            id: view.id().to_string(),
            version: view.version(),
            data,
            index: view.index(),
        })
    }
}

/// Equality filters over index columns, combined with AND.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Criteria {
    filters: Vec<(String, Value)>,
}

impl Criteria {
    pub fn new() -> Self {
        Criteria::default()
    }

    /// Require `column == value`.
    pub fn eq(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filters.push((column.into(), value.into()));
        self
    }

    pub fn filters(&self) -> &[(String, Value)] {
        &self.filters
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    /// Evaluate the criteria against stored index columns.
    pub fn matches(&self, index: &IndexColumns) -> bool {
        self.filters
            .iter()
            .all(|(column, value)| index.get(column) == Some(value))
    }
}

/// Physical storage for one table of views.
///
/// Implementations must be safe to share between concurrently running units
/// of work. All version checks happen here, atomically per statement.
pub trait PersistenceAdapter: Send + Sync {
    /// The table descriptor this adapter was built from.
    fn schema(&self) -> &TableSchema;

    /// Point lookup by primary key.
    fn select(&self, id: &str) -> Result<Option<Row>, ViewError>;

    /// Derived query by index columns.
    fn select_by(&self, criteria: &Criteria) -> Result<Vec<Row>, ViewError>;

    /// Insert a new row. Fails with `DuplicateKey` if the id exists.
    fn insert(&self, row: Row) -> Result<(), ViewError>;

    /// Replace the row with `row.id` only if its stored version equals
    /// `expected_version`. Returns the number of rows changed (0 or 1).
    fn update(&self, row: Row, expected_version: u64) -> Result<usize, ViewError>;

    /// Delete every row in `ids`. Returns the number of rows actually removed.
    fn delete(&self, ids: &BTreeSet<String>) -> Result<usize, ViewError>;

    /// Remove all rows unconditionally.
    fn delete_all(&self) -> Result<(), ViewError>;

    /// Run `work` as one physical transaction: if it fails, none of the
    /// statements it issued may remain visible. Adapters without transactional
    /// storage may simply call `work(self)`.
    fn atomically(
        &self,
        work: &mut dyn FnMut(&dyn PersistenceAdapter) -> Result<(), ViewError>,
    ) -> Result<(), ViewError>;
}
