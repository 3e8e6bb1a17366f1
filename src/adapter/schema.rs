use crate::adapter::{Criteria, Row};
use crate::error::ViewError;
use crate::view::View;

/// Explicit descriptor of a view table: its name and ordered index columns.
///
/// Built once at startup and handed to the adapter, so rows and criteria can
/// be validated without reflection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSchema {
    table: String,
    index_columns: Vec<String>,
}

impl TableSchema {
    pub fn new(table: impl Into<String>) -> Self {
        TableSchema {
            table: table.into(),
            index_columns: Vec::new(),
        }
    }

    /// Schema named after the view's table.
    pub fn for_view<V: View>() -> Self {
        TableSchema::new(V::TABLE)
    }

    /// Append an index column.
    pub fn index(mut self, column: impl Into<String>) -> Self {
        let column = column.into();
        if !self.index_columns.contains(&column) {
            self.index_columns.push(column);
        }
        self
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn index_columns(&self) -> &[String] {
        &self.index_columns
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.index_columns.iter().any(|c| c == column)
    }

    /// Reject rows without an id or with columns the table does not have.
    pub fn check_row(&self, row: &Row) -> Result<(), ViewError> {
        if row.id.is_empty() {
            return Err(self.violation("row has an empty id".to_string()));
        }
        match row.index.columns().find(|column| !self.has_column(column)) {
            Some(column) => Err(self.violation(format!(
                "unknown column {} on row {}",
                column, row.id
            ))),
            None => Ok(()),
        }
    }

    /// Reject criteria filtering on unknown columns.
    pub fn check_criteria(&self, criteria: &Criteria) -> Result<(), ViewError> {
        match criteria
            .filters()
            .iter()
            .find(|(column, _)| !self.has_column(column))
        {
            Some((column, _)) => Err(self.violation(format!("unknown column {} in criteria", column))),
            None => Ok(()),
        }
    }

    fn violation(&self, message: String) -> ViewError {
        ViewError::Schema {
            table: self.table.clone(),
            message,
        }
    }
}
