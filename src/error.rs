use thiserror::Error;

use crate::codec::CodecError;

/// Result type for view cache operations.
pub type ViewResult<T> = Result<T, ViewError>;

/// Errors raised by sessions, the view manager and persistence adapters.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ViewError {
    /// The id exists neither in the session nor in storage, or it was removed
    /// earlier in the same unit of work.
    #[error("view not found: {table}:{id}")]
    NotFound { table: String, id: String },

    /// A concurrent writer changed the stored state this flush relied on.
    #[error(transparent)]
    OptimisticConflict(#[from] OptimisticConflict),

    /// An insert collided with an existing primary key.
    #[error("duplicate key: {table}:{id}")]
    DuplicateKey { table: String, id: String },

    #[error(transparent)]
    Codec(#[from] CodecError),

    /// A row or criteria did not fit the table schema.
    #[error("schema violation on {table}: {message}")]
    Schema { table: String, message: String },

    /// The view is mutably borrowed by a caller while the session needs it.
    #[error("view {table}:{id} is already borrowed")]
    Borrowed { table: String, id: String },

    /// Any other storage-level failure.
    #[error("storage error: {0}")]
    Storage(String),
}

impl ViewError {
    pub fn not_found(table: impl Into<String>, id: impl Into<String>) -> Self {
        ViewError::NotFound {
            table: table.into(),
            id: id.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ViewError::NotFound { .. })
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, ViewError::OptimisticConflict(_))
    }
}

/// Optimistic concurrency failures detected while flushing a session.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OptimisticConflict {
    /// The conditional update matched no row: the stored version moved on or
    /// the row is gone.
    #[error("optimistic lock failure on {table}:{id} (expected version {expected})")]
    StaleVersion {
        table: String,
        id: String,
        expected: u64,
    },

    /// The bulk delete removed fewer rows than requested.
    #[error("expected {expected} deletions from {table} but affected {affected} rows ({ids:?})")]
    DeleteCount {
        table: String,
        expected: usize,
        affected: usize,
        ids: Vec<String>,
    },
}
