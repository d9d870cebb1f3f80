//! Core error types.

use thiserror::Error;

/// Boxed error produced by a record source.
pub type SourceError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Pagination errors.
#[derive(Debug, Error)]
pub enum Error {
    /// Cursor column is not in the entity's allow-list.
    #[error("invalid cursor column: {column:?}")]
    InvalidCursorColumn { column: String },

    /// Cursor direction is neither `next` nor `prev`.
    #[error("invalid cursor direction: {direction:?}")]
    InvalidCursorDirection { direction: String },

    /// Cursor value cannot be interpreted for its column.
    #[error("invalid cursor value {value:?} for column {column:?}")]
    InvalidCursorValue { column: String, value: String },

    /// Iterator built without a record source.
    #[error("iterator requires a record source")]
    MissingRecordSource,

    /// Iterator built without a cursor.
    #[error("iterator requires a cursor")]
    MissingCursor,

    /// Failure reported by the underlying record source.
    #[error(transparent)]
    RecordSource(SourceError),

    /// The caller's cancellation signal fired.
    #[error("operation cancelled")]
    Cancelled,
}

impl Error {
    /// Wrap a record source failure.
    pub fn source_failure(err: impl Into<SourceError>) -> Self {
        Error::RecordSource(err.into())
    }

    /// Whether retrying the same call may succeed.
    ///
    /// Source failures and cancellation leave the cursor untouched.
    pub fn is_resumable(&self) -> bool {
        matches!(self, Error::RecordSource(_) | Error::Cancelled)
    }
}

/// Result alias for core operations.
pub type Result<T> = std::result::Result<T, Error>;
