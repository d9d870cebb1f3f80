//! Store error types.

use thiserror::Error;

/// Store errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// SQLite error.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Request payload could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Stored timestamp is not RFC 3339.
    #[error("invalid timestamp {value:?}: {source}")]
    InvalidTimestamp {
        value: String,
        #[source]
        source: chrono::ParseError,
    },

    /// Record not found.
    #[error("record not found")]
    NotFound,

    /// Error raised by the pagination layer, including visitor errors.
    #[error(transparent)]
    Pagination(#[from] keypage_core::Error),
}

/// Result alias for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Pagination errors pass through untouched; everything else is a source failure.
impl From<StoreError> for keypage_core::Error {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Pagination(inner) => inner,
            other => keypage_core::Error::source_failure(other),
        }
    }
}
