//! KEYPAGE Core - Keyset cursors and resumable page iteration.
//!
//! This crate provides the pagination engine for KEYPAGE: cursor validation,
//! predicate builders, the record source contract, and the keyset iterator
//! with its caching decorator. It performs no I/O of its own.

pub mod caching;
pub mod context;
pub mod cursor;
pub mod error;
pub mod iterator;
pub mod list_options;
pub mod predicate;
pub mod query;
pub mod record;
pub mod source;
pub mod value;

pub use caching::CachingIterator;
pub use context::{CancelHandle, Context};
pub use cursor::{Cursor, Direction};
pub use error::{Error, Result, SourceError};
pub use iterator::{KeysetIterator, KeysetIteratorBuilder};
pub use list_options::{OverFetchPage, WebhookLogListOptions, EXTERNAL_SERVICE_ID_COLUMN};
pub use predicate::{CompareOp, ForeignKeyFilter, Predicate, PredicateSet};
pub use query::{Filter, NoFilter, OrderBy, PageQuery, SortDirection, MAX_LIMIT};
pub use record::{ColumnKind, CursorColumn, Record};
pub use source::{MemorySource, RecordSource, Visit};
pub use value::{format_timestamp, Value};
