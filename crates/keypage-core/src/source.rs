//! Record source contract and an in-memory implementation.

use std::cmp::Ordering;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::error::Result;
use crate::query::{PageQuery, SortDirection};
use crate::record::Record;
use crate::value::Value;

/// Callback invoked once per streamed record. Returning an error aborts the stream.
pub type Visit<'a, R> = dyn FnMut(R) -> Result<()> + Send + 'a;

/// An ordered store that can execute a [`PageQuery`].
///
/// Implementations must be safe to share between iterators.
///
/// Cancellation only interrupts a fetch at its await points. A source that
/// completes without yielding, such as a blocking SQLite query, runs to the
/// end once started; the iterator then discards its page and reports
/// [`Error::Cancelled`](crate::Error::Cancelled) with the cursor untouched.
#[async_trait]
pub trait RecordSource: Send + Sync {
    /// Entity produced by this source.
    type Record: Record + Send;

    /// Visit every record matching `query`, in order, up to its limit.
    ///
    /// Errors from `visit` abort the stream and are returned unchanged.
    async fn stream_records(
        &self,
        query: &PageQuery,
        visit: &mut Visit<'_, Self::Record>,
    ) -> Result<()>;

    /// Number of records matching the predicates of `query`, ignoring order and limit.
    async fn count_records(&self, query: &PageQuery) -> Result<u64>;
}

/// Record source over an in-memory vector.
///
/// Rows may be inserted or removed between pages to exercise iteration over a
/// mutating set.
pub struct MemorySource<R> {
    rows: RwLock<Vec<R>>,
}

impl<R> MemorySource<R>
where
    R: Record + Clone + Send + Sync,
{
    /// Create a source holding `rows`.
    pub fn new(rows: Vec<R>) -> Self {
        Self {
            rows: RwLock::new(rows),
        }
    }

    /// Add a row.
    pub fn insert(&self, row: R) {
        self.rows.write().push(row);
    }

    /// Remove every row matching `pred`, returning how many were removed.
    pub fn remove_where(&self, mut pred: impl FnMut(&R) -> bool) -> usize {
        let mut rows = self.rows.write();
        let before = rows.len();
        rows.retain(|r| !pred(r));
        before - rows.len()
    }

    /// Number of rows held.
    pub fn len(&self) -> usize {
        self.rows.read().len()
    }

    /// Check if the source holds no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.read().is_empty()
    }

    fn select(&self, query: &PageQuery) -> Vec<R> {
        let rows = self.rows.read();
        let mut matched: Vec<R> = rows
            .iter()
            .filter(|r| query.predicates.matches(*r))
            .cloned()
            .collect();
        drop(rows);

        if let Some(order) = &query.order {
            matched.sort_by(|a, b| {
                let ord = compare_field(a, b, &order.column);
                match order.direction {
                    SortDirection::Asc => ord,
                    SortDirection::Desc => ord.reverse(),
                }
            });
        }
        if let Some(limit) = query.limit {
            matched.truncate(limit);
        }
        matched
    }
}

fn compare_field<R: Record>(a: &R, b: &R, column: &str) -> Ordering {
    let a = a.field(column).unwrap_or(Value::Null);
    let b = b.field(column).unwrap_or(Value::Null);
    a.sort_cmp(&b)
}

#[async_trait]
impl<R> RecordSource for MemorySource<R>
where
    R: Record + Clone + Send + Sync,
{
    type Record = R;

    async fn stream_records(&self, query: &PageQuery, visit: &mut Visit<'_, R>) -> Result<()> {
        for row in self.select(query) {
            visit(row)?;
        }
        Ok(())
    }

    async fn count_records(&self, query: &PageQuery) -> Result<u64> {
        let rows = self.rows.read();
        Ok(rows.iter().filter(|r| query.predicates.matches(*r)).count() as u64)
    }
}
