//! Keyset iterator.
//!
//! [`KeysetIterator`] pulls successive pages from a [`RecordSource`], ordered
//! by its cursor column, and advances the cursor to the last record of each
//! page. All calls on one iterator are serialised: concurrent callers see a
//! strict sequence of non-overlapping pages.
//!
//! The cursor only moves after a page has been fully received. A failed or
//! cancelled fetch leaves it where it was, so the same call can be retried.

use std::sync::Arc;

use futures::stream::{self, Stream};
use tokio::sync::Mutex;

use crate::context::Context;
use crate::cursor::Cursor;
use crate::error::{Error, Result};
use crate::query::{Filter, NoFilter, PageQuery};
use crate::record::Record;
use crate::source::RecordSource;

/// Upper bound on rows reserved up front for a page.
const PREALLOCATE_ROWS: usize = 1024;

struct IteratorState<F> {
    filter: F,
    cursor: Cursor,
    limit: usize,
}

impl<F: Filter> IteratorState<F> {
    fn page_query<R: Record>(&self) -> Result<PageQuery> {
        let predicates = self
            .filter
            .predicates()
            .with_optional(self.cursor.bound::<R>()?);
        Ok(PageQuery::new(predicates)
            .with_order(self.cursor.order())
            .with_limit(self.limit))
    }
}

/// Resumable keyset iterator over a record source.
pub struct KeysetIterator<S: RecordSource, F = NoFilter> {
    source: Arc<S>,
    state: Mutex<IteratorState<F>>,
}

impl<S: RecordSource> KeysetIterator<S, NoFilter> {
    /// Start building an iterator.
    pub fn builder() -> KeysetIteratorBuilder<S, NoFilter> {
        KeysetIteratorBuilder::new()
    }
}

impl<S, F> KeysetIterator<S, F>
where
    S: RecordSource,
    F: Filter,
{
    /// Fetch up to `n` records after the cursor.
    ///
    /// `n == 0` returns an empty page without touching the source or the
    /// cursor. Once the sequence is exhausted every call returns an empty page.
    ///
    /// Cancellation is checked again once the source returns, so a source
    /// that never yields still leaves the cursor in place when `ctx` fires
    /// during the fetch.
    pub async fn next(&self, ctx: &Context, n: usize) -> Result<Vec<S::Record>> {
        if n == 0 {
            return Ok(Vec::new());
        }

        tokio::select! {
            biased;
            _ = ctx.cancelled() => Err(Error::Cancelled),
            page = self.fetch_page(ctx, n) => page,
        }
    }

    async fn fetch_page(&self, ctx: &Context, n: usize) -> Result<Vec<S::Record>> {
        let mut state = self.state.lock().await;
        state.limit = n;
        let query = state.page_query::<S::Record>()?;

        let mut page = Vec::with_capacity(n.min(PREALLOCATE_ROWS));
        self.source
            .stream_records(&query, &mut |record| {
                page.push(record);
                Ok(())
            })
            .await?;
        page.truncate(n);

        if ctx.is_cancelled() {
            tracing::debug!(cursor = %state.cursor, "cancelled during fetch, page dropped");
            return Err(Error::Cancelled);
        }

        if let Some(last) = page.last() {
            let column = state.cursor.column().to_string();
            let value = last
                .cursor_value(&column)
                .ok_or(Error::InvalidCursorColumn { column })?;
            state.cursor.advance(value);
        }

        tracing::trace!(
            requested = n,
            returned = page.len(),
            cursor = %state.cursor,
            "fetched page"
        );

        Ok(page)
    }

    /// Snapshot of the current cursor.
    pub async fn cursor(&self) -> Cursor {
        self.state.lock().await.cursor.clone()
    }

    /// Total records matching the filter, ignoring cursor position and limits.
    pub async fn count(&self, ctx: &Context) -> Result<u64> {
        let predicates = self.state.lock().await.filter.predicates();
        let query = PageQuery::new(predicates);

        tokio::select! {
            biased;
            _ = ctx.cancelled() => Err(Error::Cancelled),
            count = self.source.count_records(&query) => count,
        }
    }

    /// Stream of pages of `page_size` records, ending at the first empty page.
    ///
    /// An error is yielded once and ends the stream.
    pub fn pages<'a>(
        &'a self,
        ctx: &'a Context,
        page_size: usize,
    ) -> impl Stream<Item = Result<Vec<S::Record>>> + 'a {
        stream::unfold(page_size > 0, move |more| async move {
            if !more {
                return None;
            }
            match self.next(ctx, page_size).await {
                Ok(page) if page.is_empty() => None,
                Ok(page) => Some((Ok(page), true)),
                Err(err) => Some((Err(err), false)),
            }
        })
    }
}

/// Builder for [`KeysetIterator`].
pub struct KeysetIteratorBuilder<S, F> {
    source: Option<Arc<S>>,
    cursor: Option<Cursor>,
    filter: F,
}

impl<S: RecordSource> KeysetIteratorBuilder<S, NoFilter> {
    /// Create an empty builder.
    pub fn new() -> Self {
        Self {
            source: None,
            cursor: None,
            filter: NoFilter,
        }
    }
}

impl<S: RecordSource> Default for KeysetIteratorBuilder<S, NoFilter> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S, F> KeysetIteratorBuilder<S, F>
where
    S: RecordSource,
    F: Filter,
{
    /// Set the record source.
    pub fn source(mut self, source: Arc<S>) -> Self {
        self.source = Some(source);
        self
    }

    /// Set the starting cursor.
    pub fn cursor(mut self, cursor: Cursor) -> Self {
        self.cursor = Some(cursor);
        self
    }

    /// Start from the beginning of the entity's default column.
    pub fn from_start(self) -> Result<Self> {
        Ok(self.cursor(Cursor::start::<S::Record>()?))
    }

    /// Set the filter.
    pub fn filter<G: Filter>(self, filter: G) -> KeysetIteratorBuilder<S, G> {
        KeysetIteratorBuilder {
            source: self.source,
            cursor: self.cursor,
            filter,
        }
    }

    /// Build the iterator.
    pub fn build(self) -> Result<KeysetIterator<S, F>> {
        let source = self.source.ok_or(Error::MissingRecordSource)?;
        let cursor = self.cursor.ok_or(Error::MissingCursor)?;
        // Cursors built for another entity are rejected before the first fetch.
        if <S::Record as Record>::cursor_column(cursor.column()).is_none() {
            return Err(Error::InvalidCursorColumn {
                column: cursor.column().to_string(),
            });
        }
        cursor.bound::<S::Record>()?;

        Ok(KeysetIterator {
            source,
            state: Mutex::new(IteratorState {
                filter: self.filter,
                cursor,
                limit: 0,
            }),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::predicate::{Predicate, PredicateSet};
    use crate::record::CursorColumn;
    use crate::source::MemorySource;
    use crate::value::Value;
    use futures::TryStreamExt;

    #[derive(Debug, Clone, PartialEq)]
    struct Repo {
        id: i64,
        name: String,
    }

    impl Record for Repo {
        const CURSOR_COLUMNS: &'static [CursorColumn] =
            &[CursorColumn::integer("id"), CursorColumn::text("name")];

        fn field(&self, column: &str) -> Option<Value> {
            match column {
                "id" => Some(Value::Integer(self.id)),
                "name" => Some(Value::Text(self.name.clone())),
                _ => None,
            }
        }
    }

    fn repos(ids: impl IntoIterator<Item = i64>) -> Vec<Repo> {
        ids.into_iter()
            .map(|id| Repo {
                id,
                name: format!("repo-{id:02}"),
            })
            .collect()
    }

    fn ids(page: &[Repo]) -> Vec<i64> {
        page.iter().map(|r| r.id).collect()
    }

    fn iterator(rows: Vec<Repo>) -> KeysetIterator<MemorySource<Repo>> {
        KeysetIterator::builder()
            .source(Arc::new(MemorySource::new(rows)))
            .from_start()
            .unwrap()
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_pages_of_two() {
        let it = iterator(repos(1..=5));
        let ctx = Context::background();

        assert_eq!(ids(&it.next(&ctx, 2).await.unwrap()), vec![1, 2]);
        assert_eq!(it.cursor().await.value(), "2");
        assert_eq!(ids(&it.next(&ctx, 2).await.unwrap()), vec![3, 4]);
        assert_eq!(it.cursor().await.value(), "4");
        assert_eq!(ids(&it.next(&ctx, 2).await.unwrap()), vec![5]);
        assert_eq!(it.cursor().await.value(), "5");
        assert!(it.next(&ctx, 2).await.unwrap().is_empty());
        assert_eq!(it.cursor().await.value(), "5");
        assert!(it.next(&ctx, 2).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_zero_is_noop() {
        let it = iterator(repos(1..=3));
        let ctx = Context::background();
        it.next(&ctx, 1).await.unwrap();
        let before = it.cursor().await;

        assert!(it.next(&ctx, 0).await.unwrap().is_empty());
        assert_eq!(it.cursor().await, before);
    }

    #[tokio::test]
    async fn test_name_column_uses_literal_value() {
        let source = Arc::new(MemorySource::new(repos([3, 1, 2])));
        let it = KeysetIterator::builder()
            .source(source)
            .cursor(Cursor::new::<Repo>("name", "", "next").unwrap())
            .build()
            .unwrap();
        let ctx = Context::background();

        let page = it.next(&ctx, 2).await.unwrap();
        assert_eq!(ids(&page), vec![1, 2]);
        assert_eq!(it.cursor().await.value(), "repo-02");
    }

    #[tokio::test]
    async fn test_prev_walks_backwards() {
        let source = Arc::new(MemorySource::new(repos(1..=5)));
        let it = KeysetIterator::builder()
            .source(source)
            .cursor(Cursor::new::<Repo>("id", "4", "prev").unwrap())
            .build()
            .unwrap();
        let ctx = Context::background();

        assert_eq!(ids(&it.next(&ctx, 2).await.unwrap()), vec![3, 2]);
        assert_eq!(ids(&it.next(&ctx, 2).await.unwrap()), vec![1]);
        assert!(it.next(&ctx, 2).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_filter_applies_to_every_page() {
        let source = Arc::new(MemorySource::new(repos(1..=6)));
        let it = KeysetIterator::builder()
            .source(source)
            .from_start()
            .unwrap()
            .filter(PredicateSet::new().with(Predicate::compare(
                "id",
                crate::predicate::CompareOp::Ge,
                3i64,
            )))
            .build()
            .unwrap();
        let ctx = Context::background();

        assert_eq!(ids(&it.next(&ctx, 3).await.unwrap()), vec![3, 4, 5]);
        assert_eq!(ids(&it.next(&ctx, 3).await.unwrap()), vec![6]);
        assert_eq!(it.count(&ctx).await.unwrap(), 4);
    }

    #[tokio::test]
    async fn test_pages_stream() {
        let it = iterator(repos(1..=7));
        let ctx = Context::background();
        let pages: Vec<Vec<Repo>> = it.pages(&ctx, 3).try_collect().await.unwrap();
        let sizes: Vec<usize> = pages.iter().map(Vec::len).collect();
        assert_eq!(sizes, vec![3, 3, 1]);
    }

    #[test]
    fn test_builder_requires_source_and_cursor() {
        let missing_source = KeysetIterator::<MemorySource<Repo>>::builder()
            .cursor(Cursor::start::<Repo>().unwrap())
            .build();
        assert!(matches!(missing_source, Err(Error::MissingRecordSource)));

        let missing_cursor = KeysetIterator::builder()
            .source(Arc::new(MemorySource::new(repos(1..=2))))
            .build();
        assert!(matches!(missing_cursor, Err(Error::MissingCursor)));
    }
}
