//! Caching decorator for keyset iterators.
//!
//! [`CachingIterator`] remembers every record it has returned, in fetch
//! order. The buffer is never evicted and lives as long as the decorator;
//! it is meant for small result sets that are replayed or inspected after
//! paging, not as a general-purpose cache.

use tokio::sync::Mutex;

use crate::context::Context;
use crate::cursor::Cursor;
use crate::error::Result;
use crate::iterator::KeysetIterator;
use crate::query::{Filter, NoFilter};
use crate::source::RecordSource;

/// Keyset iterator that accumulates every fetched page.
pub struct CachingIterator<S: RecordSource, F = NoFilter> {
    inner: KeysetIterator<S, F>,
    buffer: Mutex<Vec<S::Record>>,
}

impl<S, F> CachingIterator<S, F>
where
    S: RecordSource,
    S::Record: Clone,
    F: Filter,
{
    /// Wrap an iterator.
    pub fn new(inner: KeysetIterator<S, F>) -> Self {
        Self {
            inner,
            buffer: Mutex::new(Vec::new()),
        }
    }

    /// Fetch the next page and append it to the buffer.
    ///
    /// Returns only the newly fetched records.
    pub async fn next(&self, ctx: &Context, n: usize) -> Result<Vec<S::Record>> {
        // Held across the fetch so the buffer order matches fetch order.
        let mut buffer = self.buffer.lock().await;
        let page = self.inner.next(ctx, n).await?;
        buffer.extend(page.iter().cloned());
        Ok(page)
    }

    /// Every record returned so far.
    pub async fn cached(&self) -> Vec<S::Record> {
        self.buffer.lock().await.clone()
    }

    /// Number of records returned so far.
    pub async fn cached_len(&self) -> usize {
        self.buffer.lock().await.len()
    }

    /// Snapshot of the wrapped iterator's cursor.
    pub async fn cursor(&self) -> Cursor {
        self.inner.cursor().await
    }

    /// The wrapped iterator.
    pub fn inner(&self) -> &KeysetIterator<S, F> {
        &self.inner
    }

    /// Consume the decorator, returning the buffer.
    pub fn into_cached(self) -> Vec<S::Record> {
        self.buffer.into_inner()
    }
}

impl<S, F> From<KeysetIterator<S, F>> for CachingIterator<S, F>
where
    S: RecordSource,
    S::Record: Clone,
    F: Filter,
{
    fn from(inner: KeysetIterator<S, F>) -> Self {
        Self::new(inner)
    }
}
