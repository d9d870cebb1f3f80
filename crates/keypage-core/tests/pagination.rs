//! Integration tests for keyset iteration over record sources.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use keypage_core::{
    CachingIterator, CancelHandle, Context, Cursor, CursorColumn, Error, KeysetIterator, MemorySource,
    PageQuery, Record, RecordSource, Result, Value, Visit,
};
use tokio::sync::Notify;

#[derive(Debug, Clone, PartialEq)]
struct RepoName {
    id: i64,
    name: String,
}

impl RepoName {
    fn new(id: i64) -> Self {
        Self {
            id,
            name: format!("github.com/org/repo-{id:04}"),
        }
    }
}

impl Record for RepoName {
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

fn memory_source(count: i64) -> Arc<MemorySource<RepoName>> {
    // Inserted out of order; the source sorts.
    let mut rows: Vec<RepoName> = (1..=count).map(RepoName::new).collect();
    rows.reverse();
    Arc::new(MemorySource::new(rows))
}

fn iterator_over<S>(source: Arc<S>) -> KeysetIterator<S>
where
    S: RecordSource<Record = RepoName>,
{
    KeysetIterator::builder()
        .source(source)
        .from_start()
        .unwrap()
        .build()
        .unwrap()
}

/// Source that fails while `failing` is set.
struct FlakySource {
    inner: MemorySource<RepoName>,
    failing: AtomicBool,
    calls: AtomicUsize,
}

impl FlakySource {
    fn new(count: i64) -> Self {
        Self {
            inner: MemorySource::new((1..=count).map(RepoName::new).collect()),
            failing: AtomicBool::new(false),
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl RecordSource for FlakySource {
    type Record = RepoName;

    async fn stream_records(
        &self,
        query: &PageQuery,
        visit: &mut Visit<'_, RepoName>,
    ) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let failing = self.failing.load(Ordering::SeqCst);
        let mut seen = 0;
        self.inner
            .stream_records(query, &mut |record| {
                // Fail part way through the page.
                if failing && seen == 1 {
                    return Err(Error::source_failure(std::io::Error::new(
                        std::io::ErrorKind::BrokenPipe,
                        "connection lost",
                    )));
                }
                seen += 1;
                visit(record)
            })
            .await
    }

    async fn count_records(&self, query: &PageQuery) -> Result<u64> {
        self.inner.count_records(query).await
    }
}

/// Source that blocks until released.
struct GatedSource {
    inner: MemorySource<RepoName>,
    gate: Notify,
}

#[async_trait]
impl RecordSource for GatedSource {
    type Record = RepoName;

    async fn stream_records(
        &self,
        query: &PageQuery,
        visit: &mut Visit<'_, RepoName>,
    ) -> Result<()> {
        self.gate.notified().await;
        self.inner.stream_records(query, visit).await
    }

    async fn count_records(&self, query: &PageQuery) -> Result<u64> {
        self.inner.count_records(query).await
    }
}

/// Source that fires a cancel handle from inside a fetch that never yields.
struct CancellingSource {
    inner: MemorySource<RepoName>,
    handle: CancelHandle,
}

#[async_trait]
impl RecordSource for CancellingSource {
    type Record = RepoName;

    async fn stream_records(
        &self,
        query: &PageQuery,
        visit: &mut Visit<'_, RepoName>,
    ) -> Result<()> {
        self.handle.cancel();
        self.inner.stream_records(query, visit).await
    }

    async fn count_records(&self, query: &PageQuery) -> Result<u64> {
        self.inner.count_records(query).await
    }
}

#[tokio::test]
async fn test_drains_full_set_for_any_page_size() {
    let ctx = Context::background();
    for count in [0i64, 1, 2, 5, 17] {
        for n in [1usize, 2, 3, 7, 20] {
            let it = iterator_over(memory_source(count));
            let mut ids = Vec::new();
            loop {
                let page = it.next(&ctx, n).await.unwrap();
                if page.is_empty() {
                    break;
                }
                assert!(page.len() <= n);
                ids.extend(page.iter().map(|r| r.id));
            }
            let expected: Vec<i64> = (1..=count).collect();
            assert_eq!(ids, expected, "count={count} n={n}");
        }
    }
}

#[tokio::test]
async fn test_concrete_scenario_ids_one_to_five() {
    let ctx = Context::background();
    let it = iterator_over(memory_source(5));

    let steps: [(&[i64], &str); 4] = [(&[1, 2], "2"), (&[3, 4], "4"), (&[5], "5"), (&[], "5")];
    for (expected, cursor) in steps {
        let page = it.next(&ctx, 2).await.unwrap();
        let ids: Vec<i64> = page.iter().map(|r| r.id).collect();
        assert_eq!(ids, expected);
        assert_eq!(it.cursor().await.value(), cursor);
    }
}

#[tokio::test]
async fn test_zero_page_leaves_state_untouched() {
    let ctx = Context::background();
    let source = Arc::new(FlakySource::new(3));
    let it = iterator_over(source.clone());

    it.next(&ctx, 2).await.unwrap();
    let before = it.cursor().await;
    let calls = source.calls.load(Ordering::SeqCst);

    assert!(it.next(&ctx, 0).await.unwrap().is_empty());
    assert_eq!(it.cursor().await, before);
    assert_eq!(source.calls.load(Ordering::SeqCst), calls);
}

#[tokio::test]
async fn test_failure_keeps_cursor_and_retry_resumes() {
    let ctx = Context::background();
    let source = Arc::new(FlakySource::new(6));
    let it = iterator_over(source.clone());

    let first = it.next(&ctx, 2).await.unwrap();
    assert_eq!(first.iter().map(|r| r.id).collect::<Vec<_>>(), vec![1, 2]);
    let before = it.cursor().await;

    source.failing.store(true, Ordering::SeqCst);
    let err = it.next(&ctx, 3).await.unwrap_err();
    assert!(matches!(err, Error::RecordSource(_)));
    assert_eq!(err.to_string(), "connection lost");
    assert!(err.is_resumable());
    assert_eq!(it.cursor().await, before);

    source.failing.store(false, Ordering::SeqCst);
    let retried = it.next(&ctx, 3).await.unwrap();
    assert_eq!(retried.iter().map(|r| r.id).collect::<Vec<_>>(), vec![3, 4, 5]);
    assert_eq!(it.cursor().await.value(), "5");
}

#[tokio::test]
async fn test_cancellation_keeps_cursor() {
    let source = Arc::new(GatedSource {
        inner: MemorySource::new((1..=4).map(RepoName::new).collect()),
        gate: Notify::new(),
    });
    let it = Arc::new(iterator_over(source.clone()));
    let (ctx, handle) = Context::with_cancel();

    let pending = tokio::spawn({
        let it = it.clone();
        let ctx = ctx.clone();
        async move { it.next(&ctx, 2).await }
    });

    tokio::time::sleep(Duration::from_millis(20)).await;
    handle.cancel();
    let result = tokio::time::timeout(Duration::from_secs(1), pending)
        .await
        .expect("cancelled fetch should return")
        .unwrap();
    assert!(matches!(result, Err(Error::Cancelled)));
    assert!(it.cursor().await.is_start());

    // A fresh context resumes from the same place.
    source.gate.notify_one();
    let page = it.next(&Context::background(), 2).await.unwrap();
    assert_eq!(page.iter().map(|r| r.id).collect::<Vec<_>>(), vec![1, 2]);
}

#[tokio::test]
async fn test_cancellation_inside_blocking_fetch_keeps_cursor() {
    let (ctx, handle) = Context::with_cancel();
    let source = Arc::new(CancellingSource {
        inner: MemorySource::new((1..=4).map(RepoName::new).collect()),
        handle,
    });
    let it = iterator_over(source);

    let result = it.next(&ctx, 2).await;
    assert!(matches!(result, Err(Error::Cancelled)));
    assert!(it.cursor().await.is_start());

    let page = it.next(&Context::background(), 2).await.unwrap();
    assert_eq!(page.iter().map(|r| r.id).collect::<Vec<_>>(), vec![1, 2]);
}

#[tokio::test]
async fn test_concurrent_callers_see_disjoint_pages() {
    let it = Arc::new(iterator_over(memory_source(100)));
    let ctx = Context::background();

    let mut tasks = Vec::new();
    for _ in 0..8 {
        let it = it.clone();
        let ctx = ctx.clone();
        tasks.push(tokio::spawn(async move {
            let mut seen = Vec::new();
            loop {
                let page = it.next(&ctx, 3).await.unwrap();
                if page.is_empty() {
                    return seen;
                }
                // Each page is internally ordered and contiguous.
                assert!(page.windows(2).all(|w| w[1].id == w[0].id + 1));
                seen.extend(page.into_iter().map(|r| r.id));
            }
        }));
    }

    let mut all = Vec::new();
    for task in tasks {
        all.extend(task.await.unwrap());
    }
    let unique: BTreeSet<i64> = all.iter().copied().collect();
    assert_eq!(all.len(), 100);
    assert_eq!(unique, (1..=100).collect::<BTreeSet<i64>>());
}

#[tokio::test]
async fn test_rows_inserted_behind_cursor_are_not_revisited() {
    let ctx = Context::background();
    let source = memory_source(4);
    let it = iterator_over(source.clone());

    assert_eq!(it.next(&ctx, 2).await.unwrap().len(), 2);
    source.remove_where(|r| r.id == 1);
    source.insert(RepoName::new(10));

    let rest: Vec<i64> = it
        .next(&ctx, 10)
        .await
        .unwrap()
        .iter()
        .map(|r| r.id)
        .collect();
    assert_eq!(rest, vec![3, 4, 10]);
}

#[tokio::test]
async fn test_caching_buffer_tracks_every_page() {
    let ctx = Context::background();
    let it = CachingIterator::new(iterator_over(memory_source(6)));

    let mut pages = Vec::new();
    for n in [0usize, 4, 0, 4, 4] {
        pages.push(it.next(&ctx, n).await.unwrap());
    }

    let sizes: Vec<usize> = pages.iter().map(Vec::len).collect();
    assert_eq!(sizes, vec![0, 4, 0, 2, 0]);
    let concatenated: Vec<RepoName> = pages.into_iter().flatten().collect();
    assert_eq!(it.cached().await, concatenated);
}

#[tokio::test]
async fn test_count_ignores_cursor() {
    let ctx = Context::background();
    let it = iterator_over(memory_source(9));
    it.next(&ctx, 4).await.unwrap();
    assert_eq!(it.count(&ctx).await.unwrap(), 9);
}

#[test]
fn test_builder_rejects_foreign_cursor_column() {
    struct Other;
    impl Record for Other {
        const CURSOR_COLUMNS: &'static [CursorColumn] = &[CursorColumn::text("slug")];
        fn field(&self, _column: &str) -> Option<Value> {
            None
        }
    }

    let cursor = Cursor::start::<Other>().unwrap();
    let result = KeysetIterator::builder()
        .source(memory_source(1))
        .cursor(cursor)
        .build();
    assert!(matches!(result, Err(Error::InvalidCursorColumn { column }) if column == "slug"));
}
