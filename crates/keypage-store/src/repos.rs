//! Repository names.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use keypage_core::{
    format_timestamp, CachingIterator, Cursor, CursorColumn, KeysetIterator, PageQuery,
    PredicateSet, Record, RecordSource, Value, Visit,
};
use rusqlite::{params, params_from_iter, OptionalExtension};
use serde::{Deserialize, Serialize};

use crate::db::SharedConnection;
use crate::error::{Result, StoreError};
use crate::sql;

const TABLE: &str = "repo";

/// A repository's id and name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoName {
    pub id: i64,
    pub name: String,
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

/// Keyset iterator over repository names.
pub type RepoNamesIterator = KeysetIterator<RepoStore>;

/// Repository name iterator that keeps every page it returns.
pub type CachedRepoNamesIterator = CachingIterator<RepoStore>;

/// Repository name store.
#[derive(Clone)]
pub struct RepoStore {
    conn: SharedConnection,
}

impl RepoStore {
    pub(crate) fn new(conn: SharedConnection) -> Self {
        Self { conn }
    }

    /// Insert a repository.
    pub fn create(&self, name: &str) -> Result<RepoName> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO repo (name, created_at) VALUES (?1, ?2)",
            params![name, format_timestamp(&Utc::now())],
        )?;
        let id = conn.last_insert_rowid();

        tracing::debug!(id, name, "repo created");
        Ok(RepoName {
            id,
            name: name.to_string(),
        })
    }

    /// Look up a repository by exact name.
    pub fn get_by_name(&self, name: &str) -> Result<RepoName> {
        self.conn
            .lock()
            .query_row(
                "SELECT id, name FROM repo WHERE name = ?1",
                params![name],
                |row| {
                    Ok(RepoName {
                        id: row.get(0)?,
                        name: row.get(1)?,
                    })
                },
            )
            .optional()?
            .ok_or(StoreError::NotFound)
    }

    /// Number of repositories.
    pub fn count(&self) -> Result<u64> {
        self.count_matching(&PageQuery::new(PredicateSet::new()))
    }

    /// Iterator positioned at `cursor`.
    pub fn iterator(&self, cursor: Cursor) -> keypage_core::Result<RepoNamesIterator> {
        KeysetIterator::builder()
            .source(Arc::new(self.clone()))
            .cursor(cursor)
            .build()
    }

    /// Caching iterator positioned at `cursor`.
    pub fn cached_iterator(&self, cursor: Cursor) -> keypage_core::Result<CachedRepoNamesIterator> {
        self.iterator(cursor).map(CachingIterator::new)
    }

    fn visit_matching(&self, query: &PageQuery, visit: &mut Visit<'_, RepoName>) -> Result<()> {
        let stmt = sql::select(TABLE, "id, name", query);
        let conn = self.conn.lock();
        let mut prepared = conn.prepare_cached(&stmt.sql)?;
        let mut rows = prepared.query(params_from_iter(stmt.params.iter()))?;

        while let Some(row) = rows.next()? {
            visit(RepoName {
                id: row.get(0)?,
                name: row.get(1)?,
            })?;
        }
        Ok(())
    }

    fn count_matching(&self, query: &PageQuery) -> Result<u64> {
        let stmt = sql::count(TABLE, query);
        let count: i64 = self.conn.lock().query_row(
            &stmt.sql,
            params_from_iter(stmt.params.iter()),
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }
}

#[async_trait]
impl RecordSource for RepoStore {
    type Record = RepoName;

    async fn stream_records(
        &self,
        query: &PageQuery,
        visit: &mut Visit<'_, RepoName>,
    ) -> keypage_core::Result<()> {
        Ok(self.visit_matching(query, visit)?)
    }

    async fn count_records(&self, query: &PageQuery) -> keypage_core::Result<u64> {
        Ok(self.count_matching(query)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use keypage_core::Context;
    use pretty_assertions::assert_eq;

    fn store_with(names: &[&str]) -> RepoStore {
        let store = Database::open_in_memory().unwrap().repos();
        for name in names {
            store.create(name).unwrap();
        }
        store
    }

    #[test]
    fn test_create_and_get_by_name() {
        let store = store_with(&["github.com/a/one"]);
        let repo = store.get_by_name("github.com/a/one").unwrap();
        assert_eq!(repo.id, 1);
        assert!(matches!(
            store.get_by_name("github.com/a/missing"),
            Err(StoreError::NotFound)
        ));
    }

    #[test]
    fn test_duplicate_name_is_rejected() {
        let store = store_with(&["github.com/a/one"]);
        assert!(matches!(
            store.create("github.com/a/one"),
            Err(StoreError::Sqlite(_))
        ));
    }

    #[tokio::test]
    async fn test_iterates_by_name_backwards() {
        let store = store_with(&["b", "d", "a", "c"]);
        let cursor = Cursor::new::<RepoName>("name", "", "prev").unwrap();
        let it = store.iterator(cursor).unwrap();
        let ctx = Context::background();

        let first: Vec<String> = it
            .next(&ctx, 3)
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.name)
            .collect();
        assert_eq!(first, vec!["d", "c", "b"]);

        let rest = it.next(&ctx, 3).await.unwrap();
        assert_eq!(rest, vec![RepoName { id: 3, name: "a".into() }]);
        assert!(it.next(&ctx, 3).await.unwrap().is_empty());
    }
}
