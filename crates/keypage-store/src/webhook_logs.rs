//! Webhook log storage.
//!
//! Every incoming webhook is stored with its headers, body, the external
//! service it was matched to (if any), and the error it produced (if any).
//! Listings page newest first using an over-fetch cursor; see
//! [`WebhookLogListOptions`].

use std::borrow::Cow;
use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use keypage_core::{
    format_timestamp, CursorColumn, Filter, OverFetchPage, PageQuery, Record, RecordSource,
    Value, Visit, WebhookLogListOptions,
};
use rusqlite::{params, params_from_iter, Row};
use serde::{Deserialize, Serialize};

use crate::db::SharedConnection;
use crate::error::{Result, StoreError};
use crate::sql;

const TABLE: &str = "webhook_logs";
const COLUMNS: &str = "id, received_at, external_service_id, request, error";

/// The captured HTTP request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookLogRequest {
    /// Header name to every value received for it.
    pub headers: BTreeMap<String, Vec<String>>,
    /// Raw request body.
    pub body: Vec<u8>,
}

impl WebhookLogRequest {
    /// Request with the given body and no headers.
    pub fn new(body: impl Into<Vec<u8>>) -> Self {
        Self {
            headers: BTreeMap::new(),
            body: body.into(),
        }
    }

    /// Add a header value.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.entry(name.into()).or_default().push(value.into());
        self
    }

    /// Body as text, replacing invalid UTF-8.
    pub fn body_text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }
}

/// A stored webhook log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookLog {
    pub id: i64,
    pub received_at: DateTime<Utc>,
    pub external_service_id: Option<i64>,
    pub request: WebhookLogRequest,
    pub error: Option<String>,
}

impl Record for WebhookLog {
    const CURSOR_COLUMNS: &'static [CursorColumn] = &[CursorColumn::integer("id")];

    fn field(&self, column: &str) -> Option<Value> {
        match column {
            "id" => Some(Value::Integer(self.id)),
            "received_at" => Some(Value::Timestamp(self.received_at)),
            "external_service_id" => Some(self.external_service_id.into()),
            "error" => Some(self.error.clone().into()),
            _ => None,
        }
    }
}

/// A webhook log to be written. Id and receipt time are assigned on insert.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewWebhookLog {
    pub external_service_id: Option<i64>,
    pub request: WebhookLogRequest,
    pub error: Option<String>,
}

/// Webhook log store.
#[derive(Clone)]
pub struct WebhookLogStore {
    conn: SharedConnection,
}

impl WebhookLogStore {
    pub(crate) fn new(conn: SharedConnection) -> Self {
        Self { conn }
    }

    /// Store a log received now.
    pub fn create(&self, log: NewWebhookLog) -> Result<WebhookLog> {
        self.create_received_at(log, Utc::now())
    }

    /// Store a log with an explicit receipt time.
    pub fn create_received_at(
        &self,
        log: NewWebhookLog,
        received_at: DateTime<Utc>,
    ) -> Result<WebhookLog> {
        let request = serde_json::to_string(&log.request)?;
        // Stored at the same precision it is read back at.
        let received_at_text = format_timestamp(&received_at);
        let received_at = sql::parse_timestamp(received_at_text.clone())?;

        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO webhook_logs (received_at, external_service_id, request, error)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                received_at_text,
                log.external_service_id,
                request,
                log.error
            ],
        )?;
        let id = conn.last_insert_rowid();

        tracing::debug!(
            id,
            external_service_id = ?log.external_service_id,
            has_error = log.error.is_some(),
            "webhook log created"
        );

        Ok(WebhookLog {
            id,
            received_at,
            external_service_id: log.external_service_id,
            request: log.request,
            error: log.error,
        })
    }

    /// Fetch one log.
    pub fn get_by_id(&self, id: i64) -> Result<WebhookLog> {
        let conn = self.conn.lock();
        let mut stmt =
            conn.prepare_cached(&format!("SELECT {} FROM {} WHERE id = ?1", COLUMNS, TABLE))?;
        let mut rows = stmt.query(params![id])?;
        let log = match rows.next()? {
            Some(row) => scan(row)?,
            None => return Err(StoreError::NotFound),
        };
        Ok(log)
    }

    /// Number of logs matching the filters of `opts`. Cursor and limit are ignored.
    pub fn count(&self, opts: &WebhookLogListOptions) -> Result<u64> {
        self.count_matching(&PageQuery::new(opts.predicates()))
    }

    /// One page of logs, newest first, and the cursor of the next page.
    pub fn list(&self, opts: &WebhookLogListOptions) -> Result<OverFetchPage<WebhookLog>> {
        let mut rows = Vec::new();
        self.visit_matching(&opts.page_query(), &mut |log| {
            rows.push(log);
            Ok(())
        })?;
        Ok(OverFetchPage::split(rows, opts.limit, |log| log.id))
    }

    /// Delete logs received at or before `now - retention`. Returns the number deleted.
    ///
    /// A retention reaching past the earliest representable time deletes nothing.
    pub fn delete_stale(&self, retention: Duration) -> Result<usize> {
        let Some(threshold) = Utc::now().checked_sub_signed(retention) else {
            tracing::debug!(?retention, "retention predates every timestamp, nothing to delete");
            return Ok(0);
        };
        let deleted = self.conn.lock().execute(
            "DELETE FROM webhook_logs WHERE received_at <= ?1",
            params![format_timestamp(&threshold)],
        )?;

        tracing::info!(
            deleted,
            threshold = %format_timestamp(&threshold),
            "stale webhook logs deleted"
        );
        Ok(deleted)
    }

    fn visit_matching(&self, query: &PageQuery, visit: &mut Visit<'_, WebhookLog>) -> Result<()> {
        let stmt = sql::select(TABLE, COLUMNS, query);
        let conn = self.conn.lock();
        let mut prepared = conn.prepare_cached(&stmt.sql)?;
        let mut rows = prepared.query(params_from_iter(stmt.params.iter()))?;

        while let Some(row) = rows.next()? {
            visit(scan(row)?)?;
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

fn scan(row: &Row<'_>) -> Result<WebhookLog> {
    let request: String = row.get(3)?;
    Ok(WebhookLog {
        id: row.get(0)?,
        received_at: sql::parse_timestamp(row.get(1)?)?,
        external_service_id: row.get(2)?,
        request: serde_json::from_str(&request)?,
        error: row.get(4)?,
    })
}

#[async_trait]
impl RecordSource for WebhookLogStore {
    type Record = WebhookLog;

    async fn stream_records(
        &self,
        query: &PageQuery,
        visit: &mut Visit<'_, WebhookLog>,
    ) -> keypage_core::Result<()> {
        Ok(self.visit_matching(query, visit)?)
    }

    async fn count_records(&self, query: &PageQuery) -> keypage_core::Result<u64> {
        Ok(self.count_matching(query)?)
    }
}
