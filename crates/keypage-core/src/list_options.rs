//! Webhook log listing options and over-fetch pagination.
//!
//! Webhook logs are paged newest first by id. Rather than an arbitrary-column
//! keyset cursor, the cursor is the id of the first row of the next page,
//! and the listing asks for one row more than the limit to find it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::predicate::{CompareOp, ForeignKeyFilter, Predicate, PredicateSet};
use crate::query::{Filter, OrderBy, PageQuery, MAX_LIMIT};

/// Column holding the matched external service.
pub const EXTERNAL_SERVICE_ID_COLUMN: &str = "external_service_id";

/// Filters and paging for a webhook log listing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookLogListOptions {
    /// Maximum number of logs to return. Zero means no limit.
    pub limit: usize,
    /// Id of the newest log to return. Zero means start from the newest.
    pub cursor: i64,
    /// Restrict by matched external service.
    pub external_service_id: ForeignKeyFilter,
    /// Only logs that recorded an error.
    pub only_errors: bool,
    /// Inclusive lower bound on receipt time.
    pub since: Option<DateTime<Utc>>,
    /// Inclusive upper bound on receipt time.
    pub until: Option<DateTime<Utc>>,
}

impl WebhookLogListOptions {
    /// Options matching every log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the page size.
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    /// Set the cursor.
    pub fn with_cursor(mut self, cursor: i64) -> Self {
        self.cursor = cursor;
        self
    }

    /// Set the external service filter.
    pub fn with_external_service(mut self, filter: impl Into<ForeignKeyFilter>) -> Self {
        self.external_service_id = filter.into();
        self
    }

    /// Only return logs with errors.
    pub fn only_errors(mut self) -> Self {
        self.only_errors = true;
        self
    }

    /// Set the receipt time window.
    pub fn between(mut self, since: Option<DateTime<Utc>>, until: Option<DateTime<Utc>>) -> Self {
        self.since = since;
        self.until = until;
        self
    }

    /// Query for one page: filters, cursor bound, `id DESC`, and `limit + 1` rows.
    pub fn page_query(&self) -> PageQuery {
        let mut predicates = self.predicates();
        if self.cursor != 0 {
            predicates.push(Predicate::compare("id", CompareOp::Le, self.cursor));
        }

        let query = PageQuery::new(predicates).with_order(OrderBy::desc("id"));
        if self.limit != 0 {
            query.with_limit(over_fetch_limit(self.limit))
        } else {
            query
        }
    }
}

/// Rows requested for a page of `limit`: one extra, within [`MAX_LIMIT`].
fn over_fetch_limit(limit: usize) -> usize {
    limit.min(MAX_LIMIT - 1) + 1
}

impl Filter for WebhookLogListOptions {
    fn predicates(&self) -> PredicateSet {
        PredicateSet::new()
            .with_optional(self.external_service_id.predicate(EXTERNAL_SERVICE_ID_COLUMN))
            .with_optional(self.only_errors.then(|| Predicate::is_not_null("error")))
            .with_optional(
                self.since
                    .map(|since| Predicate::compare("received_at", CompareOp::Ge, since)),
            )
            .with_optional(
                self.until
                    .map(|until| Predicate::compare("received_at", CompareOp::Le, until)),
            )
    }
}

/// One page of an over-fetched listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverFetchPage<T> {
    /// Rows on this page.
    pub items: Vec<T>,
    /// Cursor for the next page, if one exists.
    pub next_cursor: Option<i64>,
}

impl<T> OverFetchPage<T> {
    /// Split rows fetched with `limit + 1`.
    ///
    /// When the sentinel row is present it is dropped and its id becomes the
    /// next cursor. A zero limit means the listing was unbounded.
    pub fn split(mut rows: Vec<T>, limit: usize, id_of: impl Fn(&T) -> i64) -> Self {
        let next_cursor = if limit != 0 && rows.len() == over_fetch_limit(limit) {
            rows.pop().map(|sentinel| id_of(&sentinel))
        } else {
            None
        };

        Self {
            items: rows,
            next_cursor,
        }
    }

    /// Check if another page exists.
    pub fn has_next_page(&self) -> bool {
        self.next_cursor.is_some()
    }
}
