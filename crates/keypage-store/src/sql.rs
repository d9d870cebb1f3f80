//! Translation of page queries into SQLite statements.

use chrono::{DateTime, Utc};
use keypage_core::{format_timestamp, PageQuery, Value};
use rusqlite::types::Value as SqlValue;

use crate::error::{Result, StoreError};

/// Convert a predicate value into a SQLite bind parameter.
///
/// Timestamps are stored as canonical RFC 3339 text, so they bind as text.
pub fn to_sql(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Integer(v) => SqlValue::Integer(*v),
        Value::Text(s) => SqlValue::Text(s.clone()),
        Value::Timestamp(ts) => SqlValue::Text(format_timestamp(ts)),
    }
}

/// A rendered statement and its bind parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<SqlValue>,
}

/// `SELECT columns FROM table WHERE ... ORDER BY ... LIMIT ...`
pub fn select(table: &str, columns: &str, query: &PageQuery) -> Statement {
    let (conditions, values) = query.where_clause();
    let mut sql = format!("SELECT {} FROM {} WHERE {}", columns, table, conditions);
    for clause in [query.order_clause(), query.limit_clause()] {
        if !clause.is_empty() {
            sql.push(' ');
            sql.push_str(&clause);
        }
    }

    Statement {
        sql,
        params: values.iter().map(to_sql).collect(),
    }
}

/// `SELECT COUNT(*) FROM table WHERE ...`, ignoring order and limit.
pub fn count(table: &str, query: &PageQuery) -> Statement {
    let (conditions, values) = query.where_clause();
    Statement {
        sql: format!("SELECT COUNT(*) FROM {} WHERE {}", table, conditions),
        params: values.iter().map(to_sql).collect(),
    }
}

/// Parse a stored timestamp.
pub fn parse_timestamp(value: String) -> Result<DateTime<Utc>> {
    match DateTime::parse_from_rfc3339(&value) {
        Ok(ts) => Ok(ts.with_timezone(&Utc)),
        Err(source) => Err(StoreError::InvalidTimestamp { value, source }),
    }
}
