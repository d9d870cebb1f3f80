//! Bounded query descriptions handed to record sources.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::predicate::PredicateSet;
use crate::value::Value;

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SortDirection {
    /// Ascending order.
    Asc,
    /// Descending order.
    Desc,
}

impl SortDirection {
    /// SQL keyword.
    pub fn as_sql(&self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

/// Order specification for a page.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrderBy {
    /// Column to order by.
    pub column: String,
    /// Sort direction.
    pub direction: SortDirection,
}

impl OrderBy {
    /// Create an order specification.
    pub fn new(column: impl Into<String>, direction: SortDirection) -> Self {
        Self {
            column: column.into(),
            direction,
        }
    }

    /// Ascending on `column`.
    pub fn asc(column: impl Into<String>) -> Self {
        Self::new(column, SortDirection::Asc)
    }

    /// Descending on `column`.
    pub fn desc(column: impl Into<String>) -> Self {
        Self::new(column, SortDirection::Desc)
    }
}

impl fmt::Display for OrderBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.column, self.direction.as_sql())
    }
}

/// Largest row limit a query renders. SQLite limits are signed 64-bit.
pub const MAX_LIMIT: usize = if usize::BITS >= 64 {
    i64::MAX as usize
} else {
    usize::MAX
};

/// A bounded query description.
///
/// Record sources translate this into whatever their backend speaks. The SQL
/// helpers below cover the relational case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageQuery {
    /// Conjunction of row conditions.
    pub predicates: PredicateSet,
    /// Result ordering, if any.
    pub order: Option<OrderBy>,
    /// Maximum number of rows, if any.
    pub limit: Option<usize>,
}

impl PageQuery {
    /// Create an unordered, unlimited query.
    pub fn new(predicates: PredicateSet) -> Self {
        Self {
            predicates,
            order: None,
            limit: None,
        }
    }

    /// Set the ordering.
    pub fn with_order(mut self, order: OrderBy) -> Self {
        self.order = Some(order);
        self
    }

    /// Set the row limit.
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// `WHERE` body with `?` placeholders and the values to bind.
    pub fn where_clause(&self) -> (String, Vec<Value>) {
        let mut params = Vec::new();
        let sql = self.predicates.render(&mut params);
        (sql, params)
    }

    /// `ORDER BY ...`, or empty.
    pub fn order_clause(&self) -> String {
        match &self.order {
            Some(order) => format!("ORDER BY {}", order),
            None => String::new(),
        }
    }

    /// `LIMIT n`, or empty. Limits above [`MAX_LIMIT`] are clamped.
    pub fn limit_clause(&self) -> String {
        match self.limit {
            Some(limit) => format!("LIMIT {}", limit.min(MAX_LIMIT)),
            None => String::new(),
        }
    }

    /// The same query without ordering or limit, as used for counting.
    pub fn unbounded(&self) -> Self {
        Self::new(self.predicates.clone())
    }
}

/// Builds the predicates for a listing.
pub trait Filter: Send + Sync {
    /// Predicates in order, starting with `TRUE`.
    fn predicates(&self) -> PredicateSet;
}

/// Filter that matches every row.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoFilter;

impl Filter for NoFilter {
    fn predicates(&self) -> PredicateSet {
        PredicateSet::new()
    }
}

impl Filter for PredicateSet {
    fn predicates(&self) -> PredicateSet {
        self.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::predicate::Predicate;

    #[test]
    fn test_huge_limit_is_clamped() {
        let query = PageQuery::new(PredicateSet::new()).with_limit(usize::MAX);
        assert_eq!(query.limit_clause(), format!("LIMIT {}", MAX_LIMIT));
    }

    #[test]
    fn test_sql_clauses() {
        let query = PageQuery::new(PredicateSet::new().with(Predicate::equals("name", "a")))
            .with_order(OrderBy::desc("id"))
            .with_limit(11);

        let (where_sql, params) = query.where_clause();
        assert_eq!(where_sql, "TRUE AND name = ?");
        assert_eq!(params, vec![Value::Text("a".into())]);
        assert_eq!(query.order_clause(), "ORDER BY id DESC");
        assert_eq!(query.limit_clause(), "LIMIT 11");
    }

    #[test]
    fn test_unbounded_drops_order_and_limit() {
        let query = PageQuery::new(PredicateSet::new())
            .with_order(OrderBy::asc("id"))
            .with_limit(5)
            .unbounded();
        assert_eq!(query.order_clause(), "");
        assert_eq!(query.limit_clause(), "");
    }

    #[test]
    fn test_no_filter() {
        assert_eq!(NoFilter.predicates().to_strings(), vec!["TRUE"]);
    }
}
