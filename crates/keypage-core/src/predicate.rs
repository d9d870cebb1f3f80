//! Predicates and the predicate builder.
//!
//! A [`PredicateSet`] is an ordered conjunction that always starts with
//! [`Predicate::True`], so it renders to a valid `WHERE` clause even when no
//! filter is set.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::record::Record;
use crate::value::Value;

/// Comparison operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CompareOp {
    Eq,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CompareOp {
    /// SQL spelling of the operator.
    pub fn as_sql(&self) -> &'static str {
        match self {
            CompareOp::Eq => "=",
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
            CompareOp::Gt => ">",
            CompareOp::Ge => ">=",
        }
    }

    fn holds(&self, ord: std::cmp::Ordering) -> bool {
        match self {
            CompareOp::Eq => ord.is_eq(),
            CompareOp::Lt => ord.is_lt(),
            CompareOp::Le => ord.is_le(),
            CompareOp::Gt => ord.is_gt(),
            CompareOp::Ge => ord.is_ge(),
        }
    }
}

/// A single boolean condition over a row.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Predicate {
    /// Always true.
    True,
    /// Column is NULL.
    IsNull(String),
    /// Column is not NULL.
    IsNotNull(String),
    /// Column compared against a value.
    Compare {
        column: String,
        op: CompareOp,
        value: Value,
    },
}

impl Predicate {
    /// Build a comparison predicate.
    pub fn compare(column: impl Into<String>, op: CompareOp, value: impl Into<Value>) -> Self {
        Predicate::Compare {
            column: column.into(),
            op,
            value: value.into(),
        }
    }

    /// `column = value`.
    pub fn equals(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(column, CompareOp::Eq, value)
    }

    /// `column IS NULL`.
    pub fn is_null(column: impl Into<String>) -> Self {
        Predicate::IsNull(column.into())
    }

    /// `column IS NOT NULL`.
    pub fn is_not_null(column: impl Into<String>) -> Self {
        Predicate::IsNotNull(column.into())
    }

    /// Render as a parameterised SQL fragment, appending bind values.
    pub fn render(&self, params: &mut Vec<Value>) -> String {
        match self {
            Predicate::True => "TRUE".to_string(),
            Predicate::IsNull(column) => format!("{} IS NULL", column),
            Predicate::IsNotNull(column) => format!("{} IS NOT NULL", column),
            Predicate::Compare { column, op, value } => {
                params.push(value.clone());
                format!("{} {} ?", column, op.as_sql())
            }
        }
    }

    /// Evaluate against a record.
    ///
    /// Comparisons involving NULL or mismatched kinds are false.
    pub fn matches<R: Record>(&self, record: &R) -> bool {
        match self {
            Predicate::True => true,
            Predicate::IsNull(column) => {
                matches!(record.field(column), None | Some(Value::Null))
            }
            Predicate::IsNotNull(column) => {
                !matches!(record.field(column), None | Some(Value::Null))
            }
            Predicate::Compare { column, op, value } => record
                .field(column)
                .and_then(|field| field.compare(value))
                .map(|ord| op.holds(ord))
                .unwrap_or(false),
        }
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Predicate::True => f.write_str("TRUE"),
            Predicate::IsNull(column) => write!(f, "{} IS NULL", column),
            Predicate::IsNotNull(column) => write!(f, "{} IS NOT NULL", column),
            Predicate::Compare { column, op, value } => {
                write!(f, "{} {} {}", column, op.as_sql(), value)
            }
        }
    }
}

/// Ordered conjunction of predicates, never empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PredicateSet {
    predicates: Vec<Predicate>,
}

impl PredicateSet {
    /// A set containing only `TRUE`.
    pub fn new() -> Self {
        Self {
            predicates: vec![Predicate::True],
        }
    }

    /// Append a predicate.
    pub fn push(&mut self, predicate: Predicate) {
        self.predicates.push(predicate);
    }

    /// Append a predicate, builder style.
    pub fn with(mut self, predicate: Predicate) -> Self {
        self.push(predicate);
        self
    }

    /// Append a predicate when `predicate` is `Some`.
    pub fn with_optional(mut self, predicate: Option<Predicate>) -> Self {
        if let Some(predicate) = predicate {
            self.push(predicate);
        }
        self
    }

    /// Predicates in order.
    pub fn as_slice(&self) -> &[Predicate] {
        &self.predicates
    }

    /// Number of predicates, including the leading `TRUE`.
    pub fn len(&self) -> usize {
        self.predicates.len()
    }

    /// Never true: the set always holds `TRUE`.
    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty()
    }

    /// Render as a parameterised `AND` conjunction.
    pub fn render(&self, params: &mut Vec<Value>) -> String {
        self.predicates
            .iter()
            .map(|p| p.render(params))
            .collect::<Vec<_>>()
            .join(" AND ")
    }

    /// Check if a record satisfies every predicate.
    pub fn matches<R: Record>(&self, record: &R) -> bool {
        self.predicates.iter().all(|p| p.matches(record))
    }

    /// Display form of each predicate.
    pub fn to_strings(&self) -> Vec<String> {
        self.predicates.iter().map(|p| p.to_string()).collect()
    }
}

impl Default for PredicateSet {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PredicateSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_strings().join(" AND "))
    }
}

/// Three-way filter on a nullable foreign key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ForeignKeyFilter {
    /// No restriction.
    #[default]
    Any,
    /// The key must be NULL.
    Absent,
    /// The key must equal the given id.
    Equals(i64),
}

impl ForeignKeyFilter {
    /// Predicate for `column`, or `None` when unrestricted.
    pub fn predicate(&self, column: &str) -> Option<Predicate> {
        match self {
            ForeignKeyFilter::Any => None,
            ForeignKeyFilter::Absent => Some(Predicate::is_null(column)),
            ForeignKeyFilter::Equals(id) => Some(Predicate::equals(column, *id)),
        }
    }
}

/// `None` ignores the key, `Some(0)` requires NULL, `Some(id)` requires equality.
impl From<Option<i64>> for ForeignKeyFilter {
    fn from(id: Option<i64>) -> Self {
        match id {
            None => ForeignKeyFilter::Any,
            Some(0) => ForeignKeyFilter::Absent,
            Some(id) => ForeignKeyFilter::Equals(id),
        }
    }
}
