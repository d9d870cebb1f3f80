//! Keyset cursors.
//!
//! A [`Cursor`] marks where the next page resumes: the column the result set
//! is ordered by, the last value seen in that column, and the direction of
//! travel. Cursors are validated against the entity's allow-list when they
//! are built and are only advanced by the iterator that owns them.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::predicate::{CompareOp, Predicate};
use crate::query::{OrderBy, SortDirection};
use crate::record::Record;

/// Direction of travel through an ordered result set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Towards larger keys.
    #[default]
    Next,
    /// Towards smaller keys.
    Prev,
}

impl Direction {
    /// Wire name of the direction.
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Next => "next",
            Direction::Prev => "prev",
        }
    }

    fn sort_direction(self) -> SortDirection {
        match self {
            Direction::Next => SortDirection::Asc,
            Direction::Prev => SortDirection::Desc,
        }
    }

    fn bound_op(self) -> CompareOp {
        match self {
            Direction::Next => CompareOp::Gt,
            Direction::Prev => CompareOp::Lt,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Direction {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "next" => Ok(Direction::Next),
            "prev" => Ok(Direction::Prev),
            other => Err(Error::InvalidCursorDirection {
                direction: other.to_string(),
            }),
        }
    }
}

/// A position marker for keyset pagination.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Cursor {
    column: String,
    value: String,
    direction: Direction,
}

impl Cursor {
    /// Build a cursor for entity `R`.
    ///
    /// An empty `column` selects the entity's default column and an empty
    /// `direction` selects `next`. Anything else must be in the allow-list.
    pub fn new<R: Record>(
        column: &str,
        value: impl Into<String>,
        direction: &str,
    ) -> Result<Self> {
        let column = if column.is_empty() {
            R::CURSOR_COLUMNS
                .first()
                .ok_or_else(|| Error::InvalidCursorColumn {
                    column: String::new(),
                })?
        } else {
            R::cursor_column(column).ok_or_else(|| Error::InvalidCursorColumn {
                column: column.to_string(),
            })?
        };

        let direction = if direction.is_empty() {
            Direction::default()
        } else {
            direction.parse()?
        };

        Ok(Self {
            column: column.name.to_string(),
            value: value.into(),
            direction,
        })
    }

    /// Start-of-sequence cursor on the default column, moving forward.
    pub fn start<R: Record>() -> Result<Self> {
        Self::new::<R>("", "", "")
    }

    /// Column the result set is ordered by.
    pub fn column(&self) -> &str {
        &self.column
    }

    /// Last value seen, or empty at the start of the sequence.
    pub fn value(&self) -> &str {
        &self.value
    }

    /// Direction of travel.
    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Check if the cursor is at the start of its sequence.
    pub fn is_start(&self) -> bool {
        self.value.is_empty()
    }

    /// Predicate restricting rows to those after the cursor, if any.
    pub fn bound<R: Record>(&self) -> Result<Option<Predicate>> {
        if self.value.is_empty() {
            return Ok(None);
        }
        let column = R::cursor_column(&self.column).ok_or_else(|| Error::InvalidCursorColumn {
            column: self.column.clone(),
        })?;
        let value = column.parse_value(&self.value)?;
        Ok(Some(Predicate::compare(
            column.name,
            self.direction.bound_op(),
            value,
        )))
    }

    /// Ordering implied by the cursor.
    pub fn order(&self) -> OrderBy {
        OrderBy::new(self.column.clone(), self.direction.sort_direction())
    }

    pub(crate) fn advance(&mut self, value: String) {
        self.value = value;
    }
}

impl fmt::Display for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.column, self.direction, self.value)
    }
}
