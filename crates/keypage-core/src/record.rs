//! Entity contract for paginated records.

use crate::error::{Error, Result};
use crate::value::Value;

/// Kind of a sortable column, used to parse cursor values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    /// Integer column; cursor values are decimal strings.
    Integer,
    /// Text column; cursor values are taken literally.
    Text,
}

/// A column that an entity may be paginated by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CursorColumn {
    /// Column name.
    pub name: &'static str,
    /// Column kind.
    pub kind: ColumnKind,
}

impl CursorColumn {
    /// An integer cursor column.
    pub const fn integer(name: &'static str) -> Self {
        Self {
            name,
            kind: ColumnKind::Integer,
        }
    }

    /// A text cursor column.
    pub const fn text(name: &'static str) -> Self {
        Self {
            name,
            kind: ColumnKind::Text,
        }
    }

    /// Parse a cursor string into a typed bound value.
    pub fn parse_value(&self, raw: &str) -> Result<Value> {
        match self.kind {
            ColumnKind::Integer => raw.parse::<i64>().map(Value::Integer).map_err(|_| {
                Error::InvalidCursorValue {
                    column: self.name.to_string(),
                    value: raw.to_string(),
                }
            }),
            ColumnKind::Text => Ok(Value::Text(raw.to_string())),
        }
    }
}

/// A record that can be paginated with a keyset cursor.
pub trait Record {
    /// Sortable columns. The first entry is the default cursor column.
    const CURSOR_COLUMNS: &'static [CursorColumn];

    /// Value of a column on this record, or `None` if the column is unknown.
    fn field(&self, column: &str) -> Option<Value>;

    /// Look up a column in the allow-list.
    fn cursor_column(name: &str) -> Option<&'static CursorColumn> {
        Self::CURSOR_COLUMNS.iter().find(|c| c.name == name)
    }

    /// String written into the cursor after this record is returned.
    fn cursor_value(&self, column: &str) -> Option<String> {
        self.field(column).map(|v| v.to_cursor_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_integer_value() {
        let column = CursorColumn::integer("id");
        assert_eq!(column.parse_value("42").unwrap(), Value::Integer(42));
        assert!(matches!(
            column.parse_value("forty-two"),
            Err(Error::InvalidCursorValue { .. })
        ));
    }

    #[test]
    fn test_parse_text_value() {
        let column = CursorColumn::text("name");
        assert_eq!(
            column.parse_value("github.com/a/b").unwrap(),
            Value::Text("github.com/a/b".into())
        );
    }
}
