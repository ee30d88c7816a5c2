//! SQL value representation for rows read from the source database.

use chrono::NaiveDateTime;
use rust_decimal::Decimal;

/// A single column value, owned.
///
/// The variants mirror [`ColumnType`](super::schema::ColumnType): providers
/// decode each column according to its declared type, and the encoder checks
/// that the variant matches before rendering it.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    /// SQL NULL.
    Null,

    /// Text (varchar, nvarchar).
    Text(String),

    /// 32-bit signed integer (int).
    I32(i32),

    /// 64-bit signed integer (bigint).
    I64(i64),

    /// Exact decimal with preserved scale.
    Decimal(Decimal),

    /// Boolean (bit).
    Bool(bool),

    /// Binary data (varbinary).
    Bytes(Vec<u8>),

    /// Timestamp without timezone (datetime2).
    DateTime(NaiveDateTime),
}

impl SqlValue {
    /// Check if this value is NULL.
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, SqlValue::Null)
    }

    /// Textual row identifier for this value, if it can act as one.
    ///
    /// Row identifiers are compared as strings throughout an export, so
    /// integer keys are rendered in decimal form.
    #[must_use]
    pub fn as_key(&self) -> Option<String> {
        match self {
            SqlValue::Text(s) => Some(s.clone()),
            SqlValue::I32(v) => Some(v.to_string()),
            SqlValue::I64(v) => Some(v.to_string()),
            _ => None,
        }
    }

    /// Short name of the variant for diagnostics.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            SqlValue::Null => "null",
            SqlValue::Text(_) => "text",
            SqlValue::I32(_) => "int",
            SqlValue::I64(_) => "bigint",
            SqlValue::Decimal(_) => "decimal",
            SqlValue::Bool(_) => "bit",
            SqlValue::Bytes(_) => "binary",
            SqlValue::DateTime(_) => "datetime2",
        }
    }
}

impl From<&str> for SqlValue {
    fn from(v: &str) -> Self {
        SqlValue::Text(v.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(v: String) -> Self {
        SqlValue::Text(v)
    }
}

impl From<i32> for SqlValue {
    fn from(v: i32) -> Self {
        SqlValue::I32(v)
    }
}

impl From<i64> for SqlValue {
    fn from(v: i64) -> Self {
        SqlValue::I64(v)
    }
}

impl From<Decimal> for SqlValue {
    fn from(v: Decimal) -> Self {
        SqlValue::Decimal(v)
    }
}

impl From<bool> for SqlValue {
    fn from(v: bool) -> Self {
        SqlValue::Bool(v)
    }
}

impl From<Vec<u8>> for SqlValue {
    fn from(v: Vec<u8>) -> Self {
        SqlValue::Bytes(v)
    }
}

impl From<NaiveDateTime> for SqlValue {
    fn from(v: NaiveDateTime) -> Self {
        SqlValue::DateTime(v)
    }
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(SqlValue::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_null() {
        assert!(SqlValue::Null.is_null());
        assert!(!SqlValue::I32(0).is_null());
    }

    #[test]
    fn test_as_key() {
        assert_eq!(SqlValue::from("a-1").as_key().as_deref(), Some("a-1"));
        assert_eq!(SqlValue::I32(42).as_key().as_deref(), Some("42"));
        assert_eq!(SqlValue::I64(-7).as_key().as_deref(), Some("-7"));
        assert_eq!(SqlValue::Bool(true).as_key(), None);
        assert_eq!(SqlValue::Null.as_key(), None);
    }

    #[test]
    fn test_from_option() {
        let none: Option<i32> = None;
        assert_eq!(SqlValue::from(none), SqlValue::Null);
        assert_eq!(SqlValue::from(Some("x")), SqlValue::Text("x".into()));
    }
}
