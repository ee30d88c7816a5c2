//! Schema metadata types: tables, columns, column types and foreign keys.
//!
//! These are the shapes the metadata provider reports and the export walker
//! consumes. Tables and foreign keys are identified by their bracketed text
//! form (`[schema].[name]`, `[schema].[name].[column]`), which is also what
//! export profiles store.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::identifier::{bracket, split_bracketed};
use crate::error::{ExportError, Result};

/// Reference to a table by schema and name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TableRef {
    /// Schema name.
    pub schema: String,

    /// Table name.
    pub name: String,
}

impl TableRef {
    /// Create a table reference.
    pub fn new(schema: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            name: name.into(),
        }
    }

    /// Column key for a column of this table.
    pub fn column(&self, column: impl Into<String>) -> ColumnKey {
        ColumnKey {
            table: self.clone(),
            column: column.into(),
        }
    }
}

impl fmt::Display for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", bracket(&self.schema), bracket(&self.name))
    }
}

impl FromStr for TableRef {
    type Err = ExportError;

    fn from_str(s: &str) -> Result<Self> {
        match split_bracketed(s)?.as_slice() {
            [schema, name] => Ok(TableRef::new(schema.clone(), name.clone())),
            _ => Err(ExportError::Config(format!(
                "Expected a table name of the form [schema].[table], got {:?}",
                s
            ))),
        }
    }
}

impl TryFrom<String> for TableRef {
    type Error = ExportError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<TableRef> for String {
    fn from(value: TableRef) -> Self {
        value.to_string()
    }
}

/// A column of a specific table (one end of a foreign key).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ColumnKey {
    /// Owning table.
    pub table: TableRef,

    /// Column name.
    pub column: String,
}

impl fmt::Display for ColumnKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.table, bracket(&self.column))
    }
}

impl FromStr for ColumnKey {
    type Err = ExportError;

    fn from_str(s: &str) -> Result<Self> {
        match split_bracketed(s)?.as_slice() {
            [schema, table, column] => Ok(TableRef::new(schema.clone(), table.clone()).column(column.clone())),
            _ => Err(ExportError::Config(format!(
                "Expected a column name of the form [schema].[table].[column], got {:?}",
                s
            ))),
        }
    }
}

/// Column metadata as reported by the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnRef {
    /// Column name.
    pub name: String,

    /// Data type as reported by the database (e.g., "nvarchar", "datetime2").
    pub data_type: String,
}

impl ColumnRef {
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
        }
    }

    /// Resolve the column's SQL type into the supported set.
    ///
    /// # Errors
    ///
    /// Returns `ExportError::UnsupportedColumnType` naming the table, column
    /// and type when the type is not one the encoder can render.
    pub fn column_type(&self, table: &TableRef) -> Result<ColumnType> {
        ColumnType::from_sql_type(&self.data_type)
            .ok_or_else(|| ExportError::unsupported_type(table.to_string(), &self.name, &self.data_type))
    }
}

/// Closed set of column types the exporter can encode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnType {
    /// `varchar` / `nvarchar`.
    String,
    /// `bigint`.
    BigInt,
    /// `decimal` / `numeric`.
    Decimal,
    /// `varbinary`.
    Binary,
    /// `int`.
    Int,
    /// `bit`.
    Bit,
    /// `datetime2`.
    DateTime2,
}

impl ColumnType {
    /// Map a SQL Server type name to a column type. Case-insensitive.
    pub fn from_sql_type(data_type: &str) -> Option<Self> {
        match data_type.to_lowercase().as_str() {
            "varchar" | "nvarchar" => Some(ColumnType::String),
            "bigint" => Some(ColumnType::BigInt),
            "decimal" | "numeric" => Some(ColumnType::Decimal),
            "varbinary" => Some(ColumnType::Binary),
            "int" => Some(ColumnType::Int),
            "bit" => Some(ColumnType::Bit),
            "datetime2" => Some(ColumnType::DateTime2),
            _ => None,
        }
    }

    /// Human readable name used in diagnostics.
    pub fn as_str(&self) -> &'static str {
        match self {
            ColumnType::String => "string",
            ColumnType::BigInt => "bigint",
            ColumnType::Decimal => "decimal",
            ColumnType::Binary => "binary",
            ColumnType::Int => "int",
            ColumnType::Bit => "bit",
            ColumnType::DateTime2 => "datetime2",
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Directed foreign key: `source` column references `target` column.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ForeignKeyRef {
    /// Referencing (child) column.
    pub source: ColumnKey,

    /// Referenced (parent) column.
    pub target: ColumnKey,
}

impl ForeignKeyRef {
    pub fn new(source: ColumnKey, target: ColumnKey) -> Self {
        Self { source, target }
    }

    /// Identity used in export profiles: the source column's bracketed name.
    pub fn identity(&self) -> String {
        self.source.to_string()
    }
}

impl fmt::Display for ForeignKeyRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}->{}", self.source, self.target)
    }
}
