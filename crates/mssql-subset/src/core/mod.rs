//! Core abstractions shared by providers and the export pipeline.
//!
//! - [`schema`]: table, column, column type and foreign key metadata
//! - [`value`]: owned SQL values read from source rows
//! - [`identifier`]: bracket quoting and parsing of SQL Server names
//! - [`traits`]: the [`MetadataProvider`] trait implemented by drivers

pub mod identifier;
pub mod schema;
pub mod traits;
pub mod value;

pub use schema::{ColumnKey, ColumnRef, ColumnType, ForeignKeyRef, TableRef};
pub use traits::MetadataProvider;
pub use value::SqlValue;
