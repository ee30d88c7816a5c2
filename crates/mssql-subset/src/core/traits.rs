//! Core trait for reading schema metadata and rows during an export.
//!
//! - [`MetadataProvider`]: lists tables, foreign keys, primary keys and columns,
//!   and reads individual rows by primary key
//!
//! The export walker is written against this trait only, so it can be driven
//! by a live SQL Server connection or by an in-memory fixture.

use async_trait::async_trait;

use crate::error::Result;

use super::schema::{ColumnRef, ForeignKeyRef, TableRef};
use super::value::SqlValue;

/// Read schema metadata and rows from a source database.
///
/// Calls are issued strictly one at a time by the export walker; an
/// implementation never sees overlapping requests from a single export.
#[async_trait]
pub trait MetadataProvider: Send + Sync {
    /// List all user tables.
    async fn list_tables(&self) -> Result<Vec<TableRef>>;

    /// List all single-column foreign key relationships.
    async fn list_foreign_keys(&self) -> Result<Vec<ForeignKeyRef>>;

    /// Get the primary key column of a table, if it has one.
    async fn primary_key_column(&self, table: &TableRef) -> Result<Option<String>>;

    /// List the columns of a table in ordinal order.
    async fn list_columns(&self, table: &TableRef) -> Result<Vec<ColumnRef>>;

    /// Read one row by primary key.
    ///
    /// Returns the values of `columns` in the same order, or `None` when no
    /// row has that key.
    async fn read_row(
        &self,
        table: &TableRef,
        pk_column: &str,
        columns: &[ColumnRef],
        id: &str,
    ) -> Result<Option<Vec<SqlValue>>>;

    /// List the primary keys of rows in `table` whose `column` equals `id`.
    async fn read_referencing_ids(
        &self,
        table: &TableRef,
        pk_column: &str,
        column: &str,
        id: &str,
    ) -> Result<Vec<String>>;

    /// Fetch the value of `lookup_column` for the row whose `id_column` equals `id`.
    async fn lookup_value(
        &self,
        table: &TableRef,
        id_column: &str,
        lookup_column: &str,
        id: &str,
    ) -> Result<Option<String>>;

    /// Check that the source is reachable.
    async fn test_connection(&self) -> Result<()>;

    /// Get the database type identifier (e.g., "mssql", "memory").
    fn db_type(&self) -> &str;
}
