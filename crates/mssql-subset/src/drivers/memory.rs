//! In-memory metadata provider.
//!
//! Holds a handful of tables as plain value rows and answers the same
//! questions a live database would. Used to exercise the export engine
//! without a SQL Server instance.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use crate::core::{ColumnKey, ColumnRef, ForeignKeyRef, MetadataProvider, SqlValue, TableRef};
use crate::error::{ExportError, Result};

/// A table with its metadata and rows.
#[derive(Debug, Clone)]
pub struct MemoryTable {
    pub table: TableRef,
    pub primary_key: Option<String>,
    pub columns: Vec<ColumnRef>,
    pub rows: Vec<Vec<SqlValue>>,
}

impl MemoryTable {
    pub fn new(schema: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            table: TableRef::new(schema, name),
            primary_key: None,
            columns: Vec::new(),
            rows: Vec::new(),
        }
    }

    /// Set the primary key column.
    pub fn primary_key(mut self, column: impl Into<String>) -> Self {
        self.primary_key = Some(column.into());
        self
    }

    /// Append a column with its SQL data type name.
    pub fn column(mut self, name: impl Into<String>, data_type: impl Into<String>) -> Self {
        self.columns.push(ColumnRef::new(name, data_type));
        self
    }

    /// Append a row; values follow column order.
    pub fn row(mut self, values: Vec<SqlValue>) -> Self {
        self.rows.push(values);
        self
    }

    fn column_index(&self, column: &str) -> Result<usize> {
        self.columns
            .iter()
            .position(|c| c.name == column)
            .ok_or_else(|| {
                ExportError::Metadata(format!("Column {} not found in {}", column, self.table))
            })
    }

    fn rows_where<'s>(
        &'s self,
        column: &str,
        key: &'s str,
    ) -> Result<impl Iterator<Item = &'s Vec<SqlValue>> + 's> {
        let idx = self.column_index(column)?;
        Ok(self
            .rows
            .iter()
            .filter(move |row| row.get(idx).and_then(SqlValue::as_key).as_deref() == Some(key)))
    }
}

/// Metadata provider backed by in-memory tables.
#[derive(Debug, Default)]
pub struct MemoryProvider {
    tables: Vec<MemoryTable>,
    foreign_keys: Vec<(String, String)>,
    row_reads: AtomicUsize,
}

impl MemoryProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_table(mut self, table: MemoryTable) -> Self {
        self.tables.push(table);
        self
    }

    /// Declare a foreign key between `[schema].[table].[column]` names.
    ///
    /// Names are parsed when foreign keys are listed, so a malformed name
    /// surfaces as an error from the provider.
    pub fn with_foreign_key(mut self, source: impl Into<String>, target: impl Into<String>) -> Self {
        self.foreign_keys.push((source.into(), target.into()));
        self
    }

    /// Number of `read_row` calls served so far.
    pub fn row_reads(&self) -> usize {
        self.row_reads.load(Ordering::Relaxed)
    }

    fn table(&self, table: &TableRef) -> Result<&MemoryTable> {
        self.tables
            .iter()
            .find(|t| &t.table == table)
            .ok_or_else(|| ExportError::Metadata(format!("Table {} does not exist", table)))
    }
}

#[async_trait]
impl MetadataProvider for MemoryProvider {
    async fn list_tables(&self) -> Result<Vec<TableRef>> {
        let mut tables: Vec<TableRef> = self.tables.iter().map(|t| t.table.clone()).collect();
        tables.sort();
        Ok(tables)
    }

    async fn list_foreign_keys(&self) -> Result<Vec<ForeignKeyRef>> {
        self.foreign_keys
            .iter()
            .map(|(source, target)| -> Result<ForeignKeyRef> {
                Ok(ForeignKeyRef::new(
                    source.parse::<ColumnKey>()?,
                    target.parse::<ColumnKey>()?,
                ))
            })
            .collect()
    }

    async fn primary_key_column(&self, table: &TableRef) -> Result<Option<String>> {
        Ok(self.table(table)?.primary_key.clone())
    }

    async fn list_columns(&self, table: &TableRef) -> Result<Vec<ColumnRef>> {
        Ok(self.table(table)?.columns.clone())
    }

    async fn read_row(
        &self,
        table: &TableRef,
        pk_column: &str,
        columns: &[ColumnRef],
        id: &str,
    ) -> Result<Option<Vec<SqlValue>>> {
        self.row_reads.fetch_add(1, Ordering::Relaxed);

        let source = self.table(table)?;
        let indexes = columns
            .iter()
            .map(|c| source.column_index(&c.name))
            .collect::<Result<Vec<_>>>()?;

        let row = source.rows_where(pk_column, id)?.next().map(|row| {
            indexes
                .iter()
                .map(|&i| row.get(i).cloned().unwrap_or(SqlValue::Null))
                .collect()
        });
        Ok(row)
    }

    async fn read_referencing_ids(
        &self,
        table: &TableRef,
        pk_column: &str,
        column: &str,
        id: &str,
    ) -> Result<Vec<String>> {
        let source = self.table(table)?;
        let pk_idx = source.column_index(pk_column)?;
        Ok(source
            .rows_where(column, id)?
            .filter_map(|row| row.get(pk_idx).and_then(SqlValue::as_key))
            .collect())
    }

    async fn lookup_value(
        &self,
        table: &TableRef,
        id_column: &str,
        lookup_column: &str,
        id: &str,
    ) -> Result<Option<String>> {
        let source = self.table(table)?;
        let lookup_idx = source.column_index(lookup_column)?;
        Ok(source
            .rows_where(id_column, id)?
            .next()
            .and_then(|row| row.get(lookup_idx).and_then(SqlValue::as_key)))
    }

    async fn test_connection(&self) -> Result<()> {
        Ok(())
    }

    fn db_type(&self) -> &str {
        "memory"
    }
}
