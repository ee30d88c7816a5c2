//! Recursive traversal of the foreign key graph from the entry row.
//!
//! The walker reads one row at a time through a [`MetadataProvider`], turns
//! it into an INSERT statement whose keys are replaced by registry variables,
//! and follows foreign keys according to the export profile:
//!
//! - outbound keys into exported tables are walked before the referencing
//!   column is encoded (child to parent, when `GoToParent` is set)
//! - inbound keys from exported tables other than the entry table are walked
//!   after the row is stored (parent to children)
//!
//! A row's variable is reserved and the row marked in progress before it is
//! read, so cycles and diamonds in the graph terminate and every row is
//! stored at most once.

use std::collections::{BTreeSet, HashMap};

use futures::future::BoxFuture;
use tracing::{debug, warn};

use super::encoder::{encode_literal, lookup_subquery};
use super::registry::VariableRegistry;
use crate::core::identifier::bracket;
use crate::core::{ColumnRef, ColumnType, ForeignKeyRef, MetadataProvider, SqlValue, TableRef};
use crate::error::{ExportError, Result};
use crate::profile::Profile;

/// A fully encoded row waiting to be scheduled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowDescriptor {
    pub table: TableRef,
    pub original_id: String,
    /// Variable standing in for this row's primary key.
    pub variable: String,
    /// Complete INSERT statement.
    pub sql: String,
    /// Variables of other rows this statement uses. Never contains `variable`.
    pub referenced_variables: BTreeSet<String>,
}

/// Walks the row graph for one export run.
pub struct ExportWalker<'a, P: MetadataProvider + ?Sized> {
    provider: &'a P,
    profile: &'a Profile,
    dummy_files: bool,
    registry: VariableRegistry,
    rows: Vec<RowDescriptor>,
    foreign_keys: Vec<ForeignKeyRef>,
    primary_keys: HashMap<TableRef, String>,
    columns: HashMap<TableRef, Vec<ColumnRef>>,
}

impl<'a, P: MetadataProvider + ?Sized> ExportWalker<'a, P> {
    /// Create a walker, loading the database's foreign keys once for the run.
    pub async fn new(provider: &'a P, profile: &'a Profile, dummy_files: bool) -> Result<Self> {
        let foreign_keys = provider.list_foreign_keys().await?;
        debug!("Loaded {} foreign keys", foreign_keys.len());

        Ok(Self {
            provider,
            profile,
            dummy_files,
            registry: VariableRegistry::new(),
            rows: Vec::new(),
            foreign_keys,
            primary_keys: HashMap::new(),
            columns: HashMap::new(),
        })
    }

    /// Collect the row `id` of `table` and everything reachable from it.
    pub fn walk<'s>(&'s mut self, table: TableRef, id: String) -> BoxFuture<'s, Result<()>> {
        Box::pin(async move {
            if self.registry.is_visited(&id) {
                return Ok(());
            }

            let variable = self.registry.get_or_create(&table, &id);
            self.registry.begin(&id);
            debug!("Walking {} row '{}' as {}", table, id, variable);

            let pk_column = self.primary_key_of(&table).await?;
            let columns = self.columns_of(&table).await?;
            let types = columns
                .iter()
                .map(|c| c.column_type(&table))
                .collect::<Result<Vec<_>>>()?;

            let values = match self.provider.read_row(&table, &pk_column, &columns, &id).await? {
                Some(values) => values,
                None => {
                    warn!("Row '{}' not found in {}, skipping", id, table);
                    self.registry.mark_defined(&id);
                    return Ok(());
                }
            };
            if values.len() != columns.len() {
                return Err(ExportError::Metadata(format!(
                    "Provider returned {} values for {} columns of {}",
                    values.len(),
                    columns.len(),
                    table
                )));
            }

            let outbound: HashMap<String, ForeignKeyRef> = self
                .foreign_keys
                .iter()
                .filter(|fk| fk.source.table == table)
                .map(|fk| (fk.source.column.clone(), fk.clone()))
                .collect();

            let mut referenced = BTreeSet::new();
            let mut literals = Vec::with_capacity(columns.len());
            for ((column, column_type), value) in columns.iter().zip(types).zip(&values) {
                let literal = self
                    .encode_column(
                        &variable,
                        &pk_column,
                        column,
                        column_type,
                        value,
                        outbound.get(&column.name),
                        &mut referenced,
                    )
                    .await?;
                literals.push(literal);
            }

            let column_list = columns
                .iter()
                .map(|c| bracket(&c.name))
                .collect::<Vec<_>>()
                .join(", ");
            let sql = format!(
                "INSERT INTO {} ({})\n  VALUES ({});",
                table,
                column_list,
                literals.join(", ")
            );

            self.rows.push(RowDescriptor {
                table: table.clone(),
                original_id: id.clone(),
                variable,
                sql,
                referenced_variables: referenced,
            });
            self.registry.mark_defined(&id);

            self.walk_children(&table, &id).await
        })
    }

    /// Walk rows of exported tables that reference `id` through followed inbound keys.
    async fn walk_children(&mut self, table: &TableRef, id: &str) -> Result<()> {
        let inbound: Vec<ForeignKeyRef> = self
            .foreign_keys
            .iter()
            .filter(|fk| &fk.target.table == table)
            .cloned()
            .collect();

        for fk in inbound {
            let source = &fk.source.table;
            if !self.profile.is_exportable(source)
                || self.profile.is_entry_point(source)
                || !self.profile.should_follow(&fk).to_children()
            {
                continue;
            }

            let source_pk = self.primary_key_of(source).await?;
            let child_ids = self
                .provider
                .read_referencing_ids(source, &source_pk, &fk.source.column, id)
                .await?;
            debug!("{} rows of {} reference '{}' via {}", child_ids.len(), source, id, fk);

            for child_id in child_ids {
                self.walk(source.clone(), child_id).await?;
            }
        }

        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    async fn encode_column(
        &mut self,
        own_variable: &str,
        pk_column: &str,
        column: &ColumnRef,
        column_type: ColumnType,
        value: &SqlValue,
        foreign_key: Option<&ForeignKeyRef>,
        referenced: &mut BTreeSet<String>,
    ) -> Result<String> {
        if value.is_null() {
            return Ok("null".to_string());
        }

        if column.name == pk_column {
            if let Some(variable) = value.as_key().and_then(|k| self.registry.variable_of(&k)) {
                return Ok(variable.to_string());
            }
        }

        if let (ColumnType::String, Some(fk), SqlValue::Text(raw)) = (column_type, foreign_key, value) {
            let target = &fk.target.table;

            if self.profile.is_exportable(target) {
                if self.profile.should_follow(fk).to_parent() {
                    self.walk(target.clone(), raw.clone()).await?;
                }
                let variable = self.registry.get_or_create(target, raw);
                if variable != own_variable {
                    referenced.insert(variable.clone());
                }
                return Ok(variable);
            }

            if let Some(lookup_column) = self.profile.lookup_column_of(target) {
                let found = self
                    .provider
                    .lookup_value(target, &fk.target.column, lookup_column, raw)
                    .await?;
                match found {
                    Some(lookup) => {
                        return Ok(lookup_subquery(target, &fk.target.column, lookup_column, &lookup))
                    }
                    None => debug!(
                        "No {} row for '{}', keeping the literal value of {}",
                        target, raw, column.name
                    ),
                }
            }
        }

        encode_literal(column, column_type, value, self.dummy_files)
    }

    async fn primary_key_of(&mut self, table: &TableRef) -> Result<String> {
        if let Some(pk) = self.primary_keys.get(table) {
            return Ok(pk.clone());
        }
        let pk = self
            .provider
            .primary_key_column(table)
            .await?
            .ok_or_else(|| ExportError::NoPrimaryKey(table.to_string()))?;
        self.primary_keys.insert(table.clone(), pk.clone());
        Ok(pk)
    }

    async fn columns_of(&mut self, table: &TableRef) -> Result<Vec<ColumnRef>> {
        if let Some(columns) = self.columns.get(table) {
            return Ok(columns.clone());
        }
        let columns = self.provider.list_columns(table).await?;
        if columns.is_empty() {
            return Err(ExportError::Metadata(format!("Table {} has no columns", table)));
        }
        self.columns.insert(table.clone(), columns.clone());
        Ok(columns)
    }

    /// Registry of variables bound so far.
    pub fn registry(&self) -> &VariableRegistry {
        &self.registry
    }

    /// Rows collected so far, in discovery order.
    pub fn rows(&self) -> &[RowDescriptor] {
        &self.rows
    }

    /// Consume the walker, returning the registry and collected rows.
    pub fn into_parts(self) -> (VariableRegistry, Vec<RowDescriptor>) {
        (self.registry, self.rows)
    }
}
