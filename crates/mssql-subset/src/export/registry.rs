//! Variable bindings for exported rows.
//!
//! Every original row identifier that appears in the script (as a row being
//! inserted or as a foreign key value pointing at one) is replaced by a T-SQL
//! variable declared once at the top of the script. The registry hands out
//! those names and tracks which rows have already been walked.

use std::collections::{HashMap, HashSet};

use tracing::warn;

use crate::core::TableRef;

/// Visit state of a row identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowState {
    /// The walker has reserved the row's variable and is reading or encoding it.
    InProgress,
    /// The row has been fully processed.
    Defined,
}

/// One identifier → variable binding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binding {
    /// Original row identifier.
    pub original_id: String,
    /// Table the identifier was first bound for.
    pub table: TableRef,
    /// Variable name including the leading `@`.
    pub variable: String,
}

/// Registry of variable bindings and visit states for one export run.
///
/// Identifiers are keyed globally, not per table: two tables that share a
/// raw identifier value share one variable. Exports are expected to run on
/// databases with globally unique keys (GUID-style strings); a collision is
/// logged when observed.
#[derive(Debug, Default)]
pub struct VariableRegistry {
    bindings: Vec<Binding>,
    by_id: HashMap<String, usize>,
    used_names: HashSet<String>,
    counters: HashMap<String, u64>,
    states: HashMap<String, RowState>,
}

impl VariableRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the variable bound to `id`, allocating a new one for `table` if needed.
    ///
    /// Repeated calls with the same identifier always return the same name.
    pub fn get_or_create(&mut self, table: &TableRef, id: &str) -> String {
        if let Some(&idx) = self.by_id.get(id) {
            let binding = &self.bindings[idx];
            if &binding.table != table {
                warn!(
                    "Identifier '{}' is used by both {} and {}; both share variable {}",
                    id, binding.table, table, binding.variable
                );
            }
            return binding.variable.clone();
        }

        let variable = self.allocate_name(table);
        self.by_id.insert(id.to_string(), self.bindings.len());
        self.bindings.push(Binding {
            original_id: id.to_string(),
            table: table.clone(),
            variable: variable.clone(),
        });
        variable
    }

    /// Variable already bound to `id`, if any.
    pub fn variable_of(&self, id: &str) -> Option<&str> {
        self.by_id
            .get(id)
            .map(|&idx| self.bindings[idx].variable.as_str())
    }

    /// Mark `id` as being walked.
    pub fn begin(&mut self, id: &str) {
        self.states.insert(id.to_string(), RowState::InProgress);
    }

    /// Mark `id` as fully processed.
    pub fn mark_defined(&mut self, id: &str) {
        self.states.insert(id.to_string(), RowState::Defined);
    }

    /// Whether `id` has been reached by the walker (in progress or defined).
    pub fn is_visited(&self, id: &str) -> bool {
        self.states.contains_key(id)
    }

    /// Visit state of `id`.
    pub fn state(&self, id: &str) -> Option<RowState> {
        self.states.get(id).copied()
    }

    /// All bindings in allocation order.
    pub fn bindings(&self) -> &[Binding] {
        &self.bindings
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    fn allocate_name(&mut self, table: &TableRef) -> String {
        let stem = variable_stem(&table.name);
        let counter = self.counters.entry(table.name.clone()).or_insert(0);

        loop {
            let candidate = format!("@{}{}", stem, counter);
            *counter += 1;
            if self.used_names.insert(candidate.clone()) {
                return candidate;
            }
        }
    }
}

/// Table name with its first character lower-cased and anything outside
/// `[A-Za-z0-9_]` replaced by `_`.
fn variable_stem(table_name: &str) -> String {
    let mut stem = String::with_capacity(table_name.len());
    for (i, c) in table_name.chars().enumerate() {
        let c = if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' };
        if i == 0 {
            stem.extend(c.to_lowercase());
        } else {
            stem.push(c);
        }
    }
    if stem.is_empty() {
        stem.push_str("row");
    }
    stem
}
