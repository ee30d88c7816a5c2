//! Dependency ordering of collected INSERT statements.
//!
//! Rows are collected in discovery order, which is not always safe to run:
//! a child reached through an inbound foreign key may be collected before a
//! parent it also references. The scheduler reorders rows so that every
//! statement comes after the statements defining the variables it uses.

use std::collections::HashSet;

use super::walker::RowDescriptor;

/// A row in emission order.
#[derive(Debug, Clone)]
pub struct ScheduledRow {
    pub row: RowDescriptor,
    /// Referenced variables not defined by any earlier statement.
    pub missing: Vec<String>,
}

impl ScheduledRow {
    /// Whether this row was emitted with unsatisfied references.
    pub fn is_unresolved(&self) -> bool {
        !self.missing.is_empty()
    }
}

/// Result of scheduling: every input row exactly once.
#[derive(Debug, Clone, Default)]
pub struct Schedule {
    pub rows: Vec<ScheduledRow>,
}

impl Schedule {
    /// Number of rows emitted with missing dependencies.
    pub fn unresolved_count(&self) -> usize {
        self.rows.iter().filter(|r| r.is_unresolved()).count()
    }
}

/// Order rows so that each one follows the rows it references.
///
/// Runs fixed-point passes over the pending rows, emitting every row whose
/// references are all emitted, until a pass emits nothing. A stalled row is
/// then forced out: the first one whose outstanding references are never
/// defined by any row, or the first pending row when only a cycle among
/// collected rows remains. Passes resume after each forced row.
pub fn schedule(rows: Vec<RowDescriptor>) -> Schedule {
    let defined: HashSet<String> = rows.iter().map(|row| row.variable.clone()).collect();
    let mut pending: Vec<Option<RowDescriptor>> = rows.into_iter().map(Some).collect();
    let mut remaining = pending.len();
    let mut emitted: HashSet<String> = HashSet::new();
    let mut ordered = Vec::with_capacity(remaining);

    while remaining > 0 {
        let mut progressed = true;
        while progressed && remaining > 0 {
            progressed = false;
            for slot in pending.iter_mut() {
                let ready = slot.as_ref().is_some_and(|row| {
                    row.referenced_variables.iter().all(|v| emitted.contains(v))
                });
                if !ready {
                    continue;
                }
                if let Some(row) = slot.take() {
                    emitted.insert(row.variable.clone());
                    ordered.push(ScheduledRow {
                        row,
                        missing: Vec::new(),
                    });
                    remaining -= 1;
                    progressed = true;
                }
            }
        }
        if remaining == 0 {
            break;
        }

        let blocked_only_by_undefined = pending.iter().position(|slot| {
            slot.as_ref().is_some_and(|row| {
                row.referenced_variables
                    .iter()
                    .all(|v| emitted.contains(v) || !defined.contains(v))
            })
        });
        let first_pending = || pending.iter().position(Option::is_some);
        let Some(index) = blocked_only_by_undefined.or_else(first_pending) else {
            break;
        };
        let Some(row) = pending[index].take() else {
            break;
        };

        let missing: Vec<String> = row
            .referenced_variables
            .iter()
            .filter(|v| !emitted.contains(*v))
            .cloned()
            .collect();
        emitted.insert(row.variable.clone());
        ordered.push(ScheduledRow { row, missing });
        remaining -= 1;
    }

    Schedule { rows: ordered }
}
