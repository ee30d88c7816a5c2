//! Rendering of the final T-SQL script.

use super::registry::Binding;
use super::scheduler::Schedule;

/// Declaration of one variable with a fresh GUID string value.
///
/// The original identifier survives only in the trailing comment.
pub fn declare_line(binding: &Binding) -> String {
    format!(
        "declare {} as varchar(255) = LOWER(CONVERT(varchar(255), NEWID())); -- formerly: '{}'",
        binding.variable,
        binding.original_id.replace(['\r', '\n'], " ")
    )
}

/// Render the script: `BEGIN`, one `declare` per binding, the scheduled
/// inserts (unresolved ones preceded by a warning comment), `END`.
pub fn render(bindings: &[Binding], schedule: &Schedule) -> String {
    let mut out = String::new();
    out.push_str("BEGIN\n");

    for binding in bindings {
        out.push_str(&declare_line(binding));
        out.push('\n');
    }

    for scheduled in &schedule.rows {
        if scheduled.is_unresolved() {
            out.push_str("-- Warning: Missing dependency: ");
            out.push_str(&scheduled.missing.join(","));
            out.push('\n');
        }
        out.push_str(&scheduled.row.sql);
        out.push('\n');
    }

    out.push_str("END\n");
    out
}
