//! Subset export: graph walk, variable binding, ordering and script output.

pub mod encoder;
pub mod engine;
pub mod registry;
pub mod scheduler;
pub mod script;
pub mod walker;

pub use engine::{ExportEngine, ExportOutcome, ExportRequest, ExportSummary};
pub use registry::{Binding, RowState, VariableRegistry};
pub use scheduler::{schedule, Schedule, ScheduledRow};
pub use walker::{ExportWalker, RowDescriptor};
