//! # mssql-subset
//!
//! Export a foreign-key connected subset of SQL Server rows as a single
//! re-keyed INSERT script.
//!
//! Starting from one row of an entry table, the exporter follows foreign keys
//! as an export profile allows and writes a T-SQL script that recreates every
//! reached row. Original primary keys never appear in the statements: each
//! one is replaced by a variable initialised with a fresh GUID string, so the
//! script can be run against another database (or the same one) without key
//! collisions.
//!
//! - **Profiles** decide which tables are copied, which keys are followed and
//!   in which direction, and which tables are referenced by a lookup column
//!   instead of being copied
//! - **Ordering** puts every statement after the rows it references; rows
//!   whose references cannot be satisfied are emitted last with a warning
//! - **Bootstrap**: running against a missing profile writes a starting
//!   profile listing every table and foreign key
//!
//! ## Example
//!
//! ```rust,no_run
//! use mssql_subset::{Config, ExportEngine, ExportOutcome, ExportRequest, MssqlProvider};
//!
//! #[tokio::main]
//! async fn main() -> mssql_subset::Result<()> {
//!     let config = Config::load("config.yaml")?;
//!     let engine = ExportEngine::new(MssqlProvider::new(config.source).await?);
//!     let request = ExportRequest {
//!         output_path: "order.sql".into(),
//!         profile_path: "profile.json".into(),
//!         entry_point_id: "3f2b6c1e-order".into(),
//!         dummy_files: false,
//!     };
//!     if let ExportOutcome::Completed(summary) = engine.export(&request).await? {
//!         println!("Exported {} rows", summary.rows_exported);
//!     }
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod core;
pub mod drivers;
pub mod error;
pub mod export;
pub mod profile;

// Re-exports for convenient access
pub use config::{Config, ExportConfig, SourceConfig};
pub use core::{ColumnRef, ColumnType, ForeignKeyRef, MetadataProvider, SqlValue, TableRef};
pub use drivers::{MemoryProvider, MemoryTable, MssqlProvider};
pub use error::{ExportError, Result};
pub use export::{ExportEngine, ExportOutcome, ExportRequest, ExportSummary};
pub use profile::Profile;
