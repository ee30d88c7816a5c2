//! Metadata provider implementations.
//!
//! - [`mssql`]: Microsoft SQL Server via Tiberius
//! - [`memory`]: in-memory tables, for tests and dry runs without a database
//!
//! Each driver implements [`MetadataProvider`](crate::core::MetadataProvider).
//! The export engine is generic over the provider, so adding a driver does
//! not touch the walker or the script renderer.

pub mod memory;
pub mod mssql;

pub use memory::{MemoryProvider, MemoryTable};
pub use mssql::MssqlProvider;
