//! Microsoft SQL Server driver.
//!
//! - [`MssqlProvider`]: metadata and row provider backed by Tiberius
//! - [`TiberiusConnectionManager`]: bb8 connection manager used by the provider

mod provider;

pub use provider::{MssqlProvider, TiberiusConnectionManager};
