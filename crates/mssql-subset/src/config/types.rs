//! Configuration type definitions.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Source database configuration (MSSQL).
    pub source: SourceConfig,

    /// Export behavior configuration.
    #[serde(default)]
    pub export: ExportConfig,
}

/// Source database (MSSQL) configuration.
///
/// Either `connection_string` (ADO.NET style) or the discrete connection
/// fields must be provided. When both are present the connection string wins.
#[derive(Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Database type (always "mssql").
    #[serde(default = "default_mssql")]
    pub r#type: String,

    /// ADO.NET connection string, e.g. `Server=tcp:host,1433;Database=db;User Id=sa;Password=...`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connection_string: Option<String>,

    /// Database host.
    #[serde(default)]
    pub host: String,

    /// Database port (default: 1433).
    #[serde(default = "default_mssql_port")]
    pub port: u16,

    /// Database name.
    #[serde(default)]
    pub database: String,

    /// Username.
    #[serde(default)]
    pub user: String,

    /// Password.
    #[serde(default)]
    pub password: String,

    /// Encrypt connection (default: true).
    #[serde(default = "default_true")]
    pub encrypt: bool,

    /// Trust server certificate (default: false).
    #[serde(default)]
    pub trust_server_cert: bool,
}

impl fmt::Debug for SourceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceConfig")
            .field("type", &self.r#type)
            .field(
                "connection_string",
                &self.connection_string.as_ref().map(|_| "[REDACTED]"),
            )
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &"[REDACTED]")
            .field("encrypt", &self.encrypt)
            .field("trust_server_cert", &self.trust_server_cert)
            .finish()
    }
}

impl SourceConfig {
    /// Build a source configuration from an ADO.NET connection string.
    pub fn from_connection_string(connection_string: impl Into<String>) -> Self {
        Self {
            r#type: default_mssql(),
            connection_string: Some(connection_string.into()),
            host: String::new(),
            port: default_mssql_port(),
            database: String::new(),
            user: String::new(),
            password: String::new(),
            encrypt: true,
            trust_server_cert: false,
        }
    }
}

/// Export behavior configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ExportConfig {
    /// Replace recognized binary payloads (JPEG) with a small canned image (default: false).
    #[serde(default)]
    pub dummy_files: bool,
}

// Default value functions for serde
fn default_mssql() -> String {
    "mssql".to_string()
}

fn default_mssql_port() -> u16 {
    1433
}

fn default_true() -> bool {
    true
}
