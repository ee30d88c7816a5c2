//! Error types for the subset exporter.

use thiserror::Error;

/// Main error type for export operations.
#[derive(Error, Debug)]
pub enum ExportError {
    /// Configuration or profile error (invalid YAML/JSON, missing fields, bad entry point, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// A column uses a SQL type the encoder does not know how to render
    #[error("Unsupported column type '{data_type}' for column {column} of table {table}")]
    UnsupportedColumnType {
        table: String,
        column: String,
        data_type: String,
    },

    /// Source database connection or query error
    #[error("Source database error: {0}")]
    Provider(#[from] tiberius::error::Error),

    /// Connection pool error with context
    #[error("Pool error: {message}\n  Context: {context}")]
    Pool { message: String, context: String },

    /// Metadata returned by the provider is inconsistent (unknown table, column, ...)
    #[error("Metadata error: {0}")]
    Metadata(String),

    /// Table has no primary key (rows cannot be addressed)
    #[error("Table {0} has no primary key - rows cannot be exported without one")]
    NoPrimaryKey(String),

    /// A value read from the database does not match its declared column type
    #[error("Value of column {column} is {found}, expected {expected}")]
    ValueMismatch {
        column: String,
        expected: String,
        found: String,
    },

    /// IO error (file operations)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization/deserialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ExportError {
    /// Create a Pool error with context about where it occurred
    pub fn pool(message: impl ToString, context: impl Into<String>) -> Self {
        ExportError::Pool {
            message: message.to_string(),
            context: context.into(),
        }
    }

    /// Create an UnsupportedColumnType error
    pub fn unsupported_type(
        table: impl Into<String>,
        column: impl Into<String>,
        data_type: impl Into<String>,
    ) -> Self {
        ExportError::UnsupportedColumnType {
            table: table.into(),
            column: column.into(),
            data_type: data_type.into(),
        }
    }

    /// Process exit code for this error kind.
    pub fn exit_code(&self) -> u8 {
        match self {
            ExportError::Config(_) => 2,
            ExportError::UnsupportedColumnType { .. } => 3,
            _ => 1,
        }
    }

    /// Format error with full details including error chain
    pub fn format_detailed(&self) -> String {
        let mut output = format!("Error: {}\n", self);

        let mut source = std::error::Error::source(self);
        let mut depth = 1;
        while let Some(err) = source {
            output.push_str(&format!("\nCaused by:\n  {}: {}", depth, err));
            source = err.source();
            depth += 1;
        }

        output
    }
}

/// Result type alias for export operations.
pub type Result<T> = std::result::Result<T, ExportError>;
