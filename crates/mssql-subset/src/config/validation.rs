//! Configuration validation.

use super::Config;
use crate::error::{ExportError, Result};

/// Validate the configuration.
pub fn validate(config: &Config) -> Result<()> {
    if config.source.r#type != "mssql" {
        return Err(ExportError::Config(format!(
            "source.type must be 'mssql', got '{}'",
            config.source.r#type
        )));
    }

    match config.source.connection_string.as_deref() {
        Some(cs) if cs.trim().is_empty() => {
            return Err(ExportError::Config(
                "source.connection_string must not be empty".into(),
            ));
        }
        Some(_) => {}
        None => {
            if config.source.host.is_empty() {
                return Err(ExportError::Config("source.host is required".into()));
            }
            if config.source.database.is_empty() {
                return Err(ExportError::Config("source.database is required".into()));
            }
            if config.source.user.is_empty() {
                return Err(ExportError::Config("source.user is required".into()));
            }
        }
    }

    if config.source.port == 0 {
        return Err(ExportError::Config("source.port must not be 0".into()));
    }

    Ok(())
}
