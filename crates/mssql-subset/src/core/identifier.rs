//! Identifier validation, bracket quoting and parsing for SQL Server names.
//!
//! Identifiers (schema, table and column names) cannot be bound as query
//! parameters, so every generated statement quotes them with brackets. The
//! same bracketed form (`[schema].[table].[column]`) is used as the textual
//! identity of tables and foreign keys inside export profiles, which is why
//! this module can also parse it back.

use crate::error::{ExportError, Result};

/// Maximum identifier length for SQL Server (128 characters).
const MAX_IDENTIFIER_LENGTH: usize = 128;

/// Validate an identifier for security issues.
///
/// Rejects:
/// - Empty identifiers
/// - Identifiers containing null bytes (injection vector)
/// - Identifiers exceeding maximum length
///
/// # Errors
///
/// Returns `ExportError::Config` for invalid identifiers with a descriptive message.
pub fn validate_identifier(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(ExportError::Config(
            "Identifier cannot be empty".to_string(),
        ));
    }

    if name.contains('\0') {
        return Err(ExportError::Config(format!(
            "SECURITY: Identifier contains null byte (possible injection attempt): {:?}",
            name
        )));
    }

    if name.chars().count() > MAX_IDENTIFIER_LENGTH {
        return Err(ExportError::Config(format!(
            "SECURITY: Identifier exceeds maximum length of {} characters: {:?}",
            MAX_IDENTIFIER_LENGTH, name
        )));
    }

    Ok(())
}

/// Quote a SQL Server identifier using brackets.
///
/// Escapes closing brackets by doubling them and wraps in brackets.
/// Validates the identifier before quoting.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(quote_mssql("users")?, "[users]");
/// assert_eq!(quote_mssql("table]name")?, "[table]]name]");
/// ```
pub fn quote_mssql(name: &str) -> Result<String> {
    validate_identifier(name)?;
    Ok(bracket(name))
}

/// Qualify a SQL Server table name with schema.
///
/// Returns `[schema].[table]` with proper quoting.
pub fn qualify_mssql(schema: &str, table: &str) -> Result<String> {
    Ok(format!("{}.{}", quote_mssql(schema)?, quote_mssql(table)?))
}

/// Bracket a name without validation (used for `Display` of already validated refs).
pub(crate) fn bracket(name: &str) -> String {
    format!("[{}]", name.replace(']', "]]"))
}

/// Split a dotted, bracketed name such as `[dbo].[Order].[CustomerId]` into its parts.
///
/// Doubled closing brackets inside a part are unescaped. Every part must be
/// bracketed and parts must be separated by a single dot.
pub fn split_bracketed(text: &str) -> Result<Vec<String>> {
    let invalid = || ExportError::Config(format!("Invalid bracketed name: {:?}", text));

    let mut parts = Vec::new();
    let mut chars = text.chars().peekable();

    loop {
        if chars.next() != Some('[') {
            return Err(invalid());
        }

        let mut part = String::new();
        loop {
            match chars.next() {
                Some(']') if chars.peek() == Some(&']') => {
                    chars.next();
                    part.push(']');
                }
                Some(']') => break,
                Some(c) => part.push(c),
                None => return Err(invalid()),
            }
        }

        validate_identifier(&part)?;
        parts.push(part);

        match chars.next() {
            None => break,
            Some('.') => continue,
            Some(_) => return Err(invalid()),
        }
    }

    Ok(parts)
}

/// Render a string as a single-quoted SQL literal, doubling embedded quotes.
///
/// This is best-effort escaping for data read from a trusted source database;
/// it is not a defense against adversarial content.
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}
