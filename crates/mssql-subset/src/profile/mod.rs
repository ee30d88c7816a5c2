//! Export profiles: which tables are copied and which foreign keys are followed.
//!
//! A profile is a JSON document listing every table (with its export flag,
//! entry point flag and optional lookup column) and every foreign key (with
//! its follow flag and direction). When no profile exists yet, one is
//! bootstrapped from the database metadata with everything disabled so it can
//! be edited by hand before the first real export.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::{ForeignKeyRef, TableRef};
use crate::error::{ExportError, Result};

/// Declarative export policy.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Profile {
    /// Per-table policy.
    #[serde(default)]
    pub tables: Vec<ProfileTable>,

    /// Per-foreign-key policy.
    #[serde(default)]
    pub foreign_keys: Vec<ProfileForeignKey>,
}

/// Policy for one table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ProfileTable {
    /// Table as `[schema].[name]`.
    pub name: TableRef,

    /// Whether the export starts from this table.
    #[serde(default)]
    pub is_entry_point: bool,

    /// Whether rows of this table are copied.
    #[serde(default)]
    pub export: bool,

    /// Stable business-key column used to resolve references to this table
    /// when it is not exported.
    #[serde(
        default,
        rename = "LookupProperty",
        alias = "LookupColumn",
        skip_serializing_if = "Option::is_none"
    )]
    pub lookup_column: Option<String>,
}

/// Policy for one foreign key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ProfileForeignKey {
    /// Source column of the key as `[schema].[table].[column]`.
    pub name: String,

    /// Whether the walker traverses this key at all.
    #[serde(default)]
    pub follow: bool,

    /// `true`: child row to its parent; `false`: parent row to its children.
    #[serde(default)]
    pub go_to_parent: bool,
}

/// Direction in which a foreign key is traversed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// From the referencing row to the referenced row.
    Parent,
    /// From the referenced row to all rows referencing it.
    Child,
}

/// Resolved traversal policy for a foreign key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FollowPolicy {
    pub follow: bool,
    pub direction: Direction,
}

impl FollowPolicy {
    /// Followed towards the parent row.
    pub fn to_parent(&self) -> bool {
        self.follow && self.direction == Direction::Parent
    }

    /// Followed towards the child rows.
    pub fn to_children(&self) -> bool {
        self.follow && self.direction == Direction::Child
    }
}

impl Profile {
    /// Load a profile from a JSON file and validate it.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Parse a profile from a JSON string and validate it.
    pub fn from_json(json: &str) -> Result<Self> {
        let profile: Profile = serde_json::from_str(json)?;
        profile.validate()?;
        Ok(profile)
    }

    /// Save the profile as pretty-printed JSON (atomic write).
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let content = serde_json::to_string_pretty(self)?;

        let temp_path = temp_path_for(path);
        std::fs::write(&temp_path, &content)?;
        std::fs::rename(&temp_path, path)?;

        debug!("Saved profile to {:?}", path);
        Ok(())
    }

    /// Build a starting profile from database metadata.
    ///
    /// Every table is listed with `export = false` and every foreign key with
    /// `follow = true, go_to_parent = false`; no entry point is set.
    pub fn bootstrap(tables: &[TableRef], foreign_keys: &[ForeignKeyRef]) -> Self {
        Self {
            tables: tables
                .iter()
                .map(|t| ProfileTable {
                    name: t.clone(),
                    is_entry_point: false,
                    export: false,
                    lookup_column: None,
                })
                .collect(),
            foreign_keys: foreign_keys
                .iter()
                .map(|fk| ProfileForeignKey {
                    name: fk.identity(),
                    follow: true,
                    go_to_parent: false,
                })
                .collect(),
        }
    }

    /// Validate structural invariants.
    ///
    /// Checks for exactly one entry point, no duplicate tables and non-empty
    /// lookup columns.
    pub fn validate(&self) -> Result<()> {
        self.entry_point()?;

        let mut seen = HashSet::new();
        for table in &self.tables {
            if !seen.insert(&table.name) {
                return Err(ExportError::Config(format!(
                    "Table {} is listed more than once in the profile",
                    table.name
                )));
            }
            if let Some(lookup) = &table.lookup_column {
                if lookup.trim().is_empty() {
                    return Err(ExportError::Config(format!(
                        "Table {} declares an empty lookup column",
                        table.name
                    )));
                }
            }
        }

        Ok(())
    }

    /// The single table the export starts from.
    ///
    /// # Errors
    ///
    /// Returns `ExportError::Config` when no table or more than one table is
    /// flagged as the entry point.
    pub fn entry_point(&self) -> Result<&TableRef> {
        let mut entries = self.tables.iter().filter(|t| t.is_entry_point);
        match (entries.next(), entries.next()) {
            (Some(entry), None) => Ok(&entry.name),
            (None, _) => Err(ExportError::Config(
                "Profile has no entry point table (set IsEntryPoint on exactly one table)".into(),
            )),
            (Some(first), Some(second)) => Err(ExportError::Config(format!(
                "Profile has more than one entry point table: {}, {}",
                first.name, second.name
            ))),
        }
    }

    /// Policy entry for a table, if listed.
    pub fn table(&self, table: &TableRef) -> Option<&ProfileTable> {
        self.tables.iter().find(|t| &t.name == table)
    }

    /// Whether rows of `table` are copied. Unlisted tables are not.
    pub fn is_exportable(&self, table: &TableRef) -> bool {
        self.table(table).map(|t| t.export).unwrap_or(false)
    }

    /// Whether `table` is the entry point table.
    pub fn is_entry_point(&self, table: &TableRef) -> bool {
        self.table(table).map(|t| t.is_entry_point).unwrap_or(false)
    }

    /// Lookup column declared for `table`.
    pub fn lookup_column_of(&self, table: &TableRef) -> Option<&str> {
        self.table(table).and_then(|t| t.lookup_column.as_deref())
    }

    /// Traversal policy for a foreign key. Unlisted keys are not followed.
    pub fn should_follow(&self, fk: &ForeignKeyRef) -> FollowPolicy {
        let identity = fk.identity();
        match self.foreign_keys.iter().find(|k| k.name == identity) {
            Some(k) => FollowPolicy {
                follow: k.follow,
                direction: if k.go_to_parent {
                    Direction::Parent
                } else {
                    Direction::Child
                },
            },
            None => FollowPolicy {
                follow: false,
                direction: Direction::Child,
            },
        }
    }
}

/// Sibling temp file used for atomic writes: `<file name>.tmp`.
pub(crate) fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}
