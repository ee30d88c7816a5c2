//! Export orchestration.
//!
//! Coordinates one export run:
//! 1. Load the profile, or write a bootstrap profile when none exists yet
//! 2. Walk the row graph from the entry point
//! 3. Order the collected rows by their dependencies
//! 4. Render the script and write it in one step

use std::path::{Path, PathBuf};
use std::time::Instant;

use serde::Serialize;
use tracing::{debug, info, warn};

use super::scheduler::schedule;
use super::script::render;
use super::walker::ExportWalker;
use crate::core::MetadataProvider;
use crate::error::{ExportError, Result};
use crate::profile::{temp_path_for, Profile};

/// Parameters of one export run.
#[derive(Debug, Clone)]
pub struct ExportRequest {
    /// Where the script is written.
    pub output_path: PathBuf,

    /// Profile file; created when missing.
    pub profile_path: PathBuf,

    /// Primary key value of the entry row.
    pub entry_point_id: String,

    /// Replace JPEG content with a small placeholder image.
    pub dummy_files: bool,
}

/// Statistics of a completed export.
#[derive(Debug, Clone, Serialize)]
pub struct ExportSummary {
    /// INSERT statements written.
    pub rows_exported: usize,

    /// `declare` lines written.
    pub variables_declared: usize,

    /// Statements written with a missing dependency warning.
    pub unresolved_rows: usize,

    /// Script location.
    pub output_path: PathBuf,

    /// Total duration in seconds.
    pub duration_seconds: f64,
}

impl ExportSummary {
    /// Serialize the summary as pretty-printed JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// How an export run ended.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ExportOutcome {
    /// No profile existed; a bootstrap profile was written and nothing was exported.
    NeedsConfiguration {
        profile_path: PathBuf,
        tables: usize,
        foreign_keys: usize,
    },

    /// The script was written.
    Completed(ExportSummary),
}

impl ExportOutcome {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Runs exports against a metadata provider.
pub struct ExportEngine<P: MetadataProvider> {
    provider: P,
}

impl<P: MetadataProvider> ExportEngine<P> {
    pub fn new(provider: P) -> Self {
        Self { provider }
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Release the provider (and its connection).
    pub fn into_inner(self) -> P {
        self.provider
    }

    /// Run an export.
    ///
    /// The output file is only written once the whole walk has succeeded;
    /// on error nothing is written.
    pub async fn export(&self, request: &ExportRequest) -> Result<ExportOutcome> {
        let started = Instant::now();

        if !request.profile_path.exists() {
            return self.bootstrap_profile(&request.profile_path).await;
        }

        if request.entry_point_id.trim().is_empty() {
            return Err(ExportError::Config("Entry point id must not be empty".into()));
        }

        let profile = Profile::load(&request.profile_path)?;
        let entry = profile.entry_point()?.clone();
        info!(
            "Exporting {} row '{}' from {} using profile {:?}",
            entry,
            request.entry_point_id,
            self.provider.db_type(),
            request.profile_path
        );

        let mut walker = ExportWalker::new(&self.provider, &profile, request.dummy_files).await?;
        walker.walk(entry, request.entry_point_id.clone()).await?;
        let (registry, rows) = walker.into_parts();
        let rows_exported = rows.len();
        debug!("Collected {} rows, {} variables", rows_exported, registry.len());

        let schedule = schedule(rows);
        let unresolved_rows = schedule.unresolved_count();
        if unresolved_rows > 0 {
            warn!(
                "{} rows reference rows that are not exported; see the warnings in the script",
                unresolved_rows
            );
        }

        let script = render(registry.bindings(), &schedule);
        write_atomic(&request.output_path, &script).await?;

        let summary = ExportSummary {
            rows_exported,
            variables_declared: registry.len(),
            unresolved_rows,
            output_path: request.output_path.clone(),
            duration_seconds: started.elapsed().as_secs_f64(),
        };

        info!(
            "Exported {} rows ({} variables, {} unresolved) to {:?} in {:.1}s",
            summary.rows_exported,
            summary.variables_declared,
            summary.unresolved_rows,
            summary.output_path,
            summary.duration_seconds
        );

        Ok(ExportOutcome::Completed(summary))
    }

    /// Write a profile listing every table and foreign key of the database.
    pub async fn bootstrap_profile(&self, path: &Path) -> Result<ExportOutcome> {
        let tables = self.provider.list_tables().await?;
        let foreign_keys = self.provider.list_foreign_keys().await?;

        let profile = Profile::bootstrap(&tables, &foreign_keys);
        profile.save(path)?;

        info!(
            "Created profile {:?} with {} tables and {} foreign keys; set an entry point and export flags, then run again",
            path,
            tables.len(),
            foreign_keys.len()
        );

        Ok(ExportOutcome::NeedsConfiguration {
            profile_path: path.to_path_buf(),
            tables: tables.len(),
            foreign_keys: foreign_keys.len(),
        })
    }
}

/// Write to a temp file next to `path`, then rename over it.
async fn write_atomic(path: &Path, content: &str) -> Result<()> {
    let temp_path = temp_path_for(path);
    tokio::fs::write(&temp_path, content).await?;
    tokio::fs::rename(&temp_path, path).await?;
    Ok(())
}
